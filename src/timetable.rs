use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

pub const DAYS_PER_WEEK: usize = 7;
pub const PERIODS_PER_DAY: usize = 12;

const WRAP_WIDTH: usize = 4;

pub const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "星期一", "星期二", "星期三", "星期四", "星期五", "星期六", "星期日"
];

/// Start and end clock times of every teaching period.
pub const PERIOD_TIMES: [(&str, &str); PERIODS_PER_DAY] = [
    ("08:30", "09:15"), ("09:20", "10:05"), ("10:20", "11:05"), ("11:10", "11:55"),
    ("14:30", "15:15"), ("15:20", "16:05"), ("16:20", "17:05"), ("17:10", "17:55"),
    ("19:30", "20:15"), ("20:20", "21:05"), ("21:10", "21:55"), ("22:00", "22:45"),
];

/// One enrolled course section, as returned by the study portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "c_name")]
    pub name: String,
    /// One `'0'`/`'1'` flag per academic week, the first character is week 1.
    #[serde(rename = "rq")]
    pub week_occurrence: String,
    #[serde(rename = "xqj", deserialize_with = "lenient_number")]
    pub day_of_week: u8,
    #[serde(rename = "ksjc", deserialize_with = "lenient_number")]
    pub start_period: u8,
    #[serde(rename = "jsjc", deserialize_with = "lenient_number")]
    pub end_period: u8,
    #[serde(rename = "room_name", default, deserialize_with = "text_or_null")]
    pub room: String,
    #[serde(default, deserialize_with = "text_or_null")]
    pub school: String,
    #[serde(default, deserialize_with = "text_or_null")]
    pub teacher: String,
}

fn text_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// The portal is not consistent about sending these as numbers or as strings
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u8),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl CourseRecord {
    /// Whether the course meets during the given 1-based academic week.
    pub fn occurs_in(&self, week: u32) -> bool {
        if week == 0 {
            return false;
        }
        self.week_occurrence.as_bytes().get(week as usize - 1) == Some(&b'1')
    }

    fn detail_header(&self) -> String {
        format!("地点: {}{}\n教师: {}\n上课周: ", self.school, self.room, self.teacher)
    }
}

pub fn normalize_course_name(raw: &str) -> String {
    raw.replace(' ', "")
        .replace('Ⅱ', "II")
        .replace('Ⅰ', "I")
        .replace('Ⅲ', "III")
        .replace('–', "-")
}

/// Breaks text into lines of at most four characters.
pub fn wrap_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(WRAP_WIDTH)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    /// Normalized name of the course occupying the cell
    pub course: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleGrid {
    days: Vec<Vec<Option<GridCell>>>
}

impl Default for ScheduleGrid {
    fn default() -> Self {
        Self {
            days: vec![vec![None; PERIODS_PER_DAY]; DAYS_PER_WEEK]
        }
    }
}

impl ScheduleGrid {
    /// Cell at a 1-based day (Monday = 1) and 1-based period.
    pub fn cell(&self, day: usize, period: usize) -> Option<&GridCell> {
        if day == 0 || period == 0 {
            return None;
        }
        self.days.get(day - 1)?.get(period - 1)?.as_ref()
    }

    /// The twelve period cells of a 1-based day.
    pub fn day(&self, day: usize) -> &[Option<GridCell>] {
        match day.checked_sub(1).and_then(|i| self.days.get(i)) {
            Some(periods) => periods,
            None => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().flatten().all(Option::is_none)
    }

    fn fill(&mut self, day: u8, first: u8, last: u8, cell: &GridCell) {
        let Some(periods) = (day as usize).checked_sub(1).and_then(|i| self.days.get_mut(i)) else {
            return;
        };
        for period in first.max(1)..=last {
            if let Some(slot) = periods.get_mut(period as usize - 1) {
                *slot = Some(cell.clone());
            }
        }
    }
}

/// Lays out every course meeting in `week` on a day × period grid.
/// Later records overwrite earlier ones on colliding cells.
pub fn derive_grid(records: &[CourseRecord], week: u32) -> ScheduleGrid {
    let mut grid = ScheduleGrid::default();
    for record in records.iter().filter(|r| r.occurs_in(week)) {
        let course = normalize_course_name(&record.name);
        let text = format!("{}\n \n{}", wrap_text(&course), wrap_text(&record.room));
        let cell = GridCell { course, text };
        grid.fill(record.day_of_week, record.start_period, record.end_period, &cell);
    }
    grid
}

/// Inclusive range of academic weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub first: u32,
    pub last: u32,
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.first == self.last {
            write!(f, "第{}周", self.first)
        } else {
            write!(f, "第{}-{}周", self.first, self.last)
        }
    }
}

pub fn encode_week_ranges(bitmask: &str) -> Vec<WeekRange> {
    let mut ranges = vec![];
    let mut start = None;
    for (i, flag) in bitmask.bytes().enumerate() {
        let week = i as u32 + 1;
        match (flag == b'1', start) {
            (true, None) => start = Some(week),
            (false, Some(first)) => {
                ranges.push(WeekRange { first, last: week - 1 });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(first) = start {
        ranges.push(WeekRange { first, last: bitmask.len() as u32 });
    }
    ranges
}

pub fn format_week_ranges(ranges: &[WeekRange]) -> String {
    ranges.iter()
        .map(WeekRange::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Per-index OR of two week bitmasks. The shorter one is padded with `'0'`.
pub fn merge_week_bitmasks(a: &str, b: &str) -> String {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    (0..a.len().max(b.len()))
        .map(|i| {
            if a.get(i) == Some(&b'1') || b.get(i) == Some(&b'1') { '1' } else { '0' }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(rename = "detail")]
    pub detail_text: String,
    #[serde(rename = "rq")]
    pub week_bitmask: String,
}

pub type CourseDetails = BTreeMap<String, CourseDetail>;

/// Builds the popup text of every course. Sections sharing a name have their
/// week bitmasks OR-ed together.
pub fn derive_course_details(records: &[CourseRecord]) -> CourseDetails {
    let mut accumulated: BTreeMap<String, (String, String)> = BTreeMap::new();
    for record in records {
        let header = record.detail_header();
        match accumulated.entry(normalize_course_name(&record.name)) {
            Entry::Vacant(entry) => {
                entry.insert((header, record.week_occurrence.clone()));
            }
            Entry::Occupied(mut entry) => {
                let (existing_header, bitmask) = entry.get_mut();
                *existing_header = header;
                *bitmask = merge_week_bitmasks(bitmask, &record.week_occurrence);
            }
        }
    }

    accumulated.into_iter()
        .map(|(name, (header, week_bitmask))| {
            let ranges = format_week_ranges(&encode_week_ranges(&week_bitmask));
            (name, CourseDetail { detail_text: header + &ranges, week_bitmask })
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Timetable {
    records: Vec<CourseRecord>
}

impl Timetable {
    pub fn new(mut records: Vec<CourseRecord>) -> Self {
        for record in &mut records {
            record.name = normalize_course_name(&record.name);
        }
        Self { records }
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn by_week(&self, week: u32) -> ScheduleGrid {
        derive_grid(&self.records, week)
    }

    pub fn course_details(&self) -> CourseDetails {
        derive_course_details(&self.records)
    }

    /// Distinct course names in the order they first appear.
    pub fn course_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = vec![];
        for record in &self.records {
            if !order.contains(&record.name.as_str()) {
                order.push(&record.name);
            }
        }
        order
    }

    pub fn course_index(&self, course: &str) -> Option<usize> {
        self.course_order().iter().position(|name| *name == course)
    }
}

/// Monday to Sunday of `target_week`, counted from the week containing `today`.
/// `None` when the shift leaves the range chrono can represent.
pub fn week_dates(target_week: u32, current_week: u32, today: NaiveDate) -> Option<[NaiveDate; DAYS_PER_WEEK]> {
    let monday = today.checked_sub_signed(Duration::days(today.weekday().num_days_from_monday() as i64))?;
    let shift = (target_week as i64 - current_week as i64) * 7;
    let start = monday.checked_add_signed(Duration::days(shift))?;
    start.checked_add_signed(Duration::days(DAYS_PER_WEEK as i64 - 1))?;
    Some(std::array::from_fn(|i| start + Duration::days(i as i64)))
}

pub fn day_header(day_index: usize, date: NaiveDate) -> String {
    let name = DAY_NAMES.get(day_index).copied().unwrap_or_default();
    format!("{}\n{}", name, date.format("%m月%d日"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, weeks: &str, day: u8, start: u8, end: u8, room: &str) -> CourseRecord {
        CourseRecord {
            name: name.into(),
            week_occurrence: weeks.into(),
            day_of_week: day,
            start_period: start,
            end_period: end,
            room: room.into(),
            school: "清水河".into(),
            teacher: "张老师".into(),
        }
    }

    #[test]
    fn places_course_in_exactly_its_cells() {
        let records = vec![record("数据结构", "1111", 3, 5, 7, "B202")];
        let grid = derive_grid(&records, 2);

        for day in 1..=DAYS_PER_WEEK {
            for period in 1..=PERIODS_PER_DAY {
                let occupied = grid.cell(day, period).is_some();
                assert_eq!(occupied, day == 3 && (5..=7).contains(&period), "day {day} period {period}");
            }
        }
        assert_eq!(grid.cell(3, 5), grid.cell(3, 7));
    }

    #[test]
    fn end_to_end_single_course() {
        let records = vec![record("高等数学 ", "0111111111111111111", 1, 1, 2, "A101")];
        let grid = derive_grid(&records, 2);

        let cell = grid.cell(1, 1).expect("period 1 occupied");
        assert_eq!(cell.text, "高等数学\n \nA101");
        assert_eq!(cell.course, "高等数学");
        assert_eq!(grid.cell(1, 2), Some(cell));
        let occupied = (1..=DAYS_PER_WEEK)
            .flat_map(|day| grid.day(day).iter())
            .filter(|cell| cell.is_some())
            .count();
        assert_eq!(occupied, 2);
    }

    #[test]
    fn long_names_wrap_every_four_characters() {
        let records = vec![record("马克思主义基本原理概论", "1", 2, 3, 3, "品学楼A-101")];
        let grid = derive_grid(&records, 1);
        assert_eq!(
            grid.cell(2, 3).map(|c| c.text.as_str()),
            Some("马克思主\n义基本原\n理概论\n \n品学楼A\n-101")
        );
    }

    #[test]
    fn grid_derivation_is_idempotent() {
        let records = vec![
            record("线性代数", "0110", 1, 1, 2, "A101"),
            record("大学物理", "1110", 4, 3, 4, "C303"),
        ];
        assert_eq!(derive_grid(&records, 2), derive_grid(&records, 2));
    }

    #[test]
    fn skips_weeks_outside_the_bitmask() {
        let records = vec![record("线性代数", "111", 1, 1, 2, "A101")];
        assert!(derive_grid(&records, 0).is_empty());
        assert!(derive_grid(&records, 4).is_empty());
        assert!(derive_grid(&records, 3).cell(1, 1).is_some());
    }

    #[test]
    fn ignores_out_of_range_days_and_periods() {
        let records = vec![
            record("线性代数", "1", 8, 1, 2, "A101"),
            record("概率论", "1", 2, 11, 14, "A102"),
        ];
        let grid = derive_grid(&records, 1);
        assert!(grid.cell(2, 11).is_some());
        assert!(grid.cell(2, 12).is_some());
        assert!(grid.day(8).is_empty());
    }

    #[test]
    fn later_records_win_collisions() {
        let records = vec![
            record("线性代数", "1", 1, 1, 2, "A101"),
            record("概率论", "1", 1, 2, 3, "A102"),
        ];
        let grid = derive_grid(&records, 1);
        assert_eq!(grid.cell(1, 1).map(|c| c.course.as_str()), Some("线性代数"));
        assert_eq!(grid.cell(1, 2).map(|c| c.course.as_str()), Some("概率论"));
    }

    #[test]
    fn encodes_ranges() {
        assert_eq!(
            encode_week_ranges("0111010"),
            vec![WeekRange { first: 2, last: 4 }, WeekRange { first: 6, last: 6 }]
        );
        assert_eq!(encode_week_ranges("0011"), vec![WeekRange { first: 3, last: 4 }]);
        assert!(encode_week_ranges("0000").is_empty());
        assert_eq!(format_week_ranges(&encode_week_ranges("001110001")), "第3-5周,第9周");
    }

    #[test]
    fn merges_bitmasks_of_the_same_course() {
        let records = vec![
            record("英语 Ⅱ", "1010", 1, 1, 2, "A101"),
            record("英语Ⅱ", "0110", 3, 1, 2, "A102"),
        ];
        let details = derive_course_details(&records);

        assert_eq!(details.len(), 1);
        let detail = &details["英语II"];
        assert_eq!(detail.week_bitmask, "1110");
        assert_eq!(detail.detail_text, "地点: 清水河A102\n教师: 张老师\n上课周: 第1-3周");
    }

    #[test]
    fn merges_bitmasks_of_different_lengths() {
        assert_eq!(merge_week_bitmasks("01", "0001"), "0101");
        assert_eq!(merge_week_bitmasks("", "10"), "10");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_course_name("大学 英语 Ⅱ"), "大学英语II");
        assert_eq!(normalize_course_name("物理实验Ⅰ–Ⅲ"), "物理实验I-III");
        for raw in ["大学 英语 Ⅱ", "C++ – 程序设计", ""] {
            let once = normalize_course_name(raw);
            assert_eq!(normalize_course_name(&once), once);
        }
    }

    #[test]
    fn colors_follow_first_seen_order() {
        let timetable = Timetable::new(vec![
            record("概率论", "1", 1, 1, 2, "A101"),
            record("线性代数", "1", 2, 1, 2, "A101"),
            record("概率 论", "1", 3, 1, 2, "A101"),
        ]);
        assert_eq!(timetable.course_order(), vec!["概率论", "线性代数"]);
        assert_eq!(timetable.course_index("线性代数"), Some(1));
        assert_eq!(timetable.course_index("体育"), None);
    }

    #[test]
    fn accepts_numbers_sent_as_strings() {
        let json = r#"{"c_name":"体育","rq":"0101","xqj":"5","ksjc":3,"jsjc":"4","room_name":"操场"}"#;
        let record: CourseRecord = serde_json::from_str(json).unwrap();
        assert_eq!((record.day_of_week, record.start_period, record.end_period), (5, 3, 4));
        assert_eq!(record.teacher, "");
    }

    #[test]
    fn week_dates_shift_from_current_week() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap(); // Wednesday
        let dates = week_dates(9, 8, today).unwrap();
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 10, 21).unwrap());
        assert_eq!(dates[6], NaiveDate::from_ymd_opt(2024, 10, 27).unwrap());
        assert_eq!(week_dates(8, 8, today).unwrap()[0], NaiveDate::from_ymd_opt(2024, 10, 14).unwrap());
        assert_eq!(day_header(0, dates[0]), "星期一\n10月21日");
    }

    #[test]
    fn week_dates_out_of_calendar_range() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();
        assert_eq!(week_dates(1, u32::MAX, today), None);
        assert_eq!(week_dates(u32::MAX, 1, today), None);
        assert!(week_dates(1, 60, today).is_some());
    }

    #[test]
    fn null_display_fields_read_as_empty() {
        let json = r#"{"c_name":"体育","rq":"01","xqj":5,"ksjc":3,"jsjc":4,"room_name":null,"school":null,"teacher":null}"#;
        let record: CourseRecord = serde_json::from_str(json).unwrap();
        assert_eq!((record.room.as_str(), record.school.as_str(), record.teacher.as_str()), ("", "", ""));

        let records: Vec<CourseRecord> = serde_json::from_str(&format!("[{json},{json}]")).unwrap();
        assert_eq!(records.len(), 2);
    }
}
