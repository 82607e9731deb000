use chrono::{Local, NaiveDate, TimeZone};
use uestc_timetable::loader::ScheduleLoader;
use uestc_timetable::portal::DummyTimetableGetter;
use uestc_timetable::render::{render, DrawCommand, Theme, DEFAULT_PALETTE};
use uestc_timetable::repository::{MemoryScheduleRepository, ScheduleRepository};
use uestc_timetable::timetable::{week_dates, CourseRecord};

fn record(name: &str, weeks: &str, day: u8, start: u8, end: u8, room: &str) -> CourseRecord {
    CourseRecord {
        name: name.into(),
        week_occurrence: weeks.into(),
        day_of_week: day,
        start_period: start,
        end_period: end,
        room: room.into(),
        school: "清水河".into(),
        teacher: "陈老师".into(),
    }
}

#[test]
fn loads_derives_and_renders_a_week() {
    let getter = DummyTimetableGetter::new(2, vec![
        record("高等数学 ", "0111111111111111111", 1, 1, 2, "A101"),
        record("大学英语 Ⅱ", "1010", 3, 3, 4, "B202"),
        record("大学英语Ⅱ", "0110", 5, 3, 4, "B203"),
    ]);
    let repository = MemoryScheduleRepository::new();
    let now = Local.with_ymd_and_hms(2024, 10, 16, 8, 0, 0).unwrap();

    let schedule = ScheduleLoader::new(&getter, &repository)
        .load("2022000000000", now)
        .unwrap();
    assert_eq!(schedule.current_week, 2);
    assert_eq!(schedule.details["大学英语II"].week_bitmask, "1110");
    assert!(schedule.details["大学英语II"].detail_text.ends_with("上课周: 第1-3周"));
    assert_eq!(
        schedule.details["高等数学"].detail_text,
        "地点: 清水河A101\n教师: 陈老师\n上课周: 第2-19周"
    );

    let cached = repository.load_course_details().unwrap().unwrap();
    assert_eq!(cached.details, schedule.details);

    let grid = schedule.timetable.by_week(2);
    let today = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();
    let dates = week_dates(2, schedule.current_week, today).unwrap();
    let commands = render(&grid, &schedule.timetable, &dates, today, &Theme::default());

    let blocks: Vec<_> = commands.iter()
        .filter_map(|c| match c {
            DrawCommand::Course { day, first_period, last_period, text, fill, .. } =>
                Some((*day, *first_period, *last_period, text.as_str(), *fill)),
            _ => None,
        })
        .collect();
    assert_eq!(blocks, vec![
        (1, 1, 2, "高等数学\n \nA101", DEFAULT_PALETTE[0]),
        (5, 3, 4, "大学英语\nII\n \nB203", DEFAULT_PALETTE[1]),
    ]);
}
