//! Turns a derived schedule into a flat list of things to paint.

use chrono::NaiveDate;
use egui::{Color32, Visuals};

use crate::timetable::{
    day_header, ScheduleGrid, Timetable, DAYS_PER_WEEK, PERIODS_PER_DAY, PERIOD_TIMES
};

pub const CORNER_HEADER: &str = "时间/星期";

pub const DEFAULT_PALETTE: [Color32; 32] = [
    Color32::from_rgb(51, 153, 219),
    Color32::from_rgb(117, 204, 115),
    Color32::from_rgb(237, 176, 33),
    Color32::from_rgb(227, 99, 71),
    Color32::from_rgb(138, 43, 227),
    Color32::from_rgb(252, 161, 199),
    Color32::from_rgb(163, 20, 46),
    Color32::from_rgb(76, 191, 237),
    Color32::from_rgb(87, 237, 94),
    Color32::from_rgb(250, 191, 71),
    Color32::from_rgb(69, 133, 245),
    Color32::from_rgb(201, 33, 61),
    Color32::from_rgb(217, 112, 214),
    Color32::from_rgb(242, 217, 64),
    Color32::from_rgb(191, 94, 158),
    Color32::from_rgb(153, 204, 51),
    Color32::from_rgb(128, 128, 128),
    Color32::from_rgb(89, 178, 230),
    Color32::from_rgb(230, 128, 204),
    Color32::from_rgb(38, 191, 153),
    Color32::from_rgb(153, 102, 204),
    Color32::from_rgb(178, 76, 76),
    Color32::from_rgb(102, 204, 178),
    Color32::from_rgb(217, 153, 26),
    Color32::from_rgb(230, 26, 102),
    Color32::from_rgb(128, 153, 204),
    Color32::from_rgb(178, 204, 51),
    Color32::from_rgb(217, 115, 140),
    Color32::from_rgb(64, 166, 76),
    Color32::from_rgb(204, 178, 76),
    Color32::from_rgb(242, 51, 153),
    Color32::from_rgb(26, 153, 178),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub palette: Vec<Color32>,
    pub bg_fill: Color32,
    pub header_fill: Color32,
    pub highlight_color: Color32,
    pub text_color: Color32
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.to_vec(),
            bg_fill: Color32::from_rgb(242, 242, 242),
            header_fill: Color32::from_rgb(121, 121, 121),
            highlight_color: Color32::from_rgb(51, 153, 219),
            text_color: Color32::BLACK
        }
    }
}

impl Theme {
    pub fn from_visuals(visuals: &Visuals) -> Self {
        let bg_fill = visuals.widgets.noninteractive.bg_fill;
        Self {
            palette: DEFAULT_PALETTE.to_vec(),
            bg_fill,
            header_fill: shift_color(bg_fill, 0.5),
            highlight_color: visuals.selection.bg_fill,
            text_color: visuals.widgets.active.fg_stroke.color
        }
    }

    /// Color of the `index`-th distinct course.
    pub fn course_color(&self, index: usize) -> Color32 {
        if self.palette.is_empty() {
            return self.highlight_color;
        }
        self.palette[index % self.palette.len()]
    }
}

#[inline]
pub fn shift_color(color: Color32, amount: f32) -> Color32 {
    Color32::from_rgb(
        (color.r() as f32 * amount).min(255.0) as u8,
        (color.g() as f32 * amount).min(255.0) as u8,
        (color.b() as f32 * amount).min(255.0) as u8
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Column title. Column 0 is the period column, 1..=7 are Monday..Sunday.
    Header { column: usize, text: String, highlighted: bool },
    /// Row title of a 1-based period.
    PeriodLabel { period: usize, text: String },
    /// A course occupying consecutive periods of one 1-based day.
    Course {
        day: usize,
        first_period: usize,
        last_period: usize,
        course: String,
        text: String,
        fill: Color32
    }
}

pub fn period_label(period: usize) -> String {
    match PERIOD_TIMES.get(period.wrapping_sub(1)) {
        Some((start, end)) => format!("第{}节\n{}\n{}", period, start, end),
        None => format!("第{}节", period),
    }
}

pub fn render(
    grid: &ScheduleGrid,
    timetable: &Timetable,
    dates: &[NaiveDate; DAYS_PER_WEEK],
    today: NaiveDate,
    theme: &Theme
) -> Vec<DrawCommand> {
    let mut commands = vec![DrawCommand::Header {
        column: 0,
        text: CORNER_HEADER.into(),
        highlighted: false
    }];

    for (i, date) in dates.iter().enumerate() {
        commands.push(DrawCommand::Header {
            column: i + 1,
            text: day_header(i, *date),
            highlighted: *date == today
        });
    }

    for period in 1..=PERIODS_PER_DAY {
        commands.push(DrawCommand::PeriodLabel { period, text: period_label(period) });
    }

    for day in 1..=DAYS_PER_WEEK {
        let cells = grid.day(day);
        let mut period = 0;
        while period < cells.len() {
            let Some(cell) = &cells[period] else {
                period += 1;
                continue;
            };

            let mut last = period;
            while cells.get(last + 1).and_then(Option::as_ref) == Some(cell) {
                last += 1;
            }

            let index = timetable.course_index(&cell.course).unwrap_or(0);
            commands.push(DrawCommand::Course {
                day,
                first_period: period + 1,
                last_period: last + 1,
                course: cell.course.clone(),
                text: cell.text.clone(),
                fill: theme.course_color(index)
            });
            period = last + 1;
        }
    }

    commands
}
