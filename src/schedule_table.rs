use eframe::egui;
use egui::{Color32, Rect, Rounding, Pos2};
use crate::render::{shift_color, DrawCommand, Theme};
use crate::timetable::PERIODS_PER_DAY;

const HEADER_SIZE: f32 = 50.0;
const MIN_ROW_HEIGHT: f32 = 72.0;
const PERIOD_COLUMN_SCALE: f32 = 0.7;
const COLUMN_GAP: f32 = 2.0;

/// Paints the output of [`crate::render::render`].
pub struct ScheduleTable<'a> {
    pub commands: &'a [DrawCommand],
    pub theme: &'a Theme,
    pub height: Option<f32>
}

fn is_bright_color(color: Color32) -> bool {
    color.r() as u32 + color.g() as u32 + color.b() as u32 > 128 * 3
}

struct TableLayout {
    rect: Rect,
    period_column_width: f32,
    column_width: f32,
    row_height: f32
}

impl TableLayout {
    fn new(rect: Rect) -> Self {
        let column_width = rect.width() / (7.0 + PERIOD_COLUMN_SCALE);
        Self {
            rect,
            period_column_width: column_width * PERIOD_COLUMN_SCALE,
            column_width,
            row_height: (rect.height() - HEADER_SIZE) / PERIODS_PER_DAY as f32
        }
    }

    fn column_x(&self, column: usize) -> (f32, f32) {
        if column == 0 {
            return (self.rect.left(), self.period_column_width);
        }
        let left = self.rect.left() + self.period_column_width + self.column_width * (column - 1) as f32;
        (left, self.column_width)
    }

    fn header(&self, column: usize) -> Rect {
        let (left, width) = self.column_x(column);
        Rect::from_min_size(
            egui::pos2(left, self.rect.top()),
            egui::vec2(width, HEADER_SIZE)
        )
    }

    /// Cells of `column` spanning the 1-based periods `first..=last`.
    fn cells(&self, column: usize, first: usize, last: usize) -> Rect {
        let (left, width) = self.column_x(column);
        let top = self.rect.top() + HEADER_SIZE + self.row_height * (first - 1) as f32;
        Rect::from_min_size(
            egui::pos2(left, top),
            egui::vec2(width, self.row_height * (last + 1 - first) as f32)
        )
    }
}

impl<'a> ScheduleTable<'a> {
    pub fn new(commands: &'a [DrawCommand], theme: &'a Theme) -> Self {
        Self { commands, theme, height: None }
    }

    /// Height to fill, instead of whatever the parent ui has left.
    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    fn show_text(&self, ui: &mut egui::Ui, rect: Rect, text: &str, color: Color32, scale: f32) {
        let text_size = egui::TextStyle::Body.resolve(ui.style()).size;
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(text_size * scale),
            color
        );
    }

    fn show_course(&self, ui: &mut egui::Ui, rect: Rect, text: &str, fill: Color32) {
        let border_size = 3.0;
        let rounding = Rounding::from(5.0);
        let text_color = if is_bright_color(fill) { Color32::BLACK } else { Color32::WHITE };

        let painter = ui.painter();
        painter.rect_filled(rect, rounding, fill);
        painter.rect_stroke(rect.shrink(border_size / 2.0), rounding, (border_size, shift_color(fill, 1.25)));
        self.show_text(ui, rect, text, text_color, 0.8);
    }

    fn paint(&self, ui: &mut egui::Ui, layout: &TableLayout) {
        let theme = self.theme;
        ui.painter().rect_filled(layout.rect, Rounding::none(), theme.bg_fill);

        // Grid lines between rows
        for period in 1..PERIODS_PER_DAY {
            let y = layout.cells(0, period + 1, period + 1).top();
            ui.painter().line_segment([
                egui::pos2(layout.rect.left(), y),
                egui::pos2(layout.rect.right(), y)
            ], (1.0, theme.header_fill));
        }

        for command in self.commands {
            match command {
                DrawCommand::Header { column, text, highlighted } => {
                    let rect = layout.header(*column).shrink(COLUMN_GAP / 2.0);
                    let fill = if *highlighted { theme.highlight_color } else { theme.header_fill };
                    ui.painter().rect_filled(rect, Rounding::none(), fill);
                    self.show_text(ui, rect, text, theme.text_color, 0.9);
                }
                DrawCommand::PeriodLabel { period, text } => {
                    let rect = layout.cells(0, *period, *period).shrink(COLUMN_GAP / 2.0);
                    self.show_text(ui, rect, text, theme.text_color, 0.75);
                }
                DrawCommand::Course { day, first_period, last_period, text, fill, .. } => {
                    let rect = layout.cells(*day, *first_period, *last_period).shrink(COLUMN_GAP);
                    self.show_course(ui, rect, text, *fill);
                }
            }
        }
    }

    fn course_at(&self, layout: &TableLayout, pos: Pos2) -> Option<&'a str> {
        self.commands.iter().find_map(|command| match command {
            DrawCommand::Course { day, first_period, last_period, course, .. }
                if layout.cells(*day, *first_period, *last_period).contains(pos) => Some(course.as_str()),
            _ => None
        })
    }

    /// Paints the table and returns the course that was clicked, if any.
    pub fn show(self, ui: &mut egui::Ui) -> Option<&'a str> {
        let height = self.height.unwrap_or(ui.available_height()).max(HEADER_SIZE + MIN_ROW_HEIGHT * PERIODS_PER_DAY as f32);
        let size = egui::vec2(ui.available_width(), height);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
        let layout = TableLayout::new(rect);

        self.paint(ui, &layout);

        if response.clicked() {
            return response.interact_pointer_pos()
                .and_then(|pos| self.course_at(&layout, pos));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_period_rows_below_header() {
        let layout = TableLayout::new(Rect::from_min_size(
            egui::pos2(0.0, 0.0),
            egui::vec2(770.0, HEADER_SIZE + 120.0)
        ));
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        assert!(close(layout.row_height, 10.0));
        assert!(close(layout.column_width, 100.0));

        let monday = layout.cells(1, 1, 2);
        assert!(close(monday.left(), 70.0));
        assert!(close(monday.top(), HEADER_SIZE));
        assert!(close(monday.height(), 20.0));
    }

    #[test]
    fn hit_testing_finds_course_blocks() {
        let commands = vec![DrawCommand::Course {
            day: 2,
            first_period: 3,
            last_period: 4,
            course: "线性代数".into(),
            text: String::new(),
            fill: Color32::RED
        }];
        let theme = Theme::default();
        let table = ScheduleTable::new(&commands, &theme);
        let layout = TableLayout::new(Rect::from_min_size(
            egui::pos2(0.0, 0.0),
            egui::vec2(770.0, HEADER_SIZE + 120.0)
        ));

        assert_eq!(table.course_at(&layout, egui::pos2(200.0, HEADER_SIZE + 25.0)), Some("线性代数"));
        assert_eq!(table.course_at(&layout, egui::pos2(100.0, HEADER_SIZE + 25.0)), None);
    }

    #[test]
    fn bright_colors_get_dark_text() {
        assert!(is_bright_color(Color32::from_rgb(242, 217, 64)));
        assert!(!is_bright_color(Color32::from_rgb(163, 20, 46)));
    }
}
