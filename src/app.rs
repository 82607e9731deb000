use std::fs;

use chrono::Local;
use eframe::{egui, CreationContext};
use egui::{FontData, FontDefinitions, FontFamily};
use tracing::{info, warn};

use crate::{
    config::Config,
    environment::Environment,
    loader::LoadedSchedule,
    render::{render, Theme},
    repository::Credentials,
    schedule_table::ScheduleTable,
    timetable::week_dates,
};

const NO_DETAIL: &str = "暂无详细信息";
const CJK_FONT: &str = "cjk";

pub fn week_label(week: u32, current_week: Option<u32>) -> String {
    if current_week == Some(week) {
        format!("第{}周 (当前周)", week)
    } else {
        format!("第{}周", week)
    }
}

pub struct MainApp {
    environment: Environment,
    config: Config,
    credentials: Credentials,

    schedule: Option<LoadedSchedule>,
    shown_week: u32,
    selected_course: Option<String>,

    status: Option<String>,
    show_settings: bool,
    persist_config: bool
}

impl MainApp {
    pub fn new(environment: Environment, config: Config) -> MainApp {
        MainApp {
            environment,
            config,
            credentials: Credentials::default(),
            schedule: None,
            shown_week: 1,
            selected_course: None,
            status: None,
            show_settings: false,
            persist_config: true
        }
    }

    /// Whether `on_exit` writes the config back. Turned off when the config
    /// file exists but could not be read, so it is not overwritten by defaults.
    pub fn persist_config(mut self, persist: bool) -> Self {
        self.persist_config = persist;
        self
    }

    pub fn init(&mut self, cc: &CreationContext) {
        if self.config.dark_mode {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
        } else {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
        }
        self.load_fonts(&cc.egui_ctx);

        match self.environment.repository.load_credentials() {
            Ok(Some(credentials)) => self.credentials = credentials,
            Ok(None) => self.show_settings = true,
            Err(e) => self.status = Some(format!("加载失败: {}", e))
        }

        if !self.credentials.username.is_empty() {
            self.refresh_timetable();
        }
    }

    fn load_fonts(&self, ctx: &egui::Context) {
        let Some(path) = &self.config.font_path else {
            return;
        };

        match fs::read(path) {
            Ok(bytes) => {
                let mut fonts = FontDefinitions::default();
                fonts.font_data.insert(CJK_FONT.into(), FontData::from_owned(bytes));
                for family in [FontFamily::Proportional, FontFamily::Monospace] {
                    fonts.families.entry(family).or_default().push(CJK_FONT.into());
                }
                ctx.set_fonts(fonts);
            }
            Err(e) => warn!(?path, error = %e, "failed to load font")
        }
    }

    /// Reloads the schedule of the saved user, returns whether it succeeded.
    pub fn refresh_timetable(&mut self) -> bool {
        match self.environment.loader().load(&self.credentials.username, Local::now()) {
            Ok(schedule) => {
                info!(courses = schedule.timetable.records().len(), "schedule loaded");
                self.shown_week = schedule.current_week.clamp(1, self.config.max_week.max(1));
                self.schedule = Some(schedule);
                self.status = None;
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to load schedule");
                self.status = Some(e.to_string());
                false
            }
        }
    }

    fn save_credentials(&mut self) {
        if let Err(e) = self.environment.repository.save_credentials(&self.credentials) {
            self.status = Some(format!("保存失败: {}", e));
            return;
        }

        if self.refresh_timetable() {
            self.status = Some("账号和密码已保存".into());
            self.show_settings = false;
        }
    }

    fn shift_shown_week(&mut self, shift: i64) {
        let max_week = self.config.max_week.max(1) as i64;
        self.set_shown_week((self.shown_week as i64 + shift).clamp(1, max_week) as u32);
    }

    fn set_shown_week(&mut self, week: u32) {
        self.shown_week = week;
        self.selected_course = None;
    }

    fn current_week(&self) -> Option<u32> {
        self.schedule.as_ref().map(|s| s.current_week)
    }

    fn show_navigation(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("◀").clicked() {
                self.shift_shown_week(-1);
            }

            let current_week = self.current_week();
            let max_week = self.config.max_week;
            let mut week = self.shown_week;
            egui::ComboBox::from_id_source("shown_week")
                .selected_text(week_label(week, current_week))
                .show_ui(ui, |ui| {
                    for w in 1..=max_week {
                        ui.selectable_value(&mut week, w, week_label(w, current_week));
                    }
                });
            if week != self.shown_week {
                self.set_shown_week(week);
            }

            if ui.button("▶").clicked() {
                self.shift_shown_week(1);
            }
            if ui.button("本周").clicked() {
                if let Some(current_week) = current_week {
                    self.set_shown_week(current_week);
                }
            }
            if ui.button("刷新").clicked() {
                self.refresh_timetable();
            }
            if ui.button("设置").clicked() {
                self.show_settings = true;
            }

            if let Some(status) = &self.status {
                ui.label(status.as_str());
            }
        });
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut save = false;
        egui::Window::new("设置")
            .open(&mut open)
            .collapsible(false)
            .show(ctx, |ui| {
                egui::Grid::new("credentials").num_columns(2).show(ui, |ui| {
                    ui.label("学号");
                    ui.text_edit_singleline(&mut self.credentials.username);
                    ui.end_row();

                    ui.label("密码");
                    ui.add(egui::TextEdit::singleline(&mut self.credentials.password).password(true));
                    ui.end_row();
                });
                save = ui.button("保存").clicked();
            });

        self.show_settings = open;
        if save {
            self.save_credentials();
        }
    }

    fn show_course_detail(&mut self, ctx: &egui::Context) {
        let Some(course) = self.selected_course.clone() else {
            return;
        };
        let detail = self.schedule.as_ref()
            .and_then(|s| s.details.get(&course))
            .map(|d| d.detail_text.as_str())
            .unwrap_or(NO_DETAIL)
            .to_owned();

        let mut close = false;
        egui::SidePanel::right("course_detail").show(ctx, |ui| {
            ui.heading(course.as_str());
            ui.separator();
            ui.label(detail);
            close = ui.button("关闭").clicked();
        });
        if close {
            self.selected_course = None;
        }
    }
}

impl eframe::App for MainApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if !self.persist_config {
            info!("config was not loaded, leaving it untouched");
            return;
        }
        if let Err(e) = self.environment.config_store.save(&self.config) {
            warn!(error = %e, "failed to save config");
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        use egui::*;

        if !ctx.wants_keyboard_input() {
            if ctx.input().key_pressed(Key::D) {
                self.shift_shown_week(1);
            }
            if ctx.input().key_pressed(Key::A) {
                self.shift_shown_week(-1);
            }
            if ctx.input().key_pressed(Key::S) {
                if let Some(current_week) = self.current_week() {
                    self.set_shown_week(current_week);
                }
            }
        }
        if ctx.input().key_pressed(Key::F2) {
            self.config.dark_mode = !ctx.style().visuals.dark_mode;
            if self.config.dark_mode {
                ctx.set_visuals(egui::Visuals::dark());
            } else {
                ctx.set_visuals(egui::Visuals::light());
            }
        }

        TopBottomPanel::top("week_navigation").show(ctx, |ui| self.show_navigation(ui));
        self.show_settings_window(ctx);
        self.show_course_detail(ctx);

        CentralPanel::default().show(ctx, |ui| {
            let Some(schedule) = &self.schedule else {
                ui.centered_and_justified(|ui| ui.label("请在设置中填写学号"));
                return;
            };

            let today = Local::now().date_naive();
            let grid = schedule.timetable.by_week(self.shown_week);
            let Some(dates) = week_dates(self.shown_week, schedule.current_week, today) else {
                ui.centered_and_justified(|ui| ui.label(format!("无法计算第{}周的日期", self.shown_week)));
                return;
            };
            let theme = Theme::from_visuals(ui.visuals());
            let commands = render(&grid, &schedule.timetable, &dates, today, &theme);

            let height = ui.available_height();
            let clicked = ScrollArea::vertical()
                .show(ui, |ui| {
                    ScheduleTable::new(&commands, &theme)
                        .height(height)
                        .show(ui)
                        .map(str::to_owned)
                })
                .inner;
            if clicked.is_some() {
                self.selected_course = clicked;
            }
        });
    }
}
