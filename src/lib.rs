pub mod app;
pub mod config;
pub mod environment;
pub mod loader;
pub mod portal;
pub mod refresh;
pub mod render;
pub mod repository;
pub mod schedule_table;
pub mod timetable;
