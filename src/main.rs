#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::error::Error;

use eframe::egui;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uestc_timetable::{
    app::MainApp,
    config::{Config, ConfigStore, LoadConfigError, TomlConfigStore},
    environment::Environment,
};

fn main() -> Result<(), Box<dyn Error>> {
    let config_store = TomlConfigStore::locate()?;
    let loaded = config_store.load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };
    let persist_config = matches!(loaded, Ok(_) | Err(LoadConfigError::NotFound));

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match loaded {
        Ok(_) => info!("config loaded"),
        Err(LoadConfigError::NotFound) => {
            info!("no config found, writing defaults");
            if let Err(e) = config_store.save(&config) {
                warn!(error = %e, "failed to write default config");
            }
        }
        Err(e) => warn!(error = %e, "failed to load config, using defaults without saving them"),
    }

    let environment = Environment::from_config(Box::new(config_store), &config)?;

    let mut native_options = eframe::NativeOptions::default();
    native_options.decorated = true;
    native_options.resizable = true;
    native_options.min_window_size = Some(egui::vec2(640.0, 480.0));
    native_options.initial_window_size = Some(egui::vec2(1024.0, 768.0));
    let mut app = MainApp::new(environment, config).persist_config(persist_config);

    eframe::run_native(
        "UESTC timetable",
        native_options,
        Box::new(move |cc| {
            app.init(cc);
            Box::new(app)
        })
    );

    Ok(())
}
