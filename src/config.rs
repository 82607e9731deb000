use std::{path::{Path, PathBuf}, fs, io};

use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portal::DEFAULT_PORTAL_URL;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub portal_url: String,
    /// Last week offered in the week picker
    pub max_week: u32,
    /// Where the JSON caches live, defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    /// A font with CJK glyphs, the built-in egui fonts have none
    pub font_path: Option<PathBuf>,
    pub log_filter: String,
    pub dark_mode: bool
}
impl Default for Config {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.into(),
            max_week: 20,
            data_dir: None,
            font_path: None,
            log_filter: "uestc_timetable=info".into(),
            dark_mode: false
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("Not found")]
    NotFound,
    #[error("Could not determine home directory")]
    NoHomeDirectory,
    #[error("File error: {0}")]
    FileError(io::Error),
    #[error("Toml error: {0}")]
    TomlError(#[from] toml::de::Error)
}

#[derive(Debug, Error)]
pub enum SaveConfigError {
    #[error("File error: {0}")]
    FileError(#[from] io::Error),
    #[error("Toml error: {0}")]
    TomlError(#[from] toml::ser::Error)
}

pub trait ConfigStore {
    fn load(&self) -> Result<Config, LoadConfigError>;
    fn save(&self, config: &Config) -> Result<(), SaveConfigError>;
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "UESTC Timetable")
}

/// Directory holding the JSON caches for `config`.
pub fn data_dir(config: &Config) -> Result<PathBuf, LoadConfigError> {
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(LoadConfigError::NoHomeDirectory)
}


pub struct TomlConfigStore {
    filename: PathBuf
}
impl TomlConfigStore {
    pub fn new(filename: &Path) -> Self {
        Self {
            filename: filename.into()
        }
    }

    /// Store at `config.toml` in the platform config directory.
    pub fn locate() -> Result<Self, LoadConfigError> {
        let project_dirs = project_dirs().ok_or(LoadConfigError::NoHomeDirectory)?;
        Ok(Self::new(&project_dirs.config_dir().join("config.toml")))
    }
}
impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<Config, LoadConfigError> {
        let config_str = fs::read_to_string(&self.filename)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => LoadConfigError::NotFound,
                _ => LoadConfigError::FileError(e)
            })?;

        Ok(toml::from_str(&config_str)?)
    }

    fn save(&self, config: &Config) -> Result<(), SaveConfigError> {
        if let Some(directory) = self.filename.parent() {
            if !directory.is_dir() {
                fs::create_dir_all(directory)?;
            }
        }

        let config_str = toml::to_string_pretty(config)?;
        fs::write(&self.filename, config_str)?;

        Ok(())
    }
}


pub struct MemoryConfigStore {
    config: Option<Config>
}
impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self { config: Some(config) }
    }
}
impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Config, LoadConfigError> {
        self.config.clone().ok_or(LoadConfigError::NotFound)
    }

    fn save(&self, _config: &Config) -> Result<(), SaveConfigError> {
        Ok(())
    }
}
