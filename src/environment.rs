use thiserror::Error;
use tracing::info;

use crate::{
    config::{self, Config, ConfigStore, LoadConfigError},
    loader::ScheduleLoader,
    portal::{BlockingTimetableGetter, PortalError, TimetableGetter},
    repository::{JsonScheduleRepository, ScheduleRepository},
};

pub struct Environment {
    pub timetable_getter: Box<dyn TimetableGetter>,
    pub config_store: Box<dyn ConfigStore>,
    pub repository: Box<dyn ScheduleRepository>
}

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Config(#[from] LoadConfigError),
    #[error(transparent)]
    Portal(#[from] PortalError)
}

impl Environment {
    /// Talks to the real portal and keeps caches in the configured data directory.
    pub fn from_config(config_store: Box<dyn ConfigStore>, config: &Config) -> Result<Self, EnvironmentError> {
        let data_dir = config::data_dir(config)?;
        info!(?data_dir, portal = %config.portal_url, "setting up environment");

        Ok(Self {
            timetable_getter: Box::new(BlockingTimetableGetter::new(&config.portal_url)?),
            config_store,
            repository: Box::new(JsonScheduleRepository::new(&data_dir))
        })
    }

    pub fn loader(&self) -> ScheduleLoader<'_> {
        ScheduleLoader::new(self.timetable_getter.as_ref(), self.repository.as_ref())
    }
}
