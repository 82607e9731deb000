use chrono::{DateTime, Local, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::portal::{PortalError, TimetableGetter};
use crate::refresh::{calendar_week, stamp_needs_refresh, week_needs_refresh};
use crate::repository::{
    CacheStamp, CourseCache, CurrentWeekCache, DetailsCache, RepositoryError, ScheduleRepository,
};
use crate::timetable::{CourseDetails, CourseRecord, Timetable};

#[derive(Debug, Error)]
pub enum LoadScheduleError {
    #[error("No username configured")]
    MissingUsername,
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct LoadedSchedule {
    pub timetable: Timetable,
    pub current_week: u32,
    pub details: CourseDetails,
}

/// Serves schedule data from the caches, going to the portal only when the
/// refresh policy says a cache is out of date.
pub struct ScheduleLoader<'a> {
    getter: &'a dyn TimetableGetter,
    repository: &'a dyn ScheduleRepository
}

impl<'a> ScheduleLoader<'a> {
    pub fn new(getter: &'a dyn TimetableGetter, repository: &'a dyn ScheduleRepository) -> Self {
        Self { getter, repository }
    }

    pub fn load(&self, username: &str, now: DateTime<Local>) -> Result<LoadedSchedule, LoadScheduleError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(LoadScheduleError::MissingUsername);
        }

        let utc_now = now.with_timezone(&Utc);
        let current_week = self.current_week(username, now.date_naive())?;
        let (records, refetched) = self.courses(username, utc_now)?;
        let timetable = Timetable::new(records);
        let details = self.details(username, &timetable, refetched, utc_now)?;

        Ok(LoadedSchedule { timetable, current_week, details })
    }

    fn current_week(&self, username: &str, today: NaiveDate) -> Result<u32, LoadScheduleError> {
        let calendar_week = calendar_week(today);
        let cached = self.repository.load_current_week()?;
        if let Some(cache) = cached.as_ref().filter(|c| !week_needs_refresh(Some(*c), username, calendar_week)) {
            return Ok(cache.current_week);
        }

        match self.getter.current_week() {
            Ok(current_week) => {
                info!(current_week, "fetched current week");
                self.repository.save_current_week(&CurrentWeekCache {
                    username: username.into(),
                    current_week,
                    last_update_week: calendar_week,
                })?;
                Ok(current_week)
            }
            Err(e) => match cached {
                Some(cache) if cache.username == username => {
                    warn!(error = %e, "using outdated current week");
                    Ok(cache.current_week)
                }
                _ => Err(e.into()),
            },
        }
    }

    fn courses(&self, username: &str, now: DateTime<Utc>) -> Result<(Vec<CourseRecord>, bool), LoadScheduleError> {
        let cached = self.repository.load_courses()?;
        if let Some(cache) = &cached {
            if !stamp_needs_refresh(cache.stamp.as_ref(), username, now) {
                return Ok((cache.records.clone(), false));
            }
        }

        match self.getter.course_schedule(username) {
            Ok(records) => {
                info!(count = records.len(), "fetched course schedule");
                let cache = CourseCache {
                    records,
                    stamp: Some(CacheStamp::new(username, now)),
                };
                self.repository.save_courses(&cache)?;
                Ok((cache.records, true))
            }
            Err(e) => match cached {
                Some(cache) if cache.stamp.as_ref().map(|s| s.username.as_str()) == Some(username) => {
                    warn!(error = %e, "using outdated course schedule");
                    Ok((cache.records, false))
                }
                _ => Err(e.into()),
            },
        }
    }

    fn details(
        &self,
        username: &str,
        timetable: &Timetable,
        courses_refetched: bool,
        now: DateTime<Utc>
    ) -> Result<CourseDetails, LoadScheduleError> {
        if !courses_refetched {
            if let Some(cache) = self.repository.load_course_details()? {
                if !stamp_needs_refresh(Some(&cache.stamp()), username, now) {
                    return Ok(cache.details);
                }
            }
        }

        let details = timetable.course_details();
        let stamp = CacheStamp::new(username, now);
        self.repository.save_course_details(&DetailsCache {
            username: stamp.username,
            update_time: stamp.update_time,
            details: details.clone(),
        })?;
        Ok(details)
    }
}
