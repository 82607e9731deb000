use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::timetable::{CourseDetails, CourseRecord};

const COURSES_FILE: &str = "course.json";
const CURRENT_WEEK_FILE: &str = "current_week.json";
const COURSE_DETAILS_FILE: &str = "course_details.json";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Who a cache was fetched for, and when (unix seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStamp {
    pub username: String,
    pub update_time: f64,
}

impl CacheStamp {
    pub fn new(username: &str, now: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            update_time: now.timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        now.timestamp_millis() as f64 / 1000.0 - self.update_time
    }
}

/// Course list as stored on disk: the records followed by a trailing
/// [`CacheStamp`] entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseCache {
    pub records: Vec<CourseRecord>,
    pub stamp: Option<CacheStamp>,
}

impl Serialize for CourseCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.records.len() + usize::from(self.stamp.is_some());
        let mut seq = serializer.serialize_seq(Some(len))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        if let Some(stamp) = &self.stamp {
            seq.serialize_element(stamp)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for CourseCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Course(CourseRecord),
            Stamp(CacheStamp),
        }

        let mut cache = CourseCache { records: vec![], stamp: None };
        for entry in Vec::<Entry>::deserialize(deserializer)? {
            if cache.stamp.is_some() {
                return Err(serde::de::Error::custom("cache stamp is not the last entry"));
            }
            match entry {
                Entry::Course(record) => cache.records.push(record),
                Entry::Stamp(stamp) => cache.stamp = Some(stamp),
            }
        }
        Ok(cache)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeekCache {
    pub username: String,
    pub current_week: u32,
    /// Calendar week (`%W`) in which `current_week` was fetched
    pub last_update_week: u32,
}

/// Derived course details, stored as one flat object next to the stamp fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsCache {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub update_time: f64,
    #[serde(flatten)]
    pub details: CourseDetails,
}

impl DetailsCache {
    pub fn stamp(&self) -> CacheStamp {
        CacheStamp {
            username: self.username.clone(),
            update_time: self.update_time,
        }
    }
}

/// Portal login. Stored as plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("File error at {path:?}: {source}")]
    File { path: PathBuf, source: io::Error },
    #[error("Malformed JSON in {path:?}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

pub trait ScheduleRepository {
    fn load_courses(&self) -> Result<Option<CourseCache>, RepositoryError>;
    fn save_courses(&self, cache: &CourseCache) -> Result<(), RepositoryError>;

    fn load_current_week(&self) -> Result<Option<CurrentWeekCache>, RepositoryError>;
    fn save_current_week(&self, cache: &CurrentWeekCache) -> Result<(), RepositoryError>;

    fn load_course_details(&self) -> Result<Option<DetailsCache>, RepositoryError>;
    fn save_course_details(&self, cache: &DetailsCache) -> Result<(), RepositoryError>;

    fn load_credentials(&self) -> Result<Option<Credentials>, RepositoryError>;
    fn save_credentials(&self, credentials: &Credentials) -> Result<(), RepositoryError>;
}

/// Keeps every cache as a JSON file inside one directory.
pub struct JsonScheduleRepository {
    directory: PathBuf
}

impl JsonScheduleRepository {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.into()
        }
    }

    fn read<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>, RepositoryError> {
        let path = self.directory.join(filename);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RepositoryError::File { path, source }),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| RepositoryError::Json { path, source })
    }

    // A cache that fails to parse only means it has to be fetched again
    fn read_cache<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>, RepositoryError> {
        match self.read(filename) {
            Err(RepositoryError::Json { path, source }) => {
                warn!(?path, %source, "discarding malformed cache");
                Ok(None)
            }
            result => result,
        }
    }

    fn write<T: Serialize>(&self, filename: &str, value: &T) -> Result<(), RepositoryError> {
        let path = self.directory.join(filename);
        if !self.directory.is_dir() {
            fs::create_dir_all(&self.directory)
                .map_err(|source| RepositoryError::File { path: self.directory.clone(), source })?;
        }

        let contents = serde_json::to_string_pretty(value)
            .map_err(|source| RepositoryError::Json { path: path.clone(), source })?;
        fs::write(&path, contents)
            .map_err(|source| RepositoryError::File { path: path.clone(), source })?;

        debug!(?path, "saved");
        Ok(())
    }
}

impl ScheduleRepository for JsonScheduleRepository {
    fn load_courses(&self) -> Result<Option<CourseCache>, RepositoryError> {
        self.read_cache(COURSES_FILE)
    }

    fn save_courses(&self, cache: &CourseCache) -> Result<(), RepositoryError> {
        self.write(COURSES_FILE, cache)
    }

    fn load_current_week(&self) -> Result<Option<CurrentWeekCache>, RepositoryError> {
        self.read_cache(CURRENT_WEEK_FILE)
    }

    fn save_current_week(&self, cache: &CurrentWeekCache) -> Result<(), RepositoryError> {
        self.write(CURRENT_WEEK_FILE, cache)
    }

    fn load_course_details(&self) -> Result<Option<DetailsCache>, RepositoryError> {
        self.read_cache(COURSE_DETAILS_FILE)
    }

    fn save_course_details(&self, cache: &DetailsCache) -> Result<(), RepositoryError> {
        self.write(COURSE_DETAILS_FILE, cache)
    }

    fn load_credentials(&self) -> Result<Option<Credentials>, RepositoryError> {
        self.read(CREDENTIALS_FILE)
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<(), RepositoryError> {
        self.write(CREDENTIALS_FILE, credentials)
    }
}

#[derive(Default)]
pub struct MemoryScheduleRepository {
    courses: RefCell<Option<CourseCache>>,
    current_week: RefCell<Option<CurrentWeekCache>>,
    details: RefCell<Option<DetailsCache>>,
    credentials: RefCell<Option<Credentials>>
}

impl MemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleRepository for MemoryScheduleRepository {
    fn load_courses(&self) -> Result<Option<CourseCache>, RepositoryError> {
        Ok(self.courses.borrow().clone())
    }

    fn save_courses(&self, cache: &CourseCache) -> Result<(), RepositoryError> {
        *self.courses.borrow_mut() = Some(cache.clone());
        Ok(())
    }

    fn load_current_week(&self) -> Result<Option<CurrentWeekCache>, RepositoryError> {
        Ok(self.current_week.borrow().clone())
    }

    fn save_current_week(&self, cache: &CurrentWeekCache) -> Result<(), RepositoryError> {
        *self.current_week.borrow_mut() = Some(cache.clone());
        Ok(())
    }

    fn load_course_details(&self) -> Result<Option<DetailsCache>, RepositoryError> {
        Ok(self.details.borrow().clone())
    }

    fn save_course_details(&self, cache: &DetailsCache) -> Result<(), RepositoryError> {
        *self.details.borrow_mut() = Some(cache.clone());
        Ok(())
    }

    fn load_credentials(&self) -> Result<Option<Credentials>, RepositoryError> {
        Ok(self.credentials.borrow().clone())
    }

    fn save_credentials(&self, credentials: &Credentials) -> Result<(), RepositoryError> {
        *self.credentials.borrow_mut() = Some(credentials.clone());
        Ok(())
    }
}
