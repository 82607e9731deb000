use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use lazy_regex::regex_captures;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::timetable::CourseRecord;

pub const DEFAULT_PORTAL_URL: &str = "https://studyapi.uestc.edu.cn/ckd";

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Request failed: {0}")]
    Request(#[from] Box<ureq::Error>),
    #[error("Failed to read response: {0}")]
    Body(#[from] io::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("Unexpected current week response: {0}")]
    UnexpectedWeek(String),
}

/// Remote source of the academic calendar and a student's courses.
pub trait TimetableGetter {
    fn current_week(&self) -> Result<u32, PortalError>;
    fn course_schedule(&self, username: &str) -> Result<Vec<CourseRecord>, PortalError>;
}

pub struct BlockingTimetableGetter {
    agent: ureq::Agent,
    base_url: String
}

impl BlockingTimetableGetter {
    pub fn new(base_url: &str) -> Result<Self, PortalError> {
        let connector = native_tls::TlsConnector::new()?;
        let agent = ureq::AgentBuilder::new()
            .tls_connector(Arc::new(connector))
            .timeout(Duration::from_secs(15))
            .build();

        Ok(Self {
            agent,
            base_url: base_url.trim_end_matches('/').into()
        })
    }
}

impl TimetableGetter for BlockingTimetableGetter {
    fn current_week(&self) -> Result<u32, PortalError> {
        let url = format!("{}/getWeek", self.base_url);
        debug!(%url, "fetching current week");
        let body: Value = self.agent.get(&url)
            .call()
            .map_err(Box::new)?
            .into_json()?;

        parse_week(&body).ok_or_else(|| PortalError::UnexpectedWeek(body.to_string()))
    }

    fn course_schedule(&self, username: &str) -> Result<Vec<CourseRecord>, PortalError> {
        let url = format!("{}/getWeekClassSchedule", self.base_url);
        debug!(%url, username, "fetching course schedule");
        let records = self.agent.get(&url)
            .query("userId", username)
            .call()
            .map_err(Box::new)?
            .into_json()?;

        Ok(records)
    }
}

/// Largest week number taken from the portal, anything past it is a misread.
pub const MAX_ACADEMIC_WEEK: u32 = 60;

/// Reads a week number out of whatever the week endpoint answered with:
/// a bare number, a numeric string, a label like `第5周`, or an object
/// wrapping one of those.
pub fn parse_week(value: &Value) -> Option<u32> {
    let week = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => {
            let text = text.trim();
            let digits = match regex_captures!(r"第\s*(\d+)\s*周", text) {
                Some((_, digits)) => digits,
                None => regex_captures!(r"^(\d+)$", text)?.1,
            };
            digits.parse().ok()
        }
        Value::Object(fields) => ["data", "week", "currentWeek"].iter()
            .filter_map(|key| fields.get(*key))
            .find_map(parse_week),
        _ => None,
    };
    week.filter(|week| *week <= MAX_ACADEMIC_WEEK)
}

/// Serves fixed data. Used when running offline and in tests.
pub struct DummyTimetableGetter {
    week: u32,
    records: Vec<CourseRecord>,
    fetches: Cell<usize>
}

impl DummyTimetableGetter {
    pub fn new(week: u32, records: Vec<CourseRecord>) -> Self {
        Self { week, records, fetches: Cell::new(0) }
    }

    /// Number of calls made to either endpoint so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl TimetableGetter for DummyTimetableGetter {
    fn current_week(&self) -> Result<u32, PortalError> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.week)
    }

    fn course_schedule(&self, _username: &str) -> Result<Vec<CourseRecord>, PortalError> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.records.clone())
    }
}
