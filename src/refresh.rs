//! When cached portal data has to be fetched again.

use chrono::{DateTime, NaiveDate, Utc};

use crate::repository::{CacheStamp, CurrentWeekCache};

/// Courses and course details are refetched once a day.
pub const CACHE_TTL_SECS: f64 = 86400.0;

/// Monday-based week of the year (`%W`), 0 before the first Monday.
pub fn calendar_week(date: NaiveDate) -> u32 {
    date.format("%W").to_string().parse().unwrap_or(0)
}

pub fn stamp_needs_refresh(stamp: Option<&CacheStamp>, username: &str, now: DateTime<Utc>) -> bool {
    match stamp {
        None => true,
        Some(stamp) => stamp.username != username || stamp.age_secs(now) > CACHE_TTL_SECS,
    }
}

pub fn week_needs_refresh(cache: Option<&CurrentWeekCache>, username: &str, calendar_week: u32) -> bool {
    match cache {
        None => true,
        Some(cache) => cache.username != username || cache.last_update_week != calendar_week,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp(username: &str, update_time: f64) -> CacheStamp {
        CacheStamp { username: username.into(), update_time }
    }

    #[test]
    fn stamps_expire_after_a_day() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let fresh = stamp("alice", 1_700_000_000.0 - 86400.0);
        let stale = stamp("alice", 1_700_000_000.0 - 86401.0);

        assert!(!stamp_needs_refresh(Some(&fresh), "alice", now));
        assert!(stamp_needs_refresh(Some(&stale), "alice", now));
        assert!(stamp_needs_refresh(Some(&fresh), "bob", now));
        assert!(stamp_needs_refresh(None, "alice", now));
    }

    #[test]
    fn week_cache_follows_calendar_week_and_user() {
        let cache = CurrentWeekCache {
            username: "alice".into(),
            current_week: 6,
            last_update_week: 41,
        };
        assert!(!week_needs_refresh(Some(&cache), "alice", 41));
        assert!(week_needs_refresh(Some(&cache), "alice", 42));
        assert!(week_needs_refresh(Some(&cache), "alice", 0));
        assert!(week_needs_refresh(Some(&cache), "bob", 41));
        assert!(week_needs_refresh(None, "alice", 41));
    }

    #[test]
    fn calendar_week_is_monday_based() {
        // 2024-01-01 is a Monday
        assert_eq!(calendar_week(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 1);
        assert_eq!(calendar_week(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()), 0);
        assert_eq!(calendar_week(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()), 2);
    }
}
