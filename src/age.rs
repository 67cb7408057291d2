//! Staleness checks based on last-access time.
//!
//! Access time is read from [`std::fs::Metadata::accessed`]. Some platforms
//! and mounts do not track it; those files fall back to their modification
//! time. On Linux `relatime` mounts the access time is only refreshed about
//! once a day, which is coarse but consistent with day-based thresholds.

use chrono::{DateTime, Duration, Local};
use std::fs::Metadata;
use tracing::debug;

/// Returns the best available "last used" time for a file.
pub fn last_access_time(metadata: &Metadata) -> DateTime<Local> {
    match metadata.accessed() {
        Ok(accessed) => accessed.into(),
        Err(e) => {
            debug!("access time unavailable ({}), using modification time", e);
            metadata
                .modified()
                .map(DateTime::<Local>::from)
                .unwrap_or_else(|_| Local::now())
        }
    }
}

/// Converts a day count into a duration, or `None` if it does not fit.
fn threshold(days: u64) -> Option<Duration> {
    i64::try_from(days).ok().and_then(Duration::try_days)
}

/// True when more than `threshold_days` have passed between `last_accessed`
/// and `reference`. Exactly `threshold_days` is not stale.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Local};
/// use desktidy::age::is_stale;
///
/// let now = Local::now();
/// assert!(is_stale(now - Duration::days(45), 30, now));
/// assert!(!is_stale(now - Duration::days(5), 30, now));
/// ```
pub fn is_stale(last_accessed: DateTime<Local>, threshold_days: u64, reference: DateTime<Local>) -> bool {
    match threshold(threshold_days) {
        Some(limit) => reference.signed_duration_since(last_accessed) > limit,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_threshold_is_not_stale() {
        let now = Local::now();
        assert!(!is_stale(now - Duration::days(30), 30, now));
    }

    #[test]
    fn test_one_second_past_threshold_is_stale() {
        let now = Local::now();
        let accessed = now - Duration::days(30) - Duration::seconds(1);
        assert!(is_stale(accessed, 30, now));
    }

    #[test]
    fn test_recent_file_is_not_stale() {
        let now = Local::now();
        assert!(!is_stale(now - Duration::days(5), 30, now));
        assert!(!is_stale(now, 0, now));
    }

    #[test]
    fn test_zero_threshold() {
        let now = Local::now();
        assert!(is_stale(now - Duration::seconds(1), 0, now));
    }

    #[test]
    fn test_future_access_time_is_not_stale() {
        let now = Local::now();
        assert!(!is_stale(now + Duration::days(3), 1, now));
    }

    #[test]
    fn test_huge_threshold_never_stale() {
        let now = Local::now();
        assert!(!is_stale(now - Duration::days(365 * 50), u64::MAX, now));
    }

    #[test]
    fn test_last_access_time_reads_metadata() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let metadata = temp.as_file().metadata().unwrap();
        let accessed = last_access_time(&metadata);
        assert!(Local::now().signed_duration_since(accessed) < Duration::days(1));
    }
}
