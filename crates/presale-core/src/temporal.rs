//! # Temporal Types — UTC Timestamps and the Clock Input
//!
//! Defines `Timestamp`, a UTC-only, seconds-precision instant, and the
//! [`Clock`] trait through which the sale engine reads "now".
//!
//! ## Invariants
//!
//! - Timestamps are UTC with a `Z` suffix on the wire
//!   (`YYYY-MM-DDTHH:MM:SSZ`). Offsets such as `+05:00` are rejected at
//!   parse time rather than silently converted.
//! - Phase boundaries are compared at whole-second granularity, the same
//!   granularity as block time.
//! - The engine never advances time itself. A [`Clock`] is injected and
//!   is expected to be monotonically non-decreasing; [`ManualClock`]
//!   enforces that for tests and scripted replays.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC wall-clock time, truncated to seconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// From a Unix epoch value in seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| {
                CoreError::InvalidTimestamp(format!("epoch seconds out of range: {secs}"))
            })
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `secs` seconds.
    pub fn plus_secs(&self, secs: u64) -> Result<Self, CoreError> {
        let delta = i64::try_from(secs)
            .map_err(|_| CoreError::InvalidTimestamp(format!("offset too large: {secs}")))?;
        let target = self
            .epoch_secs()
            .checked_add(delta)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("offset overflows: {secs}")))?;
        Self::from_epoch_secs(target)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl TryFrom<String> for Timestamp {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
    }
}

// ─── Clock ───────────────────────────────────────────────────────────

/// Source of the current time for the sale engine.
///
/// Implementations must be monotonically non-decreasing for the lifetime
/// of a sale.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hold one handle while
/// the engine holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a clock stopped at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: u64) -> Result<Timestamp, CoreError> {
        let mut current = self.current.lock();
        *current = current.plus_secs(secs)?;
        Ok(*current)
    }

    /// Jump to `target`. Moving backwards is rejected.
    pub fn set(&self, target: Timestamp) -> Result<(), CoreError> {
        let mut current = self.current.lock();
        if target < *current {
            return Err(CoreError::InvalidTimestamp(format!(
                "clock cannot move backwards from {} to {}",
                *current, target
            )));
        }
        *current = target;
        Ok(())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_parse_z_suffix_accepted() {
        assert_eq!(ts("2026-01-15T12:00:00Z").to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_offset_rejected() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T17:00:00+05:00").is_err());
        assert!(Timestamp::parse("not-a-date").is_err());
    }

    #[test]
    fn test_subseconds_truncated() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let t = Timestamp::from_utc(dt.with_nanosecond(999_000_000).unwrap());
        assert_eq!(t.as_datetime().nanosecond(), 0);
        assert_eq!(ts("2026-01-15T12:00:00.750Z"), ts("2026-01-15T12:00:00Z"));
    }

    #[test]
    fn test_plus_secs() {
        let start = ts("2026-01-01T00:00:00Z");
        assert_eq!(start.plus_secs(86_400).unwrap(), ts("2026-01-02T00:00:00Z"));
        assert!(start.plus_secs(u64::MAX).is_err());
    }

    #[test]
    fn test_serde_uses_iso8601() {
        let t = ts("2026-03-01T08:00:00Z");
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2026-03-01T08:00:00Z\"");
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, t);
        assert!(serde_json::from_str::<Timestamp>("\"2026-03-01T08:00:00+01:00\"").is_err());
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(ts("2026-01-01T00:00:00Z"));
        let handle = clock.clone();
        handle.advance(60).unwrap();
        assert_eq!(clock.now(), ts("2026-01-01T00:01:00Z"));
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(ts("2026-01-02T00:00:00Z"));
        assert!(clock.set(ts("2026-01-01T00:00:00Z")).is_err());
        assert_eq!(clock.now(), ts("2026-01-02T00:00:00Z"));
        clock.set(ts("2026-01-02T00:00:00Z")).unwrap();
        clock.set(ts("2026-01-03T00:00:00Z")).unwrap();
        assert_eq!(clock.now(), ts("2026-01-03T00:00:00Z"));
    }
}
