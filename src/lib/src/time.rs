//! Clock abstraction for certificate validity windows
//!
//! Certificate builders never read the system clock directly. They take a
//! [`TimeSource`], so a test can pin "now" and assert on exact `notBefore` and
//! `notAfter` values.
//!
//! # Usage
//!
//! ```rust
//! use yubca::time::{TimeSource, SystemTimeSource, FixedTimeSource};
//!
//! let system = SystemTimeSource;
//! let now = system.now()?;
//! assert_eq!(now.nanosecond(), 0);
//!
//! let fixed = FixedTimeSource::from_unix_secs(1704067200)?; // 2024-01-01 00:00:00 UTC
//! assert_eq!(fixed.now()?.unix_timestamp(), 1704067200);
//! # Ok::<(), yubca::CAError>(())
//! ```

use crate::error::CAError;
use std::time::Duration;
use time::OffsetDateTime;

/// Source of the current time.
///
/// Implementations return UTC truncated to whole seconds, which is the
/// resolution of X.509 validity fields.
pub trait TimeSource: Send + Sync {
    /// The current time.
    ///
    /// Returns an error if the time cannot be determined.
    fn now(&self) -> Result<OffsetDateTime, CAError>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Result<OffsetDateTime, CAError> {
        truncate_to_seconds(OffsetDateTime::now_utc())
    }
}

/// A clock stopped at a fixed instant, for tests and reproducible issuance.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    timestamp: OffsetDateTime,
}

impl FixedTimeSource {
    /// Create from a Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_secs(secs: i64) -> Result<Self, CAError> {
        let timestamp = OffsetDateTime::from_unix_timestamp(secs)
            .map_err(|e| CAError::TimeError(format!("timestamp {} out of range: {}", secs, e)))?;
        Ok(Self { timestamp })
    }

    /// Create from a date-time. Sub-second precision is dropped.
    pub fn from_datetime(timestamp: OffsetDateTime) -> Result<Self, CAError> {
        Ok(Self {
            timestamp: truncate_to_seconds(timestamp)?,
        })
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Result<OffsetDateTime, CAError> {
        Ok(self.timestamp)
    }
}

/// Drop the sub-second part of `t` and normalize it to UTC.
pub fn truncate_to_seconds(t: OffsetDateTime) -> Result<OffsetDateTime, CAError> {
    t.to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|e| CAError::TimeError(e.to_string()))
}

/// `start + validity`, failing instead of overflowing the calendar.
pub fn checked_add(start: OffsetDateTime, validity: Duration) -> Result<OffsetDateTime, CAError> {
    let delta = time::Duration::try_from(validity)
        .map_err(|e| CAError::TimeError(format!("validity out of range: {}", e)))?;
    start
        .checked_add(delta)
        .ok_or_else(|| CAError::TimeError("validity period overflows the calendar".to_string()))
}
