//! Operation clock and time windows
//!
//! Ledger timestamps are recorded in the branch's fixed UTC offset (UTC+2 by
//! default). There is deliberately no daylight-saving logic: the offset is a
//! plain `chrono::FixedOffset`.

use chrono::{DateTime, FixedOffset, Offset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Default branch offset from UTC, in hours
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 2;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid UTC offset: {0} hours")]
    InvalidOffset(i32),

    #[error("Invalid window: start {start} must be before end {end}")]
    InvalidWindow {
        start: String,
        end: String,
    },
}

/// Source of operation timestamps
pub trait Clock: Send + Sync + 'static {
    /// Current time in the branch offset
    fn now(&self) -> DateTime<FixedOffset>;

    /// The offset timestamps are expressed in
    fn offset(&self) -> FixedOffset;
}

/// Wall clock in a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchClock {
    offset: FixedOffset,
}

impl BranchClock {
    /// Creates a clock `hours` east of UTC
    ///
    /// # Errors
    ///
    /// Returns `TemporalError::InvalidOffset` outside the -23..=23 range
    pub fn with_offset_hours(hours: i32) -> Result<Self, TemporalError> {
        let offset = FixedOffset::east_opt(hours * 3600).ok_or(TemporalError::InvalidOffset(hours))?;
        Ok(Self { offset })
    }

    /// Creates a clock with an explicit offset
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for BranchClock {
    fn default() -> Self {
        // Two hours east is always a valid offset
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl Clock for BranchClock {
    /// Current time at microsecond precision, the resolution storage keeps
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().trunc_subsecs(6).with_timezone(&self.offset)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// A clock that returns a settable instant, for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Moves the clock to a new instant
    pub fn set(&self, instant: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard = instant;
        }
    }

    /// Advances the clock by `duration`
    pub fn advance(&self, duration: chrono::Duration) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard += duration;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.instant.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn offset(&self) -> FixedOffset {
        *self.now().offset()
    }
}

/// Half-open time window `[start, end)` used by reports and reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Creates a new window
    ///
    /// # Errors
    ///
    /// Returns `TemporalError::InvalidWindow` if `start >= end`
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Result<Self, TemporalError> {
        if start >= end {
            return Err(TemporalError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Checks whether an instant falls inside the window
    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        *instant >= self.start && *instant < self.end
    }
}
