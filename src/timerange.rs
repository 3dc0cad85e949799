//! Half-open UTC intervals for calendar math.
//!
//! `[start, end)` — the end instant is excluded, so back-to-back sessions
//! sharing a boundary never count as overlapping.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyInterval);
        }
        Ok(Self { start, end })
    }

    /// For intervals already validated elsewhere (e.g. loaded from a table
    /// with an end > start CHECK).
    pub fn new_unchecked(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(end > start);
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap test: `a.start < b.end && b.start < a.end`.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}
