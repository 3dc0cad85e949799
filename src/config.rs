//! Tuning constants for the scheduling core.

use std::time::Duration;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How many times a commit is re-attempted when SQLite reports the
/// database busy, before the failure surfaces as `CoreError::Concurrency`.
pub const COMMIT_RETRY_LIMIT: u32 = 3;

/// Linear backoff between commit attempts.
pub const COMMIT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Default per-operation lock timeout when the caller does not supply one.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Inclusive bounds for a clinical note's mood rating.
pub const MOOD_RATING_MIN: i32 = 1;
pub const MOOD_RATING_MAX: i32 = 10;
