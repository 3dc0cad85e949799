//! Operation-level error taxonomy.
//!
//! `DatabaseError` stays below this layer; callers of the domain modules
//! see `CoreError`, whose variants tell them whether to fix the request,
//! resubmit with different parameters, retry, or give up.

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, ArtifactKind};

/// Caller-fixable input problems. Never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("end time must be strictly after start time")]
    EmptyInterval,

    #[error("appointment falls outside the clinician's working hours")]
    OutsideWorkingHours,

    #[error("price cannot be negative")]
    NegativePrice,

    #[error("amount cannot be negative")]
    NegativeAmount,

    #[error("mood rating {value} is outside the accepted range")]
    MoodRatingOutOfRange { value: i32 },

    #[error("artifact patient does not match the appointment's patient")]
    PatientMismatch,
}

/// The request was well-formed but lost against existing state. The caller
/// may resubmit with different parameters.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictError {
    #[error("interval overlaps appointment {existing}")]
    OverlappingAppointment { existing: Uuid },

    #[error("appointment already has a {kind} bound to it")]
    ArtifactAlreadyExists { kind: ArtifactKind },
}

/// The target entity is in a state that forbids the operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEligibleError {
    #[error("archived patients cannot receive new sessions")]
    PatientArchived,

    #[error("waitlisted patients may only receive evaluation sessions")]
    WaitlistRequiresEvaluation,

    #[error("cancelled appointments cannot receive artifacts")]
    AppointmentCancelled,

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("payment can only be recorded on a completed appointment")]
    PaymentBeforeCompletion,

    #[error("only scheduled appointments can be rescheduled (status is {status})")]
    RescheduleNotAllowed { status: AppointmentStatus },

    #[error("derived ledger entries follow their appointment and cannot be edited directly")]
    DerivedEntryImmutable,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("not eligible: {0}")]
    NotEligible(#[from] NotEligibleError),

    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("commit conflicted with a concurrent operation after {attempts} attempts")]
    Concurrency { attempts: u32 },

    #[error("storage unavailable: {0}")]
    Storage(DatabaseError),

    /// The business write succeeded in memory but its audit row could not
    /// be made durable, so the whole operation was rolled back. Surfaced
    /// separately from `Storage` so callers never read "wasn't logged" as
    /// "succeeded".
    #[error("audit log write failed: {0}")]
    AuditUnavailable(DatabaseError),
}

impl CoreError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Only concurrency failures are safe to retry automatically; the
    /// failed attempt performed no partial writes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }
}

impl From<DatabaseError> for CoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(DatabaseError::Sqlite(e))
    }
}
