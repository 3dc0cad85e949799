//! Praxis — the appointment scheduling and clinical-record consistency
//! core of a single-clinician practice management system.
//!
//! The crate owns the invariants the surrounding CRUD layers must not be
//! able to break: no double-booking of a clinician's calendar, at most
//! one artifact of each kind per appointment, patient lifecycle gating,
//! audit logging of every patient-scoped access, and an idempotently
//! derived finance ledger.
//!
//! Entry points: [`PracticeCore`] for a path-bound facade, or the domain
//! modules (`scheduler`, `binder`, `registry`, `ledger`, `audit`)
//! directly over a `rusqlite::Connection`.

pub mod audit;
pub mod binder;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod practice;
pub mod registry;
pub mod scheduler;
pub mod timerange;
pub mod txn;

pub use audit::AccessContext;
pub use error::CoreError;
pub use practice::PracticeCore;
pub use timerange::TimeRange;
