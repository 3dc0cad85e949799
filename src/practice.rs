//! PracticeCore — the inbound surface of the core, bound to one database
//! path.
//!
//! The surrounding service layer is request-per-operation, so the facade
//! opens a fresh connection per call and applies the configured lock
//! timeout to it. Concurrent commits against the same path serialize on
//! SQLite's write lock; a request that cannot acquire it within the
//! timeout fails as retryable (`CoreError::Concurrency`) with no partial
//! writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use crate::audit::{self, AccessContext};
use crate::binder::{self, ArtifactPayload, BoundArtifact};
use crate::config;
use crate::db::sqlite;
use crate::error::CoreError;
use crate::ledger::{self, ManualEntry};
use crate::models::{
    AccessLogEntry, Appointment, AppointmentStatus, BillingDefaults, Clinician, FinanceTransaction,
    LedgerFilter, NewPatient, Patient, PatientStatus, PaymentMethod,
};
use crate::registry::{self, NewClinician};
use crate::scheduler::{self, ScheduleRequest};
use crate::timerange::TimeRange;

pub struct PracticeCore {
    db_path: PathBuf,
    timeout: Duration,
}

impl PracticeCore {
    /// Open (creating and migrating if needed) the practice database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        sqlite::open_database(path.as_ref())?;
        Ok(Self {
            db_path: path.as_ref().to_path_buf(),
            timeout: config::DEFAULT_OPERATION_TIMEOUT,
        })
    }

    /// Cap how long any single operation may wait for the write lock.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn conn(&self) -> Result<Connection, CoreError> {
        let conn = sqlite::open_database(&self.db_path)?;
        conn.busy_timeout(self.timeout)?;
        Ok(conn)
    }

    // ── Identity & patients ────────────────────────────────

    pub fn provision_clinician(&self, new: &NewClinician) -> Result<Clinician, CoreError> {
        registry::provision_clinician(&mut self.conn()?, new)
    }

    pub fn update_billing_defaults(
        &self,
        clinician_id: &Uuid,
        defaults: &BillingDefaults,
    ) -> Result<(), CoreError> {
        registry::update_billing_defaults(&mut self.conn()?, clinician_id, defaults)
    }

    pub fn register_patient(
        &self,
        ctx: &AccessContext,
        new: &NewPatient,
    ) -> Result<Patient, CoreError> {
        registry::register_patient(&mut self.conn()?, ctx, new)
    }

    pub fn get_patient(&self, ctx: &AccessContext, patient_id: &Uuid) -> Result<Patient, CoreError> {
        registry::get_patient(&self.conn()?, ctx, patient_id)
    }

    pub fn list_patients(
        &self,
        ctx: &AccessContext,
        clinician_id: &Uuid,
        status: Option<PatientStatus>,
    ) -> Result<Vec<Patient>, CoreError> {
        registry::list_patients(&self.conn()?, ctx, clinician_id, status)
    }

    pub fn set_patient_status(
        &self,
        ctx: &AccessContext,
        patient_id: &Uuid,
        status: PatientStatus,
    ) -> Result<Patient, CoreError> {
        registry::set_patient_status(&mut self.conn()?, ctx, patient_id, status)
    }

    pub fn delete_patient(&self, ctx: &AccessContext, patient_id: &Uuid) -> Result<(), CoreError> {
        registry::delete_patient(&mut self.conn()?, ctx, patient_id)
    }

    // ── Scheduling ─────────────────────────────────────────

    pub fn schedule_appointment(
        &self,
        ctx: &AccessContext,
        req: &ScheduleRequest,
    ) -> Result<Appointment, CoreError> {
        scheduler::schedule_appointment(&mut self.conn()?, ctx, req)
    }

    pub fn reschedule_appointment(
        &self,
        ctx: &AccessContext,
        appointment_id: &Uuid,
        new_start: chrono::DateTime<chrono::Utc>,
        new_end: chrono::DateTime<chrono::Utc>,
    ) -> Result<Appointment, CoreError> {
        scheduler::reschedule_appointment(&mut self.conn()?, ctx, appointment_id, new_start, new_end)
    }

    pub fn transition_appointment_status(
        &self,
        ctx: &AccessContext,
        appointment_id: &Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, CoreError> {
        scheduler::transition_appointment_status(&mut self.conn()?, ctx, appointment_id, new_status)
    }

    pub fn record_payment(
        &self,
        ctx: &AccessContext,
        appointment_id: &Uuid,
        method: PaymentMethod,
    ) -> Result<Appointment, CoreError> {
        scheduler::record_payment(&mut self.conn()?, ctx, appointment_id, method)
    }

    pub fn agenda(
        &self,
        ctx: &AccessContext,
        clinician_id: &Uuid,
        window: Option<&TimeRange>,
    ) -> Result<Vec<Appointment>, CoreError> {
        scheduler::agenda(&self.conn()?, ctx, clinician_id, window)
    }

    // ── Artifacts ──────────────────────────────────────────

    pub fn attach_artifact(
        &self,
        ctx: &AccessContext,
        appointment_id: &Uuid,
        payload: &ArtifactPayload,
    ) -> Result<BoundArtifact, CoreError> {
        binder::attach_artifact(&mut self.conn()?, ctx, appointment_id, payload)
    }

    pub fn delete_appointment(
        &self,
        ctx: &AccessContext,
        appointment_id: &Uuid,
    ) -> Result<(), CoreError> {
        binder::delete_appointment(&mut self.conn()?, ctx, appointment_id)
    }

    // ── Audit ──────────────────────────────────────────────

    /// Record an access this core did not itself mediate (e.g. the API
    /// layer serving a raw document).
    pub fn record_access(
        &self,
        ctx: &AccessContext,
        patient_id: Option<Uuid>,
        action: &str,
        resource: &str,
        detail: Option<String>,
    ) -> Result<AccessLogEntry, CoreError> {
        audit::record(&self.conn()?, ctx, patient_id, action, resource, detail)
    }

    pub fn access_history(
        &self,
        ctx: &AccessContext,
        patient_id: &Uuid,
    ) -> Result<Vec<AccessLogEntry>, CoreError> {
        audit::history_for_patient(&self.conn()?, ctx, patient_id)
    }

    // ── Ledger ─────────────────────────────────────────────

    pub fn upsert_finance_entry(
        &self,
        ctx: &AccessContext,
        entry: &ManualEntry,
    ) -> Result<FinanceTransaction, CoreError> {
        ledger::upsert_manual_entry(&mut self.conn()?, ctx, entry)
    }

    pub fn delete_finance_entry(&self, ctx: &AccessContext, id: &Uuid) -> Result<(), CoreError> {
        ledger::delete_manual_entry(&mut self.conn()?, ctx, id)
    }

    pub fn ledger(
        &self,
        ctx: &AccessContext,
        clinician_id: &Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<FinanceTransaction>, CoreError> {
        ledger::list_entries(&self.conn()?, ctx, clinician_id, filter)
    }
}
