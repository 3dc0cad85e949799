//! Audit Recorder — append-only access log over patient-scoped operations.
//!
//! Policy: hard-fail. The success-path entry for an operation is written
//! inside the same transaction as the business write, so a commit implies
//! the access was logged. When the entry cannot be written the transaction
//! fails and the caller sees `CoreError::AuditUnavailable` — never a
//! silently un-logged write. Denied attempts are recorded best-effort
//! after rollback.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository;
use crate::error::CoreError;
use crate::models::AccessLogEntry;

/// Who is acting, over which transport. Attached to every inbound
/// operation; `ip` and `user_agent` are whatever the calling layer knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessContext {
    pub actor_id: Uuid,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessContext {
    pub fn new(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            ip: None,
            user_agent: None,
        }
    }
}

/// Append one entry. This is also the inbound `record_access` operation:
/// callers outside this crate use it for reads the core does not mediate.
pub fn record(
    conn: &Connection,
    ctx: &AccessContext,
    patient_id: Option<Uuid>,
    action: &str,
    resource: &str,
    detail: Option<String>,
) -> Result<AccessLogEntry, CoreError> {
    let entry = AccessLogEntry {
        id: Uuid::new_v4(),
        actor_id: ctx.actor_id,
        patient_id,
        action: action.to_string(),
        resource: resource.to_string(),
        detail,
        ip: ctx.ip.clone(),
        user_agent: ctx.user_agent.clone(),
        timestamp: Utc::now(),
    };
    repository::insert_access_entry(conn, &entry).map_err(CoreError::AuditUnavailable)?;
    Ok(entry)
}

/// Record a denied attempt after its transaction rolled back. Best-effort:
/// the operation already failed, so a second failure here is only logged.
pub fn record_denied(
    conn: &Connection,
    ctx: &AccessContext,
    patient_id: Option<Uuid>,
    action: &str,
    resource: &str,
    err: &CoreError,
) {
    let detail = Some(format!("denied: {err}"));
    if let Err(audit_err) = record(conn, ctx, patient_id, action, resource, detail) {
        tracing::warn!(action, resource, error = %audit_err, "Could not record denied access");
    }
}

/// Wrap an operation result so that failures leave a denied entry. The
/// success entry is the operation's own job, inside its transaction.
pub fn outcome<T>(
    conn: &Connection,
    ctx: &AccessContext,
    patient_id: Option<Uuid>,
    action: &str,
    resource: &str,
    result: Result<T, CoreError>,
) -> Result<T, CoreError> {
    if let Err(err) = &result {
        record_denied(conn, ctx, patient_id, action, resource, err);
    }
    result
}

/// A patient's access history, in call order. The read itself is logged.
pub fn history_for_patient(
    conn: &Connection,
    ctx: &AccessContext,
    patient_id: &Uuid,
) -> Result<Vec<AccessLogEntry>, CoreError> {
    record(conn, ctx, Some(*patient_id), "read", "access_log", None)?;
    Ok(repository::list_access_entries_for_patient(conn, patient_id)?)
}
