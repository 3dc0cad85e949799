use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Credential;

/// The account owner. Created once at provisioning; only the billing
/// defaults (and working window) change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinician {
    pub id: Uuid,
    pub name: String,
    pub credential: Credential,
    /// ISO 4217 code, e.g. "USD", "BRL".
    pub currency: String,
    pub default_session_minutes: u32,
    pub default_session_price: Decimal,
    /// Optional working window as minutes-of-day in UTC; appointments
    /// outside [start, end) are rejected. None means unconstrained.
    pub work_start_minute: Option<u32>,
    pub work_end_minute: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Mutable subset of a clinician row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingDefaults {
    pub currency: String,
    pub default_session_minutes: u32,
    pub default_session_price: Decimal,
    pub work_start_minute: Option<u32>,
    pub work_end_minute: Option<u32>,
}
