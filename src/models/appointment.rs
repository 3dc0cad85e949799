use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, AppointmentType, PaymentMethod, PaymentStatus};
use crate::timerange::TimeRange;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub clinician_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub price: Decimal,
    pub notes: Option<String>,
}

impl Appointment {
    pub fn range(&self) -> TimeRange {
        // Stored rows always satisfy end > start (table CHECK + scheduler
        // validation), so this cannot fail on data written by this crate.
        TimeRange::new_unchecked(self.start_time, self.end_time)
    }
}
