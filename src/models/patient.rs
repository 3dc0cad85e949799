use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PatientStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub clinician_id: Uuid,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub status: PatientStatus,
    /// Free-form background the clinician keeps on the patient.
    pub clinical_context: Option<String>,
    pub goals: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relation: Option<String>,
}

/// Input for registering a patient. Status starts as given (ACTIVE for a
/// regular intake, WAITLIST for prospects awaiting evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub clinician_id: Uuid,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub status: PatientStatus,
    pub clinical_context: Option<String>,
    pub goals: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
}
