use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteTemplate;

/// Session write-up. Exactly zero or one per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub template: NoteTemplate,
    /// Structured document; shape depends on the template and is opaque
    /// to this core.
    pub content: serde_json::Value,
    pub mood_rating: Option<i32>,
    pub private_notes: Option<String>,
    pub pinned: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Anthropometry captured during a session. Zero or one per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyMeasurement {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub body_fat_pct: Option<f64>,
    pub waist_cm: Option<f64>,
    pub hip_cm: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Plan handed to the patient after a session. Zero or one per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub description: Option<String>,
    /// Reference to an externally stored file (the file itself is not
    /// this core's concern).
    pub file_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
