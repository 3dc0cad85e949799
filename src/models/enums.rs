use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(PatientStatus {
    Active => "ACTIVE",
    Archived => "ARCHIVED",
    Waitlist => "WAITLIST",
});

str_enum!(AppointmentType {
    Consultation => "CONSULTATION",
    Evaluation => "EVALUATION",
    FollowUp => "FOLLOW_UP",
});

str_enum!(AppointmentStatus {
    Scheduled => "SCHEDULED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    NoShow => "NO_SHOW",
});

str_enum!(PaymentStatus {
    Pending => "PENDING",
    Paid => "PAID",
});

str_enum!(PaymentMethod {
    Cash => "CASH",
    Card => "CARD",
    Transfer => "TRANSFER",
    Other => "OTHER",
});

str_enum!(TransactionType {
    Income => "INCOME",
    Expense => "EXPENSE",
});

str_enum!(NoteTemplate {
    Soap => "SOAP",
    Dap => "DAP",
    Free => "FREE",
});

str_enum!(Credential {
    Crn => "CRN",
    Crm => "CRM",
    Crp => "CRP",
    Other => "OTHER",
});

str_enum!(ArtifactKind {
    ClinicalNote => "CLINICAL_NOTE",
    FinanceTransaction => "FINANCE_TRANSACTION",
    BodyMeasurement => "BODY_MEASUREMENT",
    MealPlan => "MEAL_PLAN",
});

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppointmentStatus {
    /// Statuses that occupy the clinician's calendar for overlap checks.
    pub fn blocks_calendar(&self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Valid next statuses from the current one.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            Self::Scheduled => &[Self::InProgress, Self::Cancelled, Self::NoShow],
            Self::InProgress => &[Self::Completed, Self::NoShow],
            Self::Completed | Self::Cancelled | Self::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}
