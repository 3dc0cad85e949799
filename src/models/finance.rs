use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TransactionType;

/// One ledger row. `appointment_id` present means the row was derived from
/// a completed, paid appointment; absent means a manual entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceTransaction {
    pub id: Uuid,
    pub clinician_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub category: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

impl FinanceTransaction {
    pub fn is_derived(&self) -> bool {
        self.appointment_id.is_some()
    }
}

/// Ledger listing filter. All fields optional; empty filter lists all.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub transaction_type: Option<TransactionType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}
