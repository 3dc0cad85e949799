//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `rusqlite::Connection`, one sub-module per
//! aggregate. All public functions are re-exported here.

mod access_log;
mod appointment;
mod artifact;
mod clinician;
mod finance;
mod patient;

use std::str::FromStr;

use rusqlite::types::Type;
use uuid::Uuid;

use super::DatabaseError;

pub use access_log::*;
pub use appointment::*;
pub use artifact::*;
pub use clinician::*;
pub use finance::*;
pub use patient::*;

/// Map a TEXT column to a Uuid inside a row-mapping closure.
pub(crate) fn uuid_column(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map an optional TEXT column to an optional Uuid.
pub(crate) fn uuid_column_opt(idx: usize, value: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    value.map(|v| uuid_column(idx, v)).transpose()
}

/// Map a TEXT column holding a fixed enum token.
pub(crate) fn enum_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    T::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a TEXT column holding a decimal amount.
pub(crate) fn decimal_column(idx: usize, value: String) -> rusqlite::Result<rust_decimal::Decimal> {
    rust_decimal::Decimal::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a TEXT column holding a JSON document.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    value: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
