//! Database values and their JSON normalization.
//!
//! Drivers hand back heterogeneous value kinds (temporal, fixed-point decimal,
//! binary, unique identifiers). [`normalize`] maps each into a stable
//! JSON-compatible shape for prompts, CLI output and API responses.

use crate::types::{PipelineError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A single cell returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Fixed-point decimal (DECIMAL / NUMERIC columns)
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Timestamp without zone (DATETIME columns)
    DateTime(NaiveDateTime),
    /// Timestamp with zone, stored as UTC
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Uuid(Uuid),
    /// Driver value with no known mapping; carries the driver's type name
    Unsupported(String),
}

impl SqlValue {
    /// Short type name used in error messages and logs.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::Timestamp(_) => "timestamp",
            Self::Blob(_) => "blob",
            Self::Uuid(_) => "uuid",
            Self::Unsupported(name) => name,
        }
    }
}

/// Convert a database value into a JSON-compatible value.
///
/// # Mapping
///
/// | Kind | JSON |
/// |------|------|
/// | date / time / datetime / timestamp | ISO-8601 string |
/// | decimal | number (f64) |
/// | blob | base64 string |
/// | uuid | hyphenated string |
/// | null / bool / integer / text | native |
///
/// # Errors
///
/// Returns `PipelineError::UnsupportedType` for non-finite reals, decimals
/// outside f64 range and driver values without a mapping.
pub fn normalize(value: &SqlValue) -> Result<JsonValue> {
    let json = match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(b) => JsonValue::Bool(*b),
        SqlValue::Integer(i) => JsonValue::from(*i),
        SqlValue::Real(f) => finite_number(*f, "real")?,
        SqlValue::Text(s) => JsonValue::String(s.clone()),
        SqlValue::Decimal(d) => {
            let f = d.to_f64().ok_or_else(|| {
                PipelineError::UnsupportedType(format!("decimal {} does not fit in f64", d))
            })?;
            finite_number(f, "decimal")?
        }
        SqlValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
        SqlValue::DateTime(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        SqlValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        SqlValue::Blob(bytes) => JsonValue::String(STANDARD.encode(bytes)),
        SqlValue::Uuid(id) => JsonValue::String(id.to_string()),
        SqlValue::Unsupported(type_name) => {
            return Err(PipelineError::UnsupportedType(format!(
                "type {} not serializable",
                type_name
            )))
        }
    };
    Ok(json)
}

/// Normalize every cell of a row, preserving column order.
pub fn normalize_row(row: &[SqlValue]) -> Result<Vec<JsonValue>> {
    row.iter().map(normalize).collect()
}

fn finite_number(f: f64, kind: &str) -> Result<JsonValue> {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| PipelineError::UnsupportedType(format!("non-finite {} {}", kind, f)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn test_temporal_values_are_iso8601() {
        let dt = NaiveDate::from_ymd_opt(2006, 2, 15)
            .unwrap()
            .and_hms_opt(4, 34, 33)
            .unwrap();
        assert_eq!(normalize(&SqlValue::DateTime(dt)).unwrap(), "2006-02-15T04:34:33");

        let d = NaiveDate::from_ymd_opt(2005, 5, 24).unwrap();
        assert_eq!(normalize(&SqlValue::Date(d)).unwrap(), "2005-05-24");

        let t = NaiveTime::from_hms_opt(22, 53, 30).unwrap();
        assert_eq!(normalize(&SqlValue::Time(t)).unwrap(), "22:53:30");
    }

    #[test]
    fn test_decimal_becomes_float() {
        let d = Decimal::from_str("4.99").unwrap();
        assert_eq!(normalize(&SqlValue::Decimal(d)).unwrap(), serde_json::json!(4.99));
    }

    #[test]
    fn test_blob_becomes_base64() {
        let v = SqlValue::Blob(b"hello".to_vec());
        assert_eq!(normalize(&v).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_uuid_becomes_text() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            normalize(&SqlValue::Uuid(id)).unwrap(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_unsupported_values_are_surfaced() {
        let err = normalize(&SqlValue::Unsupported("geometry".to_string())).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedType(_)));

        let err = normalize(&SqlValue::Real(f64::NAN)).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedType(_)));
    }

    #[test]
    fn test_normalize_row_keeps_order() {
        let row = vec![
            SqlValue::Integer(1),
            SqlValue::Text("ACADEMY DINOSAUR".to_string()),
            SqlValue::Null,
        ];
        let json = normalize_row(&row).unwrap();
        assert_eq!(json, vec![serde_json::json!(1), serde_json::json!("ACADEMY DINOSAUR"), JsonValue::Null]);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_pure(i in any::<i64>(), s in ".*", bytes in proptest::collection::vec(any::<u8>(), 0..64), f in -1.0e12f64..1.0e12f64) {
            for value in [
                SqlValue::Integer(i),
                SqlValue::Text(s.clone()),
                SqlValue::Blob(bytes.clone()),
                SqlValue::Real(f),
            ] {
                let first = normalize(&value).unwrap();
                let second = normalize(&value).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
