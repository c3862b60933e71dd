//! Scalar values carried in query parameters and result rows.
//!
//! A [`Value`] is the unit that crosses the wire in both directions: as a
//! named parameter inside a [`QueryRequest`](crate::QueryRequest) and as a
//! column inside a result [`Row`]. The enum is adjacently tagged so that
//! integers, floats and decimals never collapse into one JSON number type,
//! and decimals are serialized as strings to keep every digit.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;
use serde::{Deserialize, Serialize};

/// One result row: column values in `SELECT` order.
pub type Row = Vec<Value>;

/// Named statement parameters, keyed by placeholder name.
pub type Params = BTreeMap<String, Value>;

/// A single scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// `BOOLEAN`.
    Bool(bool),
    /// Any integer column (`SMALLINT`, `INTEGER`, `BIGINT`).
    Int(i64),
    /// `REAL` / `DOUBLE PRECISION`.
    Float(f64),
    /// `NUMERIC`, kept exact.
    Decimal(Decimal),
    /// Any text-like column.
    Text(String),
    /// `TIMESTAMP` without time zone.
    Timestamp(NaiveDateTime),
    /// `TIMESTAMPTZ`, normalized to UTC.
    TimestampTz(DateTime<Utc>),
    /// `DATE`.
    Date(NaiveDate),
}

impl Value {
    /// Whether this is SQL `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Return the value as a boolean, if it is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the value as an `i64`, if it is an integer.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Return the value as an exact decimal.
    ///
    /// Integers convert losslessly. Floats convert through their shortest
    /// decimal representation and return `None` for `NaN`/infinity.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Float(f) => Decimal::try_from(*f).ok(),
            _ => None,
        }
    }

    /// Return the value as an `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            Self::Int(i) => Decimal::from(*i).to_f64(),
            _ => None,
        }
    }

    /// Return the value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as a naive timestamp.
    ///
    /// `TIMESTAMPTZ` values are returned in UTC.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::TimestampTz(ts) => Some(ts.naive_utc()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("-"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::TimestampTz(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%:z")),
            Self::Date(d) => write!(f, "{d}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let json = serde_json::to_value(Value::Int(1)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int", "value": 1}));

        let json = serde_json::to_value(Value::Null).unwrap();
        assert_eq!(json, serde_json::json!({"type": "null"}));
    }

    #[test]
    fn decimal_keeps_every_digit() {
        let d = Decimal::from_str("12345678901234.56789").unwrap();
        let bytes = serde_json::to_vec(&Value::Decimal(d)).unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, Value::Decimal(d));
    }

    #[test]
    fn float_survives_the_wire_exactly() {
        let x = 0.1_f64 + 0.2_f64;
        let bytes = serde_json::to_vec(&Value::Float(x)).unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.as_f64(), Some(x));
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("tea")), Value::Text("tea".to_owned()));
    }

    #[test]
    fn decimal_accessor_widens_integers() {
        assert_eq!(Value::Int(7).as_decimal(), Some(Decimal::from(7)));
        assert_eq!(Value::Text("7".to_owned()).as_decimal(), None);
        assert_eq!(Value::Float(f64::NAN).as_decimal(), None);
    }

    #[test]
    fn tz_timestamp_reads_as_utc() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T08:30:00+08:00")
            .unwrap()
            .with_timezone(&Utc);
        let naive = Value::TimestampTz(ts).as_timestamp().unwrap();
        assert_eq!(naive.format("%H:%M").to_string(), "00:30");
    }
}
