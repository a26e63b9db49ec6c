//! Column values as returned by the query API
//!
//! Numbers keep the text they arrived as so that conversion is explicit and
//! the received text is available for tags.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::metric::MetricValue;

/// Value conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("cannot parse {value:?} as a number: {reason}")]
    InvalidNumber { value: String, reason: String },

    #[error("cannot parse {value:?} as an integer timestamp")]
    InvalidTimestamp { value: String },

    #[error("unsupported value type {kind}")]
    UnsupportedValue { kind: &'static str },
}

/// A single cell of a query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    /// Integral number, as text
    Integer(String),
    /// Non-integral number, as text
    Float(String),
    Text(String),
    Bool(bool),
    Null,
}

impl ColumnValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Bool(_) => "bool",
            Self::Null => "null",
        }
    }

    /// Textual form used when the column becomes a tag
    pub fn to_tag_string(&self) -> String {
        match self {
            Self::Integer(s) | Self::Float(s) | Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Null => String::new(),
        }
    }
}

impl From<serde_json::Value> for ColumnValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer(n.to_string()),
            Value::Number(n) => Self::Float(n.to_string()),
            Value::String(s) => Self::Text(s),
            // Not produced by the query API; keep the JSON text
            other @ (Value::Array(_) | Value::Object(_)) => Self::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Convert the value column of a row.
///
/// Numbers become `f64`, strings pass through; any other shape is an error.
pub fn convert_value(value: &ColumnValue) -> Result<MetricValue, ConversionError> {
    match value {
        ColumnValue::Integer(s) | ColumnValue::Float(s) => s
            .parse::<f64>()
            .map(MetricValue::Float)
            .map_err(|e| ConversionError::InvalidNumber {
                value: s.clone(),
                reason: e.to_string(),
            }),
        ColumnValue::Text(s) => Ok(MetricValue::Text(s.clone())),
        ColumnValue::Bool(_) | ColumnValue::Null => Err(ConversionError::UnsupportedValue {
            kind: value.kind(),
        }),
    }
}

/// Parse the time column as epoch nanoseconds
pub fn parse_timestamp(value: &ColumnValue) -> Result<i64, ConversionError> {
    match value {
        ColumnValue::Integer(s) => s
            .parse::<i64>()
            .map_err(|_| ConversionError::InvalidTimestamp { value: s.clone() }),
        ColumnValue::Float(s) | ColumnValue::Text(s) => {
            Err(ConversionError::InvalidTimestamp { value: s.clone() })
        }
        ColumnValue::Bool(_) | ColumnValue::Null => Err(ConversionError::UnsupportedValue {
            kind: value.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(ColumnValue::from(json!(42)), ColumnValue::Integer("42".into()));
        assert_eq!(ColumnValue::from(json!(-7)), ColumnValue::Integer("-7".into()));
        assert_eq!(ColumnValue::from(json!(1.5)), ColumnValue::Float("1.5".into()));
        assert_eq!(ColumnValue::from(json!("up")), ColumnValue::Text("up".into()));
        assert_eq!(ColumnValue::from(json!(true)), ColumnValue::Bool(true));
        assert_eq!(ColumnValue::from(json!(null)), ColumnValue::Null);
        assert_eq!(ColumnValue::from(json!([1, 2])), ColumnValue::Text("[1,2]".into()));
    }

    #[test]
    fn test_deserialize_row() {
        let row: Vec<ColumnValue> =
            serde_json::from_str(r#"[1000000000, 0.25, "server1", null]"#).unwrap();
        assert_eq!(
            row,
            vec![
                ColumnValue::Integer("1000000000".into()),
                ColumnValue::Float("0.25".into()),
                ColumnValue::Text("server1".into()),
                ColumnValue::Null,
            ]
        );
    }

    #[test]
    fn test_convert_numbers() {
        assert_eq!(
            convert_value(&ColumnValue::Integer("42".into())).unwrap(),
            MetricValue::Float(42.0)
        );
        assert_eq!(
            convert_value(&ColumnValue::Float("0.5".into())).unwrap(),
            MetricValue::Float(0.5)
        );
    }

    #[test]
    fn test_convert_number_failure_names_value() {
        let err = convert_value(&ColumnValue::Float("4x2".into())).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidNumber { ref value, .. } if value == "4x2"));
        assert!(err.to_string().contains("4x2"));
    }

    #[test]
    fn test_convert_text_passes_through() {
        assert_eq!(
            convert_value(&ColumnValue::Text("ok".into())).unwrap(),
            MetricValue::Text("ok".into())
        );
    }

    #[test]
    fn test_convert_rejects_other_shapes() {
        assert_eq!(
            convert_value(&ColumnValue::Bool(true)).unwrap_err(),
            ConversionError::UnsupportedValue { kind: "bool" }
        );
        assert_eq!(
            convert_value(&ColumnValue::Null).unwrap_err(),
            ConversionError::UnsupportedValue { kind: "null" }
        );
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp(&ColumnValue::Integer("1000000000".into())).unwrap(),
            1_000_000_000
        );
        assert!(parse_timestamp(&ColumnValue::Float("1.5".into())).is_err());
        assert!(parse_timestamp(&ColumnValue::Text("2024-01-01T00:00:00Z".into())).is_err());
        assert!(parse_timestamp(&ColumnValue::Null).is_err());
        assert!(parse_timestamp(&ColumnValue::Integer("99999999999999999999".into())).is_err());
    }

    #[test]
    fn test_tag_string() {
        assert_eq!(ColumnValue::Integer("3".into()).to_tag_string(), "3");
        assert_eq!(ColumnValue::Bool(false).to_tag_string(), "false");
        assert_eq!(ColumnValue::Null.to_tag_string(), "");
    }
}
