//! Typed field values
//!
//! Every field in a record carries one value of the data type declared for it
//! in the registry. Untyped JSON coming from the UI boundary or from stored
//! content is converted explicitly through [`FieldValue::from_json`].

use crate::error::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Semantic data type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Free text
    Text,
    /// Whole number
    Integer,
    /// Money amount
    Currency,
    /// Percentage, 0-100 scale
    Percent,
    /// Yes/no
    Boolean,
    /// Calendar date
    Date,
    /// One of an enumerated set of options
    Choice,
    /// Array of rows
    Table,
    /// Arbitrary structured content
    FreeForm,
}

impl DataType {
    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Currency => "currency",
            DataType::Percent => "percent",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Choice => "choice",
            DataType::Table => "table",
            DataType::FreeForm => "free_form",
        }
    }

    /// Parse a type name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(DataType::Text),
            "integer" => Some(DataType::Integer),
            "currency" => Some(DataType::Currency),
            "percent" => Some(DataType::Percent),
            "boolean" => Some(DataType::Boolean),
            "date" => Some(DataType::Date),
            "choice" | "dropdown" => Some(DataType::Choice),
            "table" => Some(DataType::Table),
            "free_form" | "freeform" => Some(DataType::FreeForm),
            _ => None,
        }
    }

    /// Whether values of this type can be read as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Currency | DataType::Percent)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid data type: {}", s))
    }
}

/// One row of a table field
pub type TableRow = BTreeMap<String, Value>;

/// A field value, tagged with its data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Money amount
    Currency(f64),
    /// Percentage, 0-100 scale
    Percent(f64),
    /// Yes/no
    Boolean(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Selected option
    Choice(String),
    /// Array of rows
    Table(Vec<TableRow>),
    /// Arbitrary structured content
    FreeForm(Value),
}

impl FieldValue {
    /// The data type this value belongs to
    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::Text(_) => DataType::Text,
            FieldValue::Integer(_) => DataType::Integer,
            FieldValue::Currency(_) => DataType::Currency,
            FieldValue::Percent(_) => DataType::Percent,
            FieldValue::Boolean(_) => DataType::Boolean,
            FieldValue::Date(_) => DataType::Date,
            FieldValue::Choice(_) => DataType::Choice,
            FieldValue::Table(_) => DataType::Table,
            FieldValue::FreeForm(_) => DataType::FreeForm,
        }
    }

    /// Whether the value counts as "no value" for display and locking
    ///
    /// Numbers, booleans and dates are never blank; text and choices are blank
    /// when empty after trimming; tables when they have no rows.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => s.trim().is_empty(),
            FieldValue::Table(rows) => rows.is_empty(),
            FieldValue::FreeForm(v) => json_is_blank(v),
            FieldValue::Integer(_)
            | FieldValue::Currency(_)
            | FieldValue::Percent(_)
            | FieldValue::Boolean(_)
            | FieldValue::Date(_) => false,
        }
    }

    /// Numeric reading of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Currency(n) | FieldValue::Percent(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert untyped JSON into a value of the declared type
    ///
    /// Returns `Ok(None)` for null and for inputs that are blank once
    /// converted. Numeric strings may carry `$`, `,` and `%` decoration.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_domain::{DataType, FieldValue};
    /// use serde_json::json;
    ///
    /// let v = FieldValue::from_json("loanAmountRequested", DataType::Currency, &json!("$1,200,000"))
    ///     .unwrap();
    /// assert_eq!(v, Some(FieldValue::Currency(1_200_000.0)));
    /// ```
    pub fn from_json(
        field: &str,
        data_type: DataType,
        raw: &Value,
    ) -> Result<Option<FieldValue>, DomainError> {
        if raw.is_null() {
            return Ok(None);
        }

        let mismatch = || DomainError::TypeMismatch {
            field: field.to_string(),
            expected: data_type,
            found: describe_json(raw).to_string(),
        };

        let value = match data_type {
            DataType::Text | DataType::Choice => {
                let text = match raw {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(mismatch()),
                };
                if data_type == DataType::Text {
                    FieldValue::Text(text)
                } else {
                    FieldValue::Choice(text)
                }
            }
            DataType::Integer => {
                let Some(n) = read_number(field, data_type, raw)? else {
                    return Ok(None);
                };
                if n.fract() != 0.0 || n.abs() > i64::MAX as f64 {
                    return Err(DomainError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("{} is not a whole number", n),
                    });
                }
                FieldValue::Integer(n as i64)
            }
            DataType::Currency => match read_number(field, data_type, raw)? {
                Some(n) => FieldValue::Currency(n),
                None => return Ok(None),
            },
            DataType::Percent => match read_number(field, data_type, raw)? {
                Some(n) => FieldValue::Percent(n),
                None => return Ok(None),
            },
            DataType::Boolean => match raw {
                Value::Bool(b) => FieldValue::Boolean(*b),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "" => return Ok(None),
                    "true" | "yes" | "y" | "1" => FieldValue::Boolean(true),
                    "false" | "no" | "n" | "0" => FieldValue::Boolean(false),
                    other => {
                        return Err(DomainError::InvalidValue {
                            field: field.to_string(),
                            reason: format!("'{}' is not a yes/no answer", other),
                        })
                    }
                },
                _ => return Err(mismatch()),
            },
            DataType::Date => {
                let Value::String(s) = raw else {
                    return Err(mismatch());
                };
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                // Accept full timestamps by keeping the date part
                let date_part = trimmed.get(..10).unwrap_or(trimmed);
                let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
                    DomainError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("'{}' is not a YYYY-MM-DD date: {}", trimmed, e),
                    }
                })?;
                FieldValue::Date(date)
            }
            DataType::Table => {
                let Value::Array(items) = raw else {
                    return Err(mismatch());
                };
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Object(map) = item else {
                        return Err(mismatch());
                    };
                    rows.push(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
                }
                FieldValue::Table(rows)
            }
            DataType::FreeForm => FieldValue::FreeForm(raw.clone()),
        };

        Ok(if value.is_blank() { None } else { Some(value) })
    }

    /// Plain JSON form of the value (no type tag)
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => Value::String(s.clone()),
            FieldValue::Integer(n) => Value::from(*n),
            FieldValue::Currency(n) | FieldValue::Percent(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Table(rows) => Value::Array(
                rows.iter()
                    .map(|row| Value::Object(row.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
                    .collect(),
            ),
            FieldValue::FreeForm(v) => v.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Currency(n) => write!(f, "${}", format_number(*n)),
            FieldValue::Percent(n) => write!(f, "{}%", format_number(*n)),
            FieldValue::Boolean(b) => f.write_str(if *b { "yes" } else { "no" }),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Table(rows) => write!(f, "{} row(s)", rows.len()),
            FieldValue::FreeForm(v) => write!(f, "{}", v),
        }
    }
}

/// Render a number without a trailing `.0` and with at most two decimals
///
/// ```
/// use keel_domain::value::format_number;
///
/// assert_eq!(format_number(90.0), "90");
/// assert_eq!(format_number(66.666), "66.67");
/// assert_eq!(format_number(12.5), "12.5");
/// ```
pub fn format_number(n: f64) -> String {
    if n.fract().abs() < 1e-9 {
        format!("{:.0}", n)
    } else {
        let s = format!("{:.2}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn read_number(field: &str, data_type: DataType, raw: &Value) -> Result<Option<f64>, DomainError> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned.parse::<f64>().ok()
        }
        _ => {
            return Err(DomainError::TypeMismatch {
                field: field.to_string(),
                expected: data_type,
                found: describe_json(raw).to_string(),
            })
        }
    };

    match n {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(DomainError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} is not a finite number", raw),
        }),
    }
}

fn describe_json(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn json_is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_values() {
        assert!(FieldValue::Text("   ".into()).is_blank());
        assert!(FieldValue::Table(vec![]).is_blank());
        assert!(FieldValue::FreeForm(json!({})).is_blank());
        assert!(!FieldValue::Integer(0).is_blank());
        assert!(!FieldValue::Boolean(false).is_blank());
    }

    #[test]
    fn test_currency_strings_are_cleaned() {
        let v = FieldValue::from_json("f", DataType::Currency, &json!(" $2,000,000.50 ")).unwrap();
        assert_eq!(v, Some(FieldValue::Currency(2_000_000.5)));
    }

    #[test]
    fn test_percent_accepts_suffix() {
        let v = FieldValue::from_json("f", DataType::Percent, &json!("72.5%")).unwrap();
        assert_eq!(v, Some(FieldValue::Percent(72.5)));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let result = FieldValue::from_json("units", DataType::Integer, &json!(12.5));
        assert!(matches!(result, Err(DomainError::InvalidValue { .. })));

        let whole = FieldValue::from_json("units", DataType::Integer, &json!(12.0)).unwrap();
        assert_eq!(whole, Some(FieldValue::Integer(12)));
    }

    #[test]
    fn test_type_mismatch() {
        let result = FieldValue::from_json("f", DataType::Table, &json!("rows"));
        match result {
            Err(DomainError::TypeMismatch { expected, found, .. }) => {
                assert_eq!(expected, DataType::Table);
                assert_eq!(found, "string");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_inputs_become_none() {
        assert_eq!(FieldValue::from_json("f", DataType::Text, &json!("  ")).unwrap(), None);
        assert_eq!(FieldValue::from_json("f", DataType::Currency, &json!("")).unwrap(), None);
        assert_eq!(FieldValue::from_json("f", DataType::Date, &json!(null)).unwrap(), None);
    }

    #[test]
    fn test_date_parsing_keeps_date_part() {
        let v = FieldValue::from_json("f", DataType::Date, &json!("2025-03-01T10:00:00Z")).unwrap();
        assert_eq!(
            v,
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()))
        );
        assert!(FieldValue::from_json("f", DataType::Date, &json!("March 1st")).is_err());
    }

    #[test]
    fn test_boolean_words() {
        assert_eq!(
            FieldValue::from_json("f", DataType::Boolean, &json!("Yes")).unwrap(),
            Some(FieldValue::Boolean(true))
        );
        assert!(FieldValue::from_json("f", DataType::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(FieldValue::Currency(500000.0)).unwrap();
        assert_eq!(json, json!({"type": "currency", "value": 500000.0}));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Percent(90.0).to_string(), "90%");
        assert_eq!(FieldValue::Currency(1800000.0).to_string(), "$1800000");
        assert_eq!(FieldValue::Boolean(true).to_string(), "yes");
    }
}
