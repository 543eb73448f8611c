//! Field values and scalar coercion.
//!
//! Every value that flows through the engine is a [`Value`]: scalars, a
//! reference to a persisted record, or a list of either. Nested forms are not
//! values; they are children of a form node.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::record::RecordRef;

/// Field values of one form node (or attributes of one record), by name.
pub type FieldValues = BTreeMap<String, Value>;

/// A typed value held by a form field or a record attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Ref(RecordRef),
    List(Vec<Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Blank in the form-submission sense: null, whitespace-only text, an
    /// empty list, or `false`.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view used by numericality rules; numeric text counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Uncoerced conversion of a submitted JSON value.
    ///
    /// Objects have no field representation and are kept as their JSON text.
    pub fn from_json(raw: &JsonValue) -> Self {
        match raw {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(_) => Self::Text(raw.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            Self::Ref(r) => JsonValue::from(r.id.get()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Ref(r) => write!(f, "{}#{}", r.record_type, r.id),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Declared kind of a primitive form property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ScalarKind {
    /// Coerce a submitted value to this kind.
    ///
    /// Never fails: a value that cannot be coerced is stored as-is and is
    /// reported later by validation (see [`ScalarKind::accepts`]). Blank text
    /// becomes `Null` for every non-text kind.
    pub fn coerce(self, raw: &JsonValue) -> Value {
        let fallback = || Value::from_json(raw);
        if let JsonValue::String(s) = raw {
            if self != Self::Text && s.trim().is_empty() {
                return Value::Null;
            }
        }

        match (self, raw) {
            (_, JsonValue::Null) => Value::Null,

            (Self::Text, JsonValue::String(s)) => Value::Text(s.clone()),
            (Self::Text, JsonValue::Number(n)) => Value::Text(n.to_string()),
            (Self::Text, JsonValue::Bool(b)) => Value::Text(b.to_string()),

            (Self::Integer, JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().and_then(truncate).map_or_else(fallback, Value::Int),
            },
            (Self::Integer, JsonValue::String(s)) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Value::Int(i),
                    Err(_) => s
                        .parse::<f64>()
                        .ok()
                        .and_then(truncate)
                        .map_or_else(fallback, Value::Int),
                }
            }

            (Self::Float, JsonValue::Number(n)) => n.as_f64().map_or_else(fallback, Value::Float),
            (Self::Float, JsonValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map_or_else(fallback, Value::Float),

            (Self::Boolean, JsonValue::Bool(b)) => Value::Bool(*b),
            (Self::Boolean, JsonValue::Number(n)) => match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => fallback(),
            },
            (Self::Boolean, JsonValue::String(s)) => parse_bool(s).map_or_else(fallback, Value::Bool),

            (Self::Date, JsonValue::String(s)) => parse_date(s.trim()).map_or_else(fallback, Value::Date),
            (Self::DateTime, JsonValue::String(s)) => {
                parse_datetime(s.trim()).map_or_else(fallback, Value::DateTime)
            }

            _ => fallback(),
        }
    }

    /// Whether a stored value conforms to this kind (`Null` always does).
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Integer, Value::Int(_)) => true,
            (Self::Float, Value::Float(_) | Value::Int(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::DateTime, Value::DateTime(_)) => true,
            _ => false,
        }
    }

    /// Validation message for a value this kind does not accept.
    pub fn mismatch_message(self) -> &'static str {
        match self {
            Self::Text => "is invalid",
            Self::Integer | Self::Float => "is not a number",
            Self::Boolean => "is not a valid boolean",
            Self::Date => "is not a valid date",
            Self::DateTime => "is not a valid datetime",
        }
    }
}

fn truncate(f: f64) -> Option<i64> {
    (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// True when every value is blank (used by reject-if-blank relations).
pub fn all_blank(values: &FieldValues) -> bool {
    values.values().all(Value::is_blank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn integer_coercion_truncates_numeric_text() {
        assert_eq!(ScalarKind::Integer.coerce(&json!("666.1")), Value::Int(666));
        assert_eq!(ScalarKind::Integer.coerce(&json!(" 42 ")), Value::Int(42));
        assert_eq!(ScalarKind::Integer.coerce(&json!(7)), Value::Int(7));
    }

    #[test]
    fn failed_coercion_keeps_raw_value() {
        let stored = ScalarKind::Integer.coerce(&json!("six"));
        assert_eq!(stored, Value::text("six"));
        assert!(!ScalarKind::Integer.accepts(&stored));
    }

    #[test]
    fn blank_text_is_null_for_typed_kinds_only() {
        assert_eq!(ScalarKind::Integer.coerce(&json!("")), Value::Null);
        assert_eq!(ScalarKind::Date.coerce(&json!("  ")), Value::Null);
        assert_eq!(ScalarKind::Text.coerce(&json!("")), Value::text(""));
    }

    #[test]
    fn date_and_boolean_coercion() {
        assert_eq!(
            ScalarKind::Date.coerce(&json!("1998-05-25")),
            Value::Date(NaiveDate::from_ymd_opt(1998, 5, 25).unwrap())
        );
        assert_eq!(ScalarKind::Date.coerce(&json!("25/05/1998")), Value::text("25/05/1998"));
        assert_eq!(ScalarKind::Boolean.coerce(&json!("1")), Value::Bool(true));
        assert_eq!(ScalarKind::Boolean.coerce(&json!("false")), Value::Bool(false));
        assert_eq!(ScalarKind::Boolean.coerce(&json!("maybe")), Value::text("maybe"));
    }

    #[test]
    fn blankness_follows_form_semantics() {
        assert!(Value::Null.is_blank());
        assert!(Value::text("   ").is_blank());
        assert!(Value::Bool(false).is_blank());
        assert!(Value::List(vec![]).is_blank());
        assert!(!Value::Int(0).is_blank());
        assert!(!Value::text("x").is_blank());
    }

    #[test]
    fn value_serializes_with_kind_tag() {
        let json = serde_json::to_value(Value::Int(5)).unwrap();
        assert_eq!(json, json!({"kind": "int", "value": 5}));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: integers survive coercion whether submitted as numbers or text.
        #[test]
        fn integer_coercion_is_lossless(n in any::<i64>()) {
            prop_assert_eq!(ScalarKind::Integer.coerce(&json!(n)), Value::Int(n));
            prop_assert_eq!(ScalarKind::Integer.coerce(&json!(n.to_string())), Value::Int(n));
        }

        /// Property: coercion never produces a value of a foreign kind unless it
        /// kept the raw submission.
        #[test]
        fn coercion_is_accepted_or_raw(s in "\\PC{0,12}") {
            for kind in [ScalarKind::Integer, ScalarKind::Float, ScalarKind::Boolean, ScalarKind::Date] {
                let v = kind.coerce(&json!(s.clone()));
                prop_assert!(kind.accepts(&v) || v == Value::text(s.clone()));
            }
        }
    }
}
