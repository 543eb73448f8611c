//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::FormError;

/// Identifier of a persisted record, assigned by the backing store.
///
/// Always positive; `0` and negative numbers never identify a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Interpret a submitted parameter as a record id.
    ///
    /// Accepts positive integers, integral floats and strings holding a
    /// positive integer. Anything else yields `None`.
    pub fn from_param(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => {
                if let Some(id) = n.as_u64() {
                    return (id > 0).then_some(Self(id));
                }
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f >= 1.0 && f <= u64::MAX as f64).then(|| Self(f as u64))
            }
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<RecordId> for i64 {
    fn from(value: RecordId) -> Self {
        value.0 as i64
    }
}

impl FromStr for RecordId {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .parse()
            .map_err(|e| FormError::invalid_id(format!("RecordId: {e}")))?;
        if id == 0 {
            return Err(FormError::invalid_id("RecordId: must be positive"));
        }
        Ok(Self(id))
    }
}

/// Identifier of one store transaction (log correlation only).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $t {
            type Err = FormError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| FormError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(TransactionId, "TransactionId");

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_param_accepts_positive_integers_and_numeric_strings() {
        assert_eq!(RecordId::from_param(&json!(7)), Some(RecordId::new(7)));
        assert_eq!(RecordId::from_param(&json!("12")), Some(RecordId::new(12)));
        assert_eq!(RecordId::from_param(&json!(" 4 ")), Some(RecordId::new(4)));
        assert_eq!(RecordId::from_param(&json!(3.0)), Some(RecordId::new(3)));
    }

    #[test]
    fn from_param_rejects_everything_else() {
        for raw in [json!(0), json!(-2), json!("0"), json!("str"), json!(2.5), json!([]), json!(null)] {
            assert_eq!(RecordId::from_param(&raw), None, "{raw} should not be an id");
        }
    }

    #[test]
    fn record_id_from_str_rejects_zero() {
        assert!("0".parse::<RecordId>().is_err());
        assert_eq!("9".parse::<RecordId>().unwrap(), RecordId::new(9));
    }

    #[test]
    fn transaction_ids_are_unique() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }
}
