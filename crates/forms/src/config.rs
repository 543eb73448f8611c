//! Engine configuration.

use serde::{Deserialize, Serialize};

pub const LIST_POSITIONS_ENV: &str = "FORMTREE_LIST_POSITIONS";
pub const UNPERMITTED_ENV: &str = "FORMTREE_UNPERMITTED";

/// How ordinal keys of a list submission map onto existing children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListPositions {
    /// A numeric key below the current child count addresses that child;
    /// every other key appends a new child.
    #[default]
    ParseIndex,
    /// The n-th entry in submission order addresses the n-th child,
    /// whatever its key.
    IterationOrder,
}

/// What binding does with keys the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpermittedPolicy {
    Ignore,
    #[default]
    Log,
    Raise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub list_positions: ListPositions,
    pub unpermitted: UnpermittedPolicy,
}

impl EngineConfig {
    /// Read overrides from the process environment.
    ///
    /// Unknown values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(LIST_POSITIONS_ENV) {
            config.list_positions = parse_setting(LIST_POSITIONS_ENV, &raw).unwrap_or_default();
        }
        if let Some(raw) = lookup(UNPERMITTED_ENV) {
            config.unpermitted = parse_setting(UNPERMITTED_ENV, &raw).unwrap_or_default();
        }
        config
    }

    pub fn with_list_positions(mut self, list_positions: ListPositions) -> Self {
        self.list_positions = list_positions;
        self
    }

    pub fn with_unpermitted(mut self, unpermitted: UnpermittedPolicy) -> Self {
        self.unpermitted = unpermitted;
        self
    }
}

fn parse_setting<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    let normalized = raw.trim().to_ascii_lowercase();
    match serde_json::from_value(serde_json::Value::String(normalized)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(%key, value = %raw, "unrecognized setting; using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_parse_index_and_log() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config.list_positions, ListPositions::ParseIndex);
        assert_eq!(config.unpermitted, UnpermittedPolicy::Log);
    }

    #[test]
    fn reads_known_values() {
        let config = EngineConfig::from_lookup(lookup(&[
            (LIST_POSITIONS_ENV, "iteration_order"),
            (UNPERMITTED_ENV, " RAISE "),
        ]));
        assert_eq!(config.list_positions, ListPositions::IterationOrder);
        assert_eq!(config.unpermitted, UnpermittedPolicy::Raise);
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[(UNPERMITTED_ENV, "explode")]));
        assert_eq!(config.unpermitted, UnpermittedPolicy::Log);
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"unpermitted": "ignore"}"#).unwrap();
        assert_eq!(config.unpermitted, UnpermittedPolicy::Ignore);
        assert_eq!(config.list_positions, ListPositions::ParseIndex);
    }
}
