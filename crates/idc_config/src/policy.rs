//! Settings policy for metric descriptors
//!
//! Every requested metric carries a flat string key/value map supplied by the
//! host. The policy declares which keys are required and which fall back to a
//! default, and [`QuerySettings`] is the typed view the collector works with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ConfigError;

/// Namespace prefix the policy rules are registered under
pub const POLICY_PREFIX: [&str; 2] = ["intel", "influxdb-data"];

/// Default name of the value column
pub const DEFAULT_DATA_TYPE: &str = "value";

/// Substrings that mark a destructive statement
const FORBIDDEN_QUERY_WORDS: [&str; 2] = ["drop", "delete"];

/// String key/value settings for one descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, returning self for chaining
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a string setting.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingField`] naming the key when it is absent.
    pub fn get_string(&self, key: &str) -> Result<&str, ConfigError> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingField(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Settings {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// A single string setting rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRule {
    pub key: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl StringRule {
    pub fn required(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Declaration of the settings a descriptor accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPolicy {
    /// Namespace prefix the rules apply to
    pub namespace: Vec<String>,
    pub rules: Vec<StringRule>,
}

impl ConfigPolicy {
    pub fn new(namespace: &[&str]) -> Self {
        Self {
            namespace: namespace.iter().map(|s| (*s).to_string()).collect(),
            rules: Vec::new(),
        }
    }

    pub fn add_rule(mut self, rule: StringRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The policy of the InfluxDB data collector
    pub fn influx() -> Self {
        Self::new(&POLICY_PREFIX)
            .add_rule(StringRule::required("host"))
            .add_rule(StringRule::required("database"))
            .add_rule(StringRule::required("user"))
            .add_rule(StringRule::required("password"))
            .add_rule(StringRule::required("query"))
            .add_rule(StringRule::optional("data_type", DEFAULT_DATA_TYPE))
    }

    /// Fill defaults and check required keys.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingField`] for the first required key that is absent.
    pub fn apply(&self, settings: &Settings) -> Result<Settings, ConfigError> {
        let mut resolved = settings.clone();
        for rule in &self.rules {
            if resolved.contains(&rule.key) {
                continue;
            }
            match (&rule.default, rule.required) {
                (Some(default), _) => resolved.insert(rule.key.clone(), default.clone()),
                (None, true) => return Err(ConfigError::MissingField(rule.key.clone())),
                (None, false) => {}
            }
        }
        Ok(resolved)
    }
}

/// Typed, validated settings for one query descriptor
#[derive(Clone, PartialEq, Eq)]
pub struct QuerySettings {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub query: String,
    /// Name of the column holding the metric value
    pub data_type: String,
}

impl QuerySettings {
    /// Resolve descriptor settings against [`ConfigPolicy::influx`].
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingField`] when a required key is absent and
    /// [`ConfigError::ForbiddenQuery`] when the query contains `drop` or `delete`.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let resolved = ConfigPolicy::influx().apply(settings)?;
        let query = resolved.get_string("query")?.to_string();

        // Plain substring match, case-sensitive.
        if FORBIDDEN_QUERY_WORDS.iter().any(|word| query.contains(word)) {
            return Err(ConfigError::ForbiddenQuery(query));
        }

        Ok(Self {
            host: resolved.get_string("host")?.to_string(),
            database: resolved.get_string("database")?.to_string(),
            user: resolved.get_string("user")?.to_string(),
            password: resolved.get_string("password")?.to_string(),
            query,
            data_type: resolved.get_string("data_type")?.to_string(),
        })
    }
}

impl std::fmt::Debug for QuerySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySettings")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("query", &self.query)
            .field("data_type", &self.data_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_settings() -> Settings {
        Settings::new()
            .with("host", "http://localhost:8086")
            .with("database", "telegraf")
            .with("user", "admin")
            .with("password", "secret")
            .with("query", "SELECT usage_idle FROM cpu")
    }

    #[test]
    fn test_influx_policy_rules() {
        let policy = ConfigPolicy::influx();
        assert_eq!(policy.namespace, vec!["intel", "influxdb-data"]);
        assert_eq!(policy.rules.len(), 6);

        let required: Vec<_> = policy
            .rules
            .iter()
            .filter(|r| r.required)
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(required, vec!["host", "database", "user", "password", "query"]);

        let data_type = policy.rules.iter().find(|r| r.key == "data_type").unwrap();
        assert!(!data_type.required);
        assert_eq!(data_type.default.as_deref(), Some("value"));
    }

    #[test]
    fn test_resolve_applies_default_data_type() {
        let settings = QuerySettings::resolve(&full_settings()).unwrap();
        assert_eq!(settings.data_type, "value");
        assert_eq!(settings.database, "telegraf");
    }

    #[test]
    fn test_resolve_keeps_explicit_data_type() {
        let settings =
            QuerySettings::resolve(&full_settings().with("data_type", "usage_idle")).unwrap();
        assert_eq!(settings.data_type, "usage_idle");
    }

    #[test]
    fn test_resolve_missing_required_field() {
        let mut map = BTreeMap::new();
        map.insert("host".to_string(), "http://localhost:8086".to_string());
        let err = QuerySettings::resolve(&Settings::from(map)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "database"));
    }

    #[test]
    fn test_resolve_rejects_drop_and_delete() {
        for query in ["drop measurement cpu", "delete from cpu where time < now()"] {
            let err = QuerySettings::resolve(&full_settings().with("query", query)).unwrap_err();
            assert!(matches!(err, ConfigError::ForbiddenQuery(_)));
            assert!(err.to_string().contains(query));
        }
    }

    #[test]
    fn test_forbidden_words_are_case_sensitive() {
        let settings =
            QuerySettings::resolve(&full_settings().with("query", "DROP MEASUREMENT cpu"))
                .unwrap();
        assert_eq!(settings.query, "DROP MEASUREMENT cpu");
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = QuerySettings::resolve(&full_settings()).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_settings_get_string_missing() {
        let err = Settings::new().get_string("query").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: query");
    }
}
