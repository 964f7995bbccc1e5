use crate::core::Result;
use serde::{Deserialize, Serialize};

/// Which columns a full-entity INSERT writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertStrategy {
    /// Every mapped column, nulls included (static template).
    #[default]
    AllFields,
    /// Keys plus non-null columns only, so no tombstones are written for
    /// absent values (dynamic text).
    NotNullFields,
}

/// Persistence engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keyspace used for every table instead of the model's own
    pub keyspace: Option<String>,

    pub insert_strategy: InsertStrategy,

    /// TTL in seconds when neither the call nor the entity sets one
    pub default_ttl: Option<u32>,

    /// Bound on the dynamic statement tier; unbounded when `None`
    pub dynamic_cache_capacity: Option<usize>,

    /// Emit every statement and its bound value count at DEBUG level
    pub log_statements: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keyspace: None,
            insert_strategy: InsertStrategy::AllFields,
            default_ttl: None,
            dynamic_cache_capacity: None,
            log_statements: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keyspace override
    pub fn keyspace(mut self, keyspace: &str) -> Self {
        self.keyspace = Some(keyspace.to_string());
        self
    }

    pub fn insert_strategy(mut self, strategy: InsertStrategy) -> Self {
        self.insert_strategy = strategy;
        self
    }

    /// Set the engine-wide default TTL
    pub fn default_ttl(mut self, seconds: u32) -> Self {
        self.default_ttl = Some(seconds);
        self
    }

    /// Bound the dynamic statement tier
    pub fn dynamic_cache_capacity(mut self, capacity: usize) -> Self {
        self.dynamic_cache_capacity = Some(capacity);
        self
    }

    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Parse from JSON; absent fields keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use cqlmapper::engine::{EngineConfig, InsertStrategy};
    ///
    /// let config = EngineConfig::from_json(r#"{"insert_strategy": "not_null_fields"}"#).unwrap();
    /// assert_eq!(config.insert_strategy, InsertStrategy::NotNullFields);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
