use crate::core::{MappingError, Result, Value};
use serde::{Deserialize, Serialize};

/// Per-call write modifiers.
///
/// `ttl` and `timestamp` render as `USING TTL ? AND TIMESTAMP ?`;
/// `if_not_exists`, `if_exists` and `conditions` turn the write into a
/// lightweight transaction. Only one of the three may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub ttl: Option<u32>,
    /// Write timestamp in microseconds since the epoch.
    pub timestamp: Option<i64>,
    pub if_not_exists: bool,
    pub if_exists: bool,
    /// `IF col = ? AND ...`, in declaration order.
    pub conditions: Vec<(String, Value)>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, seconds: u32) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn with_timestamp(mut self, micros: i64) -> Self {
        self.timestamp = Some(micros);
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn with_condition(mut self, column: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), expected.into()));
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.if_not_exists || self.if_exists || !self.conditions.is_empty()
    }

    /// Whether the statement text depends on these options beyond what the
    /// static templates cover.
    pub fn needs_dynamic_text(&self) -> bool {
        self.timestamp.is_some() || !self.conditions.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let guards = [
            self.if_not_exists,
            self.if_exists,
            !self.conditions.is_empty(),
        ];
        if guards.iter().filter(|set| **set).count() > 1 {
            return Err(MappingError::UnsupportedOperation(
                "IF NOT EXISTS, IF EXISTS and IF conditions are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_are_mutually_exclusive() {
        assert!(WriteOptions::new().if_exists().validate().is_ok());
        let both = WriteOptions::new().if_exists().with_condition("v", 1i64);
        assert!(matches!(
            both.validate(),
            Err(MappingError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn timestamp_needs_dynamic_text() {
        assert!(!WriteOptions::new().with_ttl(10).needs_dynamic_text());
        assert!(WriteOptions::new().with_timestamp(1).needs_dynamic_text());
    }
}
