use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-side column type, rendered in CQL syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Int,
    BigInt,
    Double,
    Boolean,
    Uuid,
    Timestamp,
    Blob,
    Counter,
    List(Box<DataType>),
    Set(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
}

impl DataType {
    pub fn list(element: DataType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: DataType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(_, _))
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Int | Self::BigInt | Self::Counter, Value::Int(_)) => true,
            (Self::Double, Value::Double(_) | Value::Int(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Blob, Value::Blob(_)) => true,
            (Self::List(element), Value::List(items)) => {
                items.iter().all(|item| element.is_compatible(item))
            }
            // Removal deltas on a list bind the removed elements as a set.
            (Self::List(element) | Self::Set(element), Value::Set(items)) => {
                items.iter().all(|item| element.is_compatible(item))
            }
            (Self::Map(key, value_type), Value::Map(entries)) => entries
                .iter()
                .all(|(k, v)| key.is_compatible(k) && value_type.is_compatible(v)),
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Int => write!(f, "int"),
            Self::BigInt => write!(f, "bigint"),
            Self::Double => write!(f, "double"),
            Self::Boolean => write!(f, "boolean"),
            Self::Uuid => write!(f, "uuid"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Blob => write!(f, "blob"),
            Self::Counter => write!(f, "counter"),
            Self::List(element) => write!(f, "list<{}>", element),
            Self::Set(element) => write!(f, "set<{}>", element),
            Self::Map(key, value) => write!(f, "map<{}, {}>", key, value),
        }
    }
}

/// Encoded form of a bound value, as handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WireValue {
    Null,
    Bytes(Vec<u8>),
}

impl WireValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Null => None,
            Self::Bytes(bytes) => Some(bytes),
        }
    }
}

/// A decoded result row: one wire value per selected column.
pub type Row = Vec<WireValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        let tags = DataType::list(DataType::Text);
        assert!(tags.is_compatible(&Value::list(["a", "b"])));
        assert!(tags.is_compatible(&Value::Null));
        assert!(!tags.is_compatible(&Value::list([1i64])));
        assert!(DataType::Counter.is_compatible(&Value::Int(3)));
    }

    #[test]
    fn test_cql_rendering() {
        let ty = DataType::map(DataType::Text, DataType::list(DataType::Int));
        assert_eq!(ty.to_string(), "map<text, list<int>>");
    }
}
