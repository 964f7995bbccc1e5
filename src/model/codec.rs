use crate::core::{DataType, MappingError, Result, Value, WireValue};
use std::fmt;
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref DEFAULT_CODEC: Arc<dyn ValueCodec> = Arc::new(MsgPackCodec);
}

/// Converts application values to and from their wire representation.
///
/// Implementations must be stateless or internally synchronized: one codec
/// instance is shared by every engine that uses the column.
pub trait ValueCodec: Send + Sync {
    /// Short name used in logs and `Debug` output.
    fn name(&self) -> &'static str;
    fn encode(&self, value: &Value) -> Result<WireValue>;
    fn decode(&self, wire: &WireValue) -> Result<Value>;
}

impl fmt::Debug for dyn ValueCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueCodec({})", self.name())
    }
}

/// Shared MessagePack codec used when a column does not name one.
pub fn default_codec() -> Arc<dyn ValueCodec> {
    DEFAULT_CODEC.clone()
}

/// MessagePack encoding via `rmp-serde`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl ValueCodec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, value: &Value) -> Result<WireValue> {
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        Ok(WireValue::Bytes(rmp_serde::to_vec(value)?))
    }

    fn decode(&self, wire: &WireValue) -> Result<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Bytes(bytes) => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

/// JSON encoding via `serde_json`.
///
/// Map values with non-text keys cannot be represented and fail to encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<WireValue> {
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        Ok(WireValue::Bytes(serde_json::to_vec(value)?))
    }

    fn decode(&self, wire: &WireValue) -> Result<Value> {
        match wire {
            WireValue::Null => Ok(Value::Null),
            WireValue::Bytes(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

/// Wraps another codec with a `DataType` compatibility check on both directions.
pub struct CheckedCodec {
    data_type: DataType,
    inner: Arc<dyn ValueCodec>,
}

impl CheckedCodec {
    pub fn new(data_type: DataType, inner: Arc<dyn ValueCodec>) -> Self {
        Self { data_type, inner }
    }

    fn check(&self, value: &Value) -> Result<()> {
        if self.data_type.is_compatible(value) {
            Ok(())
        } else {
            Err(MappingError::TypeMismatch(format!(
                "value of type {} is not compatible with {}",
                value.type_name(),
                self.data_type
            )))
        }
    }
}

impl ValueCodec for CheckedCodec {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn encode(&self, value: &Value) -> Result<WireValue> {
        self.check(value)?;
        self.inner.encode(value)
    }

    fn decode(&self, wire: &WireValue) -> Result<Value> {
        let value = self.inner.decode(wire)?;
        self.check(&value)?;
        Ok(value)
    }
}
