use crate::core::{MappingError, Result, Value, WireValue};
use crate::model::ColumnId;
use crate::statement::BindParameter;

/// Receiver of encoded placeholder values, usually a driver-side statement
/// under construction.
pub trait BindTarget {
    fn bind(&mut self, index: usize, value: &WireValue) -> Result<()>;
}

/// Plain positional buffer; placeholders must arrive in order.
impl BindTarget for Vec<WireValue> {
    fn bind(&mut self, index: usize, value: &WireValue) -> Result<()> {
        if index != self.len() {
            return Err(MappingError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        self.push(value.clone());
        Ok(())
    }
}

/// One placeholder's value, both as the application saw it and as encoded
/// by the column codec. Produced fresh per flush.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    index: usize,
    parameter: BindParameter,
    value: Value,
    encoded: WireValue,
}

impl BoundValue {
    pub(crate) fn new(
        index: usize,
        parameter: BindParameter,
        value: Value,
        encoded: WireValue,
    ) -> Self {
        Self {
            index,
            parameter,
            value,
            encoded,
        }
    }

    /// Placeholder position in the statement.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameter(&self) -> BindParameter {
        self.parameter
    }

    pub fn column(&self) -> Option<ColumnId> {
        self.parameter.column()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn encoded(&self) -> &WireValue {
        &self.encoded
    }

    /// Writes the encoded value into `target` at this placeholder's position.
    pub fn apply(&self, target: &mut dyn BindTarget) -> Result<()> {
        target.bind(self.index, &self.encoded)
    }
}

/// Applies `values` to `target` in placeholder order.
pub fn apply_all(values: &[BoundValue], target: &mut dyn BindTarget) -> Result<()> {
    for value in values {
        value.apply(target)?;
    }
    Ok(())
}
