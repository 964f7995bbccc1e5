use super::bound::BoundValue;
use crate::core::{DataType, MappingError, Result, Row, Value, WireValue};
use crate::delta::{CollectionOp, DeltaTracker};
use crate::model::{ColumnSpec, EntityMapping, EntityModel, MultiValueKind, default_codec};
use crate::statement::{BindParameter, CompiledStatement, OperationKind, WriteOptions};
use std::collections::BTreeSet;

/// Turns entity state, tracked deltas and write options into the values for
/// a compiled statement's placeholders, and decodes result rows back into
/// entities.
#[derive(Debug, Clone, Default)]
pub struct ValueBinder {
    default_ttl: Option<u32>,
}

impl ValueBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine-wide TTL used when neither the call nor the entity sets one.
    pub fn with_default_ttl(default_ttl: Option<u32>) -> Self {
        Self { default_ttl }
    }

    /// Per-call TTL, then the entity default, then the engine default, then 0.
    pub fn resolve_ttl(&self, model: &EntityModel, options: &WriteOptions) -> u32 {
        options
            .ttl
            .or(model.default_ttl())
            .or(self.default_ttl)
            .unwrap_or(0)
    }

    /// Values for every placeholder of `statement`, in placeholder order.
    ///
    /// `tracker` is required when the statement carries delta or counter
    /// placeholders.
    pub fn bind<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        statement: &CompiledStatement,
        tracker: Option<&DeltaTracker>,
        options: &WriteOptions,
    ) -> Result<Vec<BoundValue>> {
        check_entity_type(mapping, statement)?;
        let model = mapping.model();
        statement
            .parameters()
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                let (value, encoded) = match *parameter {
                    BindParameter::Column(id) => {
                        let column = model.try_column(id)?;
                        let value = mapping.get(entity, column)?;
                        let encoded = column.codec().encode(&value)?;
                        (value, encoded)
                    }
                    BindParameter::Delta { column, op } => {
                        let column = model.try_column(column)?;
                        let ops = require_tracker(tracker, statement)?.ops_for(column);
                        let recorded = ops.get(op).ok_or(MappingError::IndexOutOfBounds {
                            index: op,
                            len: ops.len(),
                        })?;
                        delta_payload(column, recorded)?
                    }
                    BindParameter::Counter(id) => {
                        let column = model.try_column(id)?;
                        let delta = require_tracker(tracker, statement)?.counter_delta(column);
                        let value = Value::Int(delta);
                        let encoded = column.codec().encode(&value)?;
                        (value, encoded)
                    }
                    BindParameter::Condition { column, index } => {
                        let column = model.try_column(column)?;
                        let (_, expected) = options.conditions.get(index).ok_or_else(|| {
                            MappingError::UnsupportedOperation(format!(
                                "statement expects IF condition #{} on '{}'",
                                index,
                                column.name()
                            ))
                        })?;
                        let encoded = column.codec().encode(expected)?;
                        (expected.clone(), encoded)
                    }
                    BindParameter::Ttl => {
                        let value = Value::Int(i64::from(self.resolve_ttl(model, options)));
                        let encoded = default_codec().encode(&value)?;
                        (value, encoded)
                    }
                    BindParameter::Timestamp => {
                        let micros = options.timestamp.ok_or_else(|| {
                            MappingError::UnsupportedOperation(
                                "statement expects a write timestamp".to_string(),
                            )
                        })?;
                        let value = Value::Int(micros);
                        let encoded = default_codec().encode(&value)?;
                        (value, encoded)
                    }
                };
                Ok(BoundValue::new(index, *parameter, value, encoded))
            })
            .collect()
    }

    /// Decodes a row read by a SELECT template into `entity`.
    ///
    /// Row cells follow the model's column order.
    pub fn hydrate<E>(
        &self,
        entity: &mut E,
        mapping: &EntityMapping<E>,
        statement: &CompiledStatement,
        row: &Row,
    ) -> Result<()> {
        check_entity_type(mapping, statement)?;
        if statement.operation() != OperationKind::Select {
            return Err(MappingError::UnsupportedOperation(format!(
                "cannot hydrate from a {} statement",
                statement.operation()
            )));
        }
        let columns = mapping.model().columns();
        if row.len() != columns.len() {
            return Err(MappingError::Codec(format!(
                "row has {} cells, {} expects {}",
                row.len(),
                mapping.entity_type(),
                columns.len()
            )));
        }
        for (column, cell) in columns.iter().zip(row) {
            let value = column.codec().decode(cell)?;
            mapping.set(entity, column, value)?;
        }
        Ok(())
    }
}

fn check_entity_type<E>(mapping: &EntityMapping<E>, statement: &CompiledStatement) -> Result<()> {
    if statement.entity_type() == mapping.entity_type() {
        return Ok(());
    }
    Err(MappingError::InvalidModel(format!(
        "statement for {} cannot be bound with the {} mapping",
        statement.entity_type(),
        mapping.entity_type()
    )))
}

fn require_tracker<'t>(
    tracker: Option<&'t DeltaTracker>,
    statement: &CompiledStatement,
) -> Result<&'t DeltaTracker> {
    tracker.ok_or_else(|| {
        MappingError::UnsupportedOperation(format!(
            "binding '{}' needs a delta tracker",
            statement.text()
        ))
    })
}

fn element_type(column: &ColumnSpec) -> Result<&DataType> {
    match column.data_type() {
        DataType::List(element) | DataType::Set(element) => Ok(element),
        DataType::Map(key, _) => Ok(key),
        other => Err(MappingError::TypeMismatch(format!(
            "column '{}' of type {} is not a collection",
            column.name(),
            other
        ))),
    }
}

// For payloads whose shape is not the column type: check against `data_type`
// and encode with the unchecked codec.
fn encode_as(column: &ColumnSpec, data_type: &DataType, value: &Value) -> Result<WireValue> {
    if !data_type.is_compatible(value) {
        return Err(MappingError::TypeMismatch(format!(
            "value of type {} is not compatible with {} for column '{}'",
            value.type_name(),
            data_type,
            column.name()
        )));
    }
    column.raw_codec().encode(value)
}

fn collection_literal(column: &ColumnSpec, values: &BTreeSet<Value>) -> Value {
    match column.kind() {
        MultiValueKind::List => Value::List(values.iter().cloned().collect()),
        _ => Value::Set(values.clone()),
    }
}

/// The value bound for one recorded op, encoded for its column.
pub fn delta_payload(column: &ColumnSpec, op: &CollectionOp) -> Result<(Value, WireValue)> {
    let value = match op {
        CollectionOp::AppendListElements(values) | CollectionOp::PrependListElements(values) => {
            Value::List(values.clone())
        }
        CollectionOp::AddElements(values) | CollectionOp::RemoveElements(values) => {
            collection_literal(column, values)
        }
        CollectionOp::PutMapEntries(entries) => Value::Map(entries.clone()),
        CollectionOp::SetListElementAtIndex(_, element) => {
            let encoded = encode_as(column, element_type(column)?, element)?;
            return Ok((element.clone(), encoded));
        }
        CollectionOp::RemoveMapKey(key) => {
            let keys = Value::Set([key.clone()].into_iter().collect());
            let encoded = encode_as(column, &DataType::set(element_type(column)?.clone()), &keys)?;
            return Ok((keys, encoded));
        }
        CollectionOp::ClearAll | CollectionOp::RemoveListElementAtIndex(_) => {
            return Err(MappingError::UnsupportedOperation(format!(
                "{} on '{}' has no bound value",
                op.name(),
                column.name()
            )));
        }
    };
    let encoded = column.codec().encode(&value)?;
    Ok((value, encoded))
}
