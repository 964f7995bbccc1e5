use crate::core::Value;
use crate::model::{ColumnId, ColumnRole, EntityMapping};

/// Field values captured when an entity was loaded, for plain value diffs.
///
/// Covers static and regular columns. Keys never change for a loaded
/// entity and counters are tracked as deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSnapshot {
    values: Vec<(ColumnId, Value)>,
}

impl ScalarSnapshot {
    pub fn capture<E>(entity: &E, mapping: &EntityMapping<E>) -> Self {
        let values = mapping
            .values(entity)
            .filter(|(column, _)| matches!(column.role(), ColumnRole::Static | ColumnRole::Regular))
            .map(|(column, value)| (column.id(), value))
            .collect();
        Self { values }
    }

    /// Columns whose current value differs from the captured one.
    pub fn changed_columns<E>(&self, entity: &E, mapping: &EntityMapping<E>) -> Vec<ColumnId> {
        let current = Self::capture(entity, mapping).values;
        self.values
            .iter()
            .zip(current)
            .filter(|((_, before), (_, now))| before != now)
            .map(|((id, _), _)| *id)
            .collect()
    }
}
