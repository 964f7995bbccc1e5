use super::op::CollectionOp;
use crate::core::Value;
use crate::model::{ColumnId, ColumnSpec};
use std::collections::{BTreeMap, BTreeSet};

/// One recorded entry of a `DeltaTracker`, as written by a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeltaEntry {
    /// A scalar assignment.
    Assigned(ColumnId),
    /// The `index`-th recorded op on `column`.
    Op { column: ColumnId, index: usize },
    Counter(ColumnId),
}

/// Per-entity mutation log for one flush cycle.
///
/// Records what was done to each column, never what the column currently
/// holds: no entry point reads or requires the live value. Owned by whoever
/// mutates the entity, so there is no internal locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaTracker {
    ops: BTreeMap<ColumnId, Vec<CollectionOp>>,
    assigned: BTreeSet<ColumnId>,
    counters: BTreeMap<ColumnId, i64>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `op` to the column's op list, in call order.
    ///
    /// Ops with an empty payload are dropped.
    pub fn record(&mut self, column: &ColumnSpec, op: CollectionOp) {
        if op.is_empty_mutation() {
            return;
        }
        self.ops.entry(column.id()).or_default().push(op);
    }

    pub fn add_elements<I>(&mut self, column: &ColumnSpec, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.record(column, CollectionOp::AddElements(values.into_iter().collect()));
    }

    pub fn remove_elements<I>(&mut self, column: &ColumnSpec, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.record(
            column,
            CollectionOp::RemoveElements(values.into_iter().collect()),
        );
    }

    pub fn clear(&mut self, column: &ColumnSpec) {
        self.record(column, CollectionOp::ClearAll);
    }

    pub fn append_list<I>(&mut self, column: &ColumnSpec, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.record(
            column,
            CollectionOp::AppendListElements(values.into_iter().collect()),
        );
    }

    pub fn prepend_list<I>(&mut self, column: &ColumnSpec, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.record(
            column,
            CollectionOp::PrependListElements(values.into_iter().collect()),
        );
    }

    /// No bounds check: the store enforces list bounds.
    pub fn set_at(&mut self, column: &ColumnSpec, index: usize, value: Value) {
        self.record(column, CollectionOp::SetListElementAtIndex(index, value));
    }

    pub fn remove_at(&mut self, column: &ColumnSpec, index: usize) {
        self.record(column, CollectionOp::RemoveListElementAtIndex(index));
    }

    pub fn put_entries<I>(&mut self, column: &ColumnSpec, entries: I)
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        self.record(
            column,
            CollectionOp::PutMapEntries(entries.into_iter().collect()),
        );
    }

    pub fn remove_key(&mut self, column: &ColumnSpec, key: Value) {
        self.record(column, CollectionOp::RemoveMapKey(key));
    }

    /// Marks a scalar column as assigned without a prior read.
    pub fn assign(&mut self, column: &ColumnSpec) {
        self.assigned.insert(column.id());
    }

    /// Adds `by` to the pending delta of a counter column.
    pub fn increment(&mut self, column: &ColumnSpec, by: i64) {
        *self.counters.entry(column.id()).or_insert(0) += by;
    }

    pub fn decrement(&mut self, column: &ColumnSpec, by: i64) {
        self.increment(column, -by);
    }

    /// Recorded ops for `column`, possibly empty.
    pub fn ops_for(&self, column: &ColumnSpec) -> &[CollectionOp] {
        self.ops_for_id(column.id())
    }

    pub fn ops_for_id(&self, id: ColumnId) -> &[CollectionOp] {
        self.ops.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_assigned(&self, column: &ColumnSpec) -> bool {
        self.assigned.contains(&column.id())
    }

    pub fn assigned_columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.assigned.iter().copied()
    }

    /// Non-zero counter deltas in column order.
    pub fn counter_deltas(&self) -> impl Iterator<Item = (ColumnId, i64)> + '_ {
        self.counters
            .iter()
            .filter(|(_, delta)| **delta != 0)
            .map(|(id, delta)| (*id, *delta))
    }

    pub fn counter_delta(&self, column: &ColumnSpec) -> i64 {
        self.counters.get(&column.id()).copied().unwrap_or(0)
    }

    /// Whether any column carries a collection op.
    pub fn has_collection_changes(&self) -> bool {
        self.ops.values().any(|ops| !ops.is_empty())
    }

    /// Whether the tracker holds anything to flush: collection ops, scalar
    /// assignments or non-zero counter deltas.
    pub fn has_changes(&self) -> bool {
        self.has_collection_changes()
            || !self.assigned.is_empty()
            || self.counter_deltas().next().is_some()
    }

    /// Drops entries that have already been written, keeping the rest in
    /// recorded order. Op indexes refer to the log before this call.
    pub fn discard(&mut self, written: &[DeltaEntry]) {
        let mut dropped: BTreeMap<ColumnId, BTreeSet<usize>> = BTreeMap::new();
        for entry in written {
            match *entry {
                DeltaEntry::Assigned(id) => {
                    self.assigned.remove(&id);
                }
                DeltaEntry::Counter(id) => {
                    self.counters.remove(&id);
                }
                DeltaEntry::Op { column, index } => {
                    dropped.entry(column).or_default().insert(index);
                }
            }
        }
        for (column, indexes) in dropped {
            if let Some(ops) = self.ops.get_mut(&column) {
                let mut position = 0;
                ops.retain(|_| {
                    let keep = !indexes.contains(&position);
                    position += 1;
                    keep
                });
                if ops.is_empty() {
                    self.ops.remove(&column);
                }
            }
        }
    }

    /// Clears all tracked state; called after a successful flush.
    pub fn reset(&mut self) {
        self.ops.clear();
        self.assigned.clear();
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::model::EntityModel;

    fn columns() -> (ColumnSpec, ColumnSpec) {
        let model = EntityModel::builder("Doc", "docs")
            .partition_key("id", DataType::BigInt)
            .column("tags", DataType::set(DataType::Text))
            .column("lines", DataType::list(DataType::Text))
            .build()
            .unwrap();
        (
            model.column_by_name("tags").unwrap().clone(),
            model.column_by_name("lines").unwrap().clone(),
        )
    }

    #[test]
    fn ops_are_kept_in_call_order() {
        let (tags, _) = columns();
        let mut tracker = DeltaTracker::new();
        tracker.clear(&tags);
        tracker.add_elements(&tags, [Value::from("a")]);
        tracker.remove_elements(&tags, [Value::from("b")]);

        assert_eq!(
            tracker.ops_for(&tags),
            &[
                CollectionOp::ClearAll,
                CollectionOp::AddElements([Value::from("a")].into_iter().collect()),
                CollectionOp::RemoveElements([Value::from("b")].into_iter().collect()),
            ]
        );
    }

    #[test]
    fn empty_mutations_are_not_recorded() {
        let (tags, lines) = columns();
        let mut tracker = DeltaTracker::new();
        tracker.add_elements(&tags, Vec::new());
        tracker.remove_elements(&tags, Vec::new());
        tracker.append_list(&lines, Vec::new());
        assert!(!tracker.has_changes());
        assert!(tracker.ops_for(&tags).is_empty());
    }

    #[test]
    fn index_ops_are_not_bounds_checked() {
        let (_, lines) = columns();
        let mut tracker = DeltaTracker::new();
        tracker.set_at(&lines, 42, Value::from("x"));
        tracker.remove_at(&lines, 7);
        assert_eq!(tracker.ops_for(&lines).len(), 2);
    }

    #[test]
    fn discard_keeps_unwritten_entries_in_order() {
        let (tags, lines) = columns();
        let mut tracker = DeltaTracker::new();
        tracker.append_list(&lines, [Value::from("a")]);
        tracker.remove_at(&lines, 0);
        tracker.append_list(&lines, [Value::from("b")]);
        tracker.assign(&tags);

        tracker.discard(&[
            DeltaEntry::Op {
                column: lines.id(),
                index: 0,
            },
            DeltaEntry::Assigned(tags.id()),
        ]);
        assert_eq!(
            tracker.ops_for(&lines),
            &[
                CollectionOp::RemoveListElementAtIndex(0),
                CollectionOp::AppendListElements(vec![Value::from("b")]),
            ]
        );
        assert!(!tracker.is_assigned(&tags));

        tracker.discard(&[
            DeltaEntry::Op {
                column: lines.id(),
                index: 0,
            },
            DeltaEntry::Op {
                column: lines.id(),
                index: 1,
            },
        ]);
        assert!(!tracker.has_changes());
    }

    #[test]
    fn reset_clears_everything() {
        let (tags, lines) = columns();
        let mut tracker = DeltaTracker::new();
        tracker.add_elements(&tags, [Value::from("a")]);
        tracker.assign(&lines);
        assert!(tracker.has_changes());
        tracker.reset();
        assert!(!tracker.has_changes());
        assert!(!tracker.is_assigned(&lines));
    }
}
