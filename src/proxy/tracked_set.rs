use super::capability::SetProxy;
use super::element::ProxyElement;
use super::expect_kind;
use crate::core::{Result, Value};
use crate::delta::{CollectionOp, DeltaTracker};
use crate::model::{ColumnSpec, MultiValueKind};
use std::collections::{BTreeSet, btree_set};

/// Set proxy over a live backing set. Only effective changes are recorded.
pub struct TrackedSet<'a, T> {
    backing: &'a mut BTreeSet<T>,
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
}

impl<'a, T: ProxyElement + Ord> TrackedSet<'a, T> {
    pub fn new(
        backing: &'a mut BTreeSet<T>,
        tracker: &'a mut DeltaTracker,
        column: &ColumnSpec,
    ) -> Result<Self> {
        expect_kind(column, MultiValueKind::Set)?;
        Ok(Self {
            backing,
            tracker,
            column: column.clone(),
        })
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    fn record_removed(&mut self, removed: Vec<T>) -> bool {
        if removed.is_empty() {
            return false;
        }
        let values: BTreeSet<Value> = removed.iter().map(ProxyElement::to_value).collect();
        self.tracker
            .record(&self.column, CollectionOp::RemoveElements(values));
        true
    }
}

impl<T: ProxyElement + Ord> SetProxy<T> for TrackedSet<'_, T> {
    fn len(&self) -> Result<usize> {
        Ok(self.backing.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.backing.is_empty())
    }

    fn contains(&self, value: &T) -> Result<bool> {
        Ok(self.backing.contains(value))
    }

    fn iter(&self) -> Result<btree_set::Iter<'_, T>> {
        Ok(self.backing.iter())
    }

    fn add(&mut self, value: T) -> Result<bool> {
        self.add_all(vec![value])
    }

    fn add_all(&mut self, values: Vec<T>) -> Result<bool> {
        let mut added = BTreeSet::new();
        for value in values.into_iter().map(ProxyElement::into_raw) {
            let tracked = value.to_value();
            if self.backing.insert(value) {
                added.insert(tracked);
            }
        }
        if added.is_empty() {
            return Ok(false);
        }
        self.tracker
            .record(&self.column, CollectionOp::AddElements(added));
        Ok(true)
    }

    fn remove(&mut self, value: T) -> Result<bool> {
        self.remove_all(vec![value])
    }

    fn remove_all(&mut self, values: Vec<T>) -> Result<bool> {
        let removed: Vec<T> = values
            .into_iter()
            .map(ProxyElement::into_raw)
            .filter(|value| self.backing.remove(value))
            .collect();
        Ok(self.record_removed(removed))
    }

    /// Records `backing - values` as a removal.
    fn retain_all(&mut self, values: Vec<T>) -> Result<bool> {
        let keep: BTreeSet<T> = values.into_iter().map(ProxyElement::into_raw).collect();
        let removed: Vec<T> = self
            .backing
            .iter()
            .filter(|value| !keep.contains(value))
            .cloned()
            .collect();
        self.backing.retain(|value| keep.contains(value));
        Ok(self.record_removed(removed))
    }

    fn clear(&mut self) -> Result<()> {
        if self.backing.is_empty() {
            return Ok(());
        }
        self.backing.clear();
        self.tracker.record(&self.column, CollectionOp::ClearAll);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, MappingError};
    use crate::model::EntityModel;

    fn model() -> EntityModel {
        EntityModel::builder("Doc", "docs")
            .partition_key("id", DataType::BigInt)
            .column("tags", DataType::set(DataType::Int))
            .column("lines", DataType::list(DataType::Text))
            .build()
            .unwrap()
    }

    fn values(items: &[i64]) -> BTreeSet<Value> {
        items.iter().map(|i| Value::from(*i)).collect()
    }

    #[test]
    fn retain_all_records_the_difference() {
        let model = model();
        let column = model.column_by_name("tags").unwrap();
        let mut backing: BTreeSet<i64> = [1, 2, 3].into_iter().collect();
        let mut tracker = DeltaTracker::new();
        {
            let mut set = TrackedSet::new(&mut backing, &mut tracker, column).unwrap();
            assert!(set.retain_all(vec![2, 3, 4]).unwrap());
        }
        assert_eq!(backing, [2, 3].into_iter().collect());
        assert_eq!(
            tracker.ops_for(column),
            &[CollectionOp::RemoveElements(values(&[1]))]
        );
    }

    #[test]
    fn only_effective_changes_are_recorded() {
        let model = model();
        let column = model.column_by_name("tags").unwrap();
        let mut backing: BTreeSet<i64> = [1].into_iter().collect();
        let mut tracker = DeltaTracker::new();
        {
            let mut set = TrackedSet::new(&mut backing, &mut tracker, column).unwrap();
            assert!(!set.add(1).unwrap());
            assert!(!set.remove(9).unwrap());
            assert!(set.add_all(vec![1, 2]).unwrap());
            assert!(set.remove(1).unwrap());
        }
        assert_eq!(
            tracker.ops_for(column),
            &[
                CollectionOp::AddElements(values(&[2])),
                CollectionOp::RemoveElements(values(&[1])),
            ]
        );
    }

    #[test]
    fn replaying_ops_reproduces_the_backing_set() {
        let model = model();
        let column = model.column_by_name("tags").unwrap();
        let original: BTreeSet<i64> = [1, 2].into_iter().collect();
        let mut backing = original.clone();
        let mut tracker = DeltaTracker::new();
        {
            let mut set = TrackedSet::new(&mut backing, &mut tracker, column).unwrap();
            set.add(5).unwrap();
            set.remove(1).unwrap();
            set.clear().unwrap();
            set.add(7).unwrap();
        }

        let mut replayed: BTreeSet<Value> = original.iter().map(|i| Value::from(*i)).collect();
        for op in tracker.ops_for(column) {
            match op {
                CollectionOp::AddElements(added) => replayed.extend(added.iter().cloned()),
                CollectionOp::RemoveElements(removed) => {
                    replayed.retain(|value| !removed.contains(value))
                }
                CollectionOp::ClearAll => replayed.clear(),
                other => panic!("unexpected op {:?}", other),
            }
        }
        assert_eq!(replayed, values(&[7]));
        assert_eq!(backing, [7].into_iter().collect());
    }

    #[test]
    fn rejects_a_non_set_column() {
        let model = model();
        let column = model.column_by_name("lines").unwrap();
        let mut backing: BTreeSet<i64> = BTreeSet::new();
        let mut tracker = DeltaTracker::new();
        let err = TrackedSet::new(&mut backing, &mut tracker, column).err();
        assert!(matches!(err, Some(MappingError::TypeMismatch(_))));
    }
}
