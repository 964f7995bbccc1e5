use super::capability::{ListProxy, MapProxy, SetProxy};
use super::element::{Previous, ProxyElement};
use super::expect_kind;
use crate::core::{MappingError, Result};
use crate::delta::{CollectionOp, DeltaTracker};
use crate::model::{ColumnSpec, MultiValueKind};
use std::collections::{btree_map, btree_set};
use std::marker::PhantomData;
use std::slice;

// Write-only proxies never hold the collection value. Every mutation is
// recorded unconditionally and every read fails.

fn unsupported(call: &str, column: &ColumnSpec) -> MappingError {
    MappingError::UnsupportedOperation(format!(
        "{}() on write-only collection '{}'",
        call,
        column.name()
    ))
}

fn raw_values<T: ProxyElement>(values: Vec<T>) -> Vec<crate::core::Value> {
    values
        .into_iter()
        .map(|value| value.into_raw().to_value())
        .collect()
}

/// List proxy that records intents without ever reading the list.
pub struct WriteOnlyList<'a, T> {
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
    _element: PhantomData<T>,
}

impl<'a, T: ProxyElement> WriteOnlyList<'a, T> {
    pub fn new(tracker: &'a mut DeltaTracker, column: &ColumnSpec) -> Result<Self> {
        expect_kind(column, MultiValueKind::List)?;
        Ok(Self {
            tracker,
            column: column.clone(),
            _element: PhantomData,
        })
    }

    fn record(&mut self, op: CollectionOp) {
        self.tracker.record(&self.column, op);
    }

    fn insert_at(&mut self, index: usize, values: Vec<T>) -> Result<bool> {
        if index != 0 {
            return Err(MappingError::UnsupportedOperation(format!(
                "insert at index {} of write-only list '{}': only index 0 is known without a read",
                index,
                self.column.name()
            )));
        }
        if values.is_empty() {
            return Ok(false);
        }
        self.record(CollectionOp::PrependListElements(raw_values(values)));
        Ok(true)
    }
}

impl<T: ProxyElement> ListProxy<T> for WriteOnlyList<'_, T> {
    fn len(&self) -> Result<usize> {
        Err(MappingError::unread("len"))
    }

    fn is_empty(&self) -> Result<bool> {
        Err(MappingError::unread("is_empty"))
    }

    fn get(&self, _index: usize) -> Result<&T> {
        Err(MappingError::unread("get"))
    }

    fn contains(&self, _value: &T) -> Result<bool> {
        Err(MappingError::unread("contains"))
    }

    fn iter(&self) -> Result<slice::Iter<'_, T>> {
        Err(MappingError::unread("iter"))
    }

    fn add(&mut self, value: T) -> Result<bool> {
        self.add_all(vec![value])
    }

    fn add_all(&mut self, values: Vec<T>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.record(CollectionOp::AppendListElements(raw_values(values)));
        Ok(true)
    }

    fn add_at(&mut self, index: usize, value: T) -> Result<()> {
        self.insert_at(index, vec![value]).map(|_| ())
    }

    fn add_all_at(&mut self, index: usize, values: Vec<T>) -> Result<bool> {
        self.insert_at(index, values)
    }

    fn remove(&mut self, value: T) -> Result<bool> {
        self.remove_all(vec![value])
    }

    fn remove_all(&mut self, values: Vec<T>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.record(CollectionOp::RemoveElements(
            raw_values(values).into_iter().collect(),
        ));
        Ok(true)
    }

    fn retain_all(&mut self, _values: Vec<T>) -> Result<bool> {
        Err(unsupported("retain_all", &self.column))
    }

    fn remove_at(&mut self, index: usize) -> Result<Previous<T>> {
        self.record(CollectionOp::RemoveListElementAtIndex(index));
        Ok(Previous::Unread)
    }

    fn set(&mut self, index: usize, value: T) -> Result<Previous<T>> {
        self.record(CollectionOp::SetListElementAtIndex(
            index,
            value.into_raw().to_value(),
        ));
        Ok(Previous::Unread)
    }

    fn clear(&mut self) -> Result<()> {
        self.record(CollectionOp::ClearAll);
        Ok(())
    }
}

/// Set proxy that records intents without ever reading the set.
pub struct WriteOnlySet<'a, T> {
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
    _element: PhantomData<T>,
}

impl<'a, T: ProxyElement + Ord> WriteOnlySet<'a, T> {
    pub fn new(tracker: &'a mut DeltaTracker, column: &ColumnSpec) -> Result<Self> {
        expect_kind(column, MultiValueKind::Set)?;
        Ok(Self {
            tracker,
            column: column.clone(),
            _element: PhantomData,
        })
    }
}

impl<T: ProxyElement + Ord> SetProxy<T> for WriteOnlySet<'_, T> {
    fn len(&self) -> Result<usize> {
        Err(MappingError::unread("len"))
    }

    fn is_empty(&self) -> Result<bool> {
        Err(MappingError::unread("is_empty"))
    }

    fn contains(&self, _value: &T) -> Result<bool> {
        Err(MappingError::unread("contains"))
    }

    fn iter(&self) -> Result<btree_set::Iter<'_, T>> {
        Err(MappingError::unread("iter"))
    }

    fn add(&mut self, value: T) -> Result<bool> {
        self.add_all(vec![value])
    }

    fn add_all(&mut self, values: Vec<T>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.tracker.add_elements(&self.column, raw_values(values));
        Ok(true)
    }

    fn remove(&mut self, value: T) -> Result<bool> {
        self.remove_all(vec![value])
    }

    fn remove_all(&mut self, values: Vec<T>) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }
        self.tracker.remove_elements(&self.column, raw_values(values));
        Ok(true)
    }

    fn retain_all(&mut self, _values: Vec<T>) -> Result<bool> {
        Err(unsupported("retain_all", &self.column))
    }

    fn clear(&mut self) -> Result<()> {
        self.tracker.clear(&self.column);
        Ok(())
    }
}

/// Map proxy that records intents without ever reading the map.
pub struct WriteOnlyMap<'a, K, V> {
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
    _entry: PhantomData<(K, V)>,
}

impl<'a, K, V> WriteOnlyMap<'a, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    pub fn new(tracker: &'a mut DeltaTracker, column: &ColumnSpec) -> Result<Self> {
        expect_kind(column, MultiValueKind::Map)?;
        Ok(Self {
            tracker,
            column: column.clone(),
            _entry: PhantomData,
        })
    }
}

impl<K, V> MapProxy<K, V> for WriteOnlyMap<'_, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    fn len(&self) -> Result<usize> {
        Err(MappingError::unread("len"))
    }

    fn is_empty(&self) -> Result<bool> {
        Err(MappingError::unread("is_empty"))
    }

    fn get(&self, _key: &K) -> Result<Option<&V>> {
        Err(MappingError::unread("get"))
    }

    fn contains_key(&self, _key: &K) -> Result<bool> {
        Err(MappingError::unread("contains_key"))
    }

    fn iter(&self) -> Result<btree_map::Iter<'_, K, V>> {
        Err(MappingError::unread("iter"))
    }

    fn put(&mut self, key: K, value: V) -> Result<Previous<V>> {
        self.put_all(vec![(key, value)])?;
        Ok(Previous::Unread)
    }

    fn put_all(&mut self, entries: Vec<(K, V)>) -> Result<()> {
        let entries: Vec<_> = entries
            .into_iter()
            .map(|(key, value)| (key.into_raw().to_value(), value.into_raw().to_value()))
            .collect();
        self.tracker.put_entries(&self.column, entries);
        Ok(())
    }

    fn remove(&mut self, key: K) -> Result<Previous<V>> {
        self.tracker
            .remove_key(&self.column, key.into_raw().to_value());
        Ok(Previous::Unread)
    }

    fn clear(&mut self) -> Result<()> {
        self.tracker.clear(&self.column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::model::EntityModel;

    fn model() -> EntityModel {
        EntityModel::builder("Doc", "docs")
            .partition_key("id", DataType::BigInt)
            .column("lines", DataType::list(DataType::Text))
            .column("tags", DataType::set(DataType::Text))
            .column("attrs", DataType::map(DataType::Text, DataType::Text))
            .build()
            .unwrap()
    }

    #[test]
    fn list_reads_fail_with_unread() {
        let model = model();
        let column = model.column_by_name("lines").unwrap();
        let mut tracker = DeltaTracker::new();
        let list: WriteOnlyList<'_, String> = WriteOnlyList::new(&mut tracker, column).unwrap();
        assert_eq!(list.len().unwrap_err(), MappingError::unread("len"));
        assert_eq!(list.get(0).unwrap_err(), MappingError::unread("get"));
        assert!(list.iter().is_err());
    }

    #[test]
    fn list_insert_only_at_front() {
        let model = model();
        let column = model.column_by_name("lines").unwrap();
        let mut tracker = DeltaTracker::new();
        {
            let mut list: WriteOnlyList<'_, String> =
                WriteOnlyList::new(&mut tracker, column).unwrap();
            list.add_at(0, "x".to_string()).unwrap();
            let err = list.add_at(1, "y".to_string()).unwrap_err();
            assert!(matches!(err, MappingError::UnsupportedOperation(_)));
            assert!(list.set(3, "z".to_string()).unwrap().is_unread());
            assert!(list.remove_at(1).unwrap().is_unread());
        }
        assert_eq!(
            tracker.ops_for(column),
            &[
                CollectionOp::PrependListElements(vec![Value::from("x")]),
                CollectionOp::SetListElementAtIndex(3, Value::from("z")),
                CollectionOp::RemoveListElementAtIndex(1),
            ]
        );
    }

    #[test]
    fn map_clear_records_exactly_one_op() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut tracker = DeltaTracker::new();
        {
            let mut map: WriteOnlyMap<'_, String, String> =
                WriteOnlyMap::new(&mut tracker, column).unwrap();
            map.clear().unwrap();
            assert!(map.get(&"k".to_string()).is_err());
        }
        assert_eq!(tracker.ops_for(column), &[CollectionOp::ClearAll]);
    }

    #[test]
    fn map_put_and_remove_return_unread() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut tracker = DeltaTracker::new();
        {
            let mut map: WriteOnlyMap<'_, String, String> =
                WriteOnlyMap::new(&mut tracker, column).unwrap();
            assert!(map.put("k".to_string(), "v".to_string()).unwrap().is_unread());
            assert!(map.remove("k".to_string()).unwrap().is_unread());
        }
        assert_eq!(
            tracker.ops_for(column),
            &[
                CollectionOp::PutMapEntries(
                    [(Value::from("k"), Value::from("v"))].into_iter().collect()
                ),
                CollectionOp::RemoveMapKey(Value::from("k")),
            ]
        );
    }

    #[test]
    fn set_mutations_are_recorded_blind() {
        let model = model();
        let column = model.column_by_name("tags").unwrap();
        let mut tracker = DeltaTracker::new();
        {
            let mut set: WriteOnlySet<'_, String> =
                WriteOnlySet::new(&mut tracker, column).unwrap();
            set.add("a".to_string()).unwrap();
            set.add("a".to_string()).unwrap();
            set.remove("b".to_string()).unwrap();
            assert!(set.retain_all(vec!["a".to_string()]).is_err());
        }
        assert_eq!(tracker.ops_for(column).len(), 3);
    }
}
