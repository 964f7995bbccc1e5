use super::capability::MapProxy;
use super::element::{Previous, ProxyElement};
use super::expect_kind;
use crate::core::{MappingError, Result, Value};
use crate::delta::{CollectionOp, DeltaTracker};
use crate::model::{ColumnSpec, MultiValueKind};
use std::collections::{BTreeMap, btree_map};

/// Map proxy over a live backing map.
///
/// Key and value views route their removals through the same tracker, so
/// every path that drops an entry records a `RemoveMapKey`.
pub struct TrackedMap<'a, K, V> {
    backing: &'a mut BTreeMap<K, V>,
    tracker: &'a mut DeltaTracker,
    column: ColumnSpec,
}

impl<'a, K, V> TrackedMap<'a, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    pub fn new(
        backing: &'a mut BTreeMap<K, V>,
        tracker: &'a mut DeltaTracker,
        column: &ColumnSpec,
    ) -> Result<Self> {
        expect_kind(column, MultiValueKind::Map)?;
        Ok(Self {
            backing,
            tracker,
            column: column.clone(),
        })
    }

    pub fn column(&self) -> &ColumnSpec {
        &self.column
    }

    fn remove_tracked(&mut self, key: &K) -> Option<V> {
        let old = self.backing.remove(key)?;
        self.tracker
            .record(&self.column, CollectionOp::RemoveMapKey(key.to_value()));
        Some(old)
    }

    /// Entry view for `key`, `None` when the key is absent.
    pub fn entry(&mut self, key: K) -> Option<TrackedEntry<'_, 'a, K, V>> {
        let key = key.into_raw();
        if !self.backing.contains_key(&key) {
            return None;
        }
        Some(TrackedEntry { map: self, key })
    }

    pub fn key_set(&mut self) -> KeySetView<'_, 'a, K, V> {
        KeySetView { map: self }
    }

    pub fn values(&mut self) -> ValuesView<'_, 'a, K, V> {
        ValuesView { map: self }
    }
}

impl<K, V> MapProxy<K, V> for TrackedMap<'_, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    fn len(&self) -> Result<usize> {
        Ok(self.backing.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.backing.is_empty())
    }

    fn get(&self, key: &K) -> Result<Option<&V>> {
        Ok(self.backing.get(key))
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.backing.contains_key(key))
    }

    fn iter(&self) -> Result<btree_map::Iter<'_, K, V>> {
        Ok(self.backing.iter())
    }

    fn put(&mut self, key: K, value: V) -> Result<Previous<V>> {
        let key = key.into_raw();
        let value = value.into_raw();
        let entry = (key.to_value(), value.to_value());
        let old = self.backing.insert(key, value.clone());
        if old.as_ref() != Some(&value) {
            self.tracker.put_entries(&self.column, [entry]);
        }
        Ok(Previous::Known(old))
    }

    fn put_all(&mut self, entries: Vec<(K, V)>) -> Result<()> {
        let mut changed: BTreeMap<Value, Value> = BTreeMap::new();
        for (key, value) in entries {
            let key = key.into_raw();
            let value = value.into_raw();
            let tracked = (key.to_value(), value.to_value());
            let old = self.backing.insert(key, value.clone());
            if old.as_ref() != Some(&value) {
                changed.insert(tracked.0, tracked.1);
            }
        }
        self.tracker
            .record(&self.column, CollectionOp::PutMapEntries(changed));
        Ok(())
    }

    fn remove(&mut self, key: K) -> Result<Previous<V>> {
        let key = key.into_raw();
        Ok(Previous::Known(self.remove_tracked(&key)))
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

/// A present entry of a `TrackedMap`.
pub struct TrackedEntry<'m, 'a, K, V> {
    map: &'m mut TrackedMap<'a, K, V>,
    key: K,
}

impl<K, V> TrackedEntry<'_, '_, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> Option<&V> {
        self.map.backing.get(&self.key)
    }

    /// Same path as `put`: recorded only when the value changes.
    pub fn set_value(&mut self, value: V) -> Result<Previous<V>> {
        self.map.put(self.key.clone(), value)
    }

    pub fn remove(self) -> Option<V> {
        self.map.remove_tracked(&self.key)
    }
}

/// Key view of a `TrackedMap`. Supports removal, never insertion.
pub struct KeySetView<'m, 'a, K, V> {
    map: &'m mut TrackedMap<'a, K, V>,
}

impl<K, V> KeySetView<'_, '_, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    pub fn len(&self) -> usize {
        self.map.backing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.backing.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.backing.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Keys<'_, K, V> {
        self.map.backing.keys()
    }

    pub fn add(&mut self, _key: K) -> Result<bool> {
        Err(MappingError::UnsupportedOperation(format!(
            "add() on the key set of map '{}'",
            self.map.column.name()
        )))
    }

    pub fn remove(&mut self, key: K) -> bool {
        self.map.remove_tracked(&key.into_raw()).is_some()
    }

    pub fn retain_all(&mut self, keys: Vec<K>) -> bool {
        let keep: Vec<K> = keys.into_iter().map(ProxyElement::into_raw).collect();
        let doomed: Vec<K> = self
            .map
            .backing
            .keys()
            .filter(|key| !keep.contains(key))
            .cloned()
            .collect();
        for key in &doomed {
            self.map.remove_tracked(key);
        }
        !doomed.is_empty()
    }
}

/// Value view of a `TrackedMap`. Removing a value drops the first entry
/// holding it.
pub struct ValuesView<'m, 'a, K, V> {
    map: &'m mut TrackedMap<'a, K, V>,
}

impl<K, V> ValuesView<'_, '_, K, V>
where
    K: ProxyElement + Ord,
    V: ProxyElement,
{
    pub fn len(&self) -> usize {
        self.map.backing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.backing.is_empty()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.map.backing.values().any(|v| v == value)
    }

    pub fn iter(&self) -> btree_map::Values<'_, K, V> {
        self.map.backing.values()
    }

    pub fn add(&mut self, _value: V) -> Result<bool> {
        Err(MappingError::UnsupportedOperation(format!(
            "add() on the values of map '{}'",
            self.map.column.name()
        )))
    }

    pub fn remove(&mut self, value: V) -> bool {
        let value = value.into_raw();
        let key = self
            .map
            .backing
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(k, _)| k.clone());
        match key {
            Some(key) => self.map.remove_tracked(&key).is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::model::EntityModel;

    fn model() -> EntityModel {
        EntityModel::builder("Doc", "docs")
            .partition_key("id", DataType::BigInt)
            .column("attrs", DataType::map(DataType::Text, DataType::Int))
            .build()
            .unwrap()
    }

    fn backing() -> BTreeMap<String, i64> {
        [("a".to_string(), 1), ("b".to_string(), 2)]
            .into_iter()
            .collect()
    }

    #[test]
    fn put_records_only_changed_values() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut map = backing();
        let mut tracker = DeltaTracker::new();
        {
            let mut proxy = TrackedMap::new(&mut map, &mut tracker, column).unwrap();
            assert_eq!(
                proxy.put("a".to_string(), 1).unwrap(),
                Previous::Known(Some(1))
            );
            assert_eq!(proxy.put("c".to_string(), 3).unwrap(), Previous::Known(None));
        }
        assert_eq!(
            tracker.ops_for(column),
            &[CollectionOp::PutMapEntries(
                [(Value::from("c"), Value::from(3i64))].into_iter().collect()
            )]
        );
    }

    #[test]
    fn put_all_records_a_single_op() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut map = backing();
        let mut tracker = DeltaTracker::new();
        {
            let mut proxy = TrackedMap::new(&mut map, &mut tracker, column).unwrap();
            proxy
                .put_all(vec![("x".to_string(), 9), ("y".to_string(), 8)])
                .unwrap();
        }
        assert_eq!(tracker.ops_for(column).len(), 1);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn entry_and_views_route_through_the_tracker() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut map = backing();
        let mut tracker = DeltaTracker::new();
        {
            let mut proxy = TrackedMap::new(&mut map, &mut tracker, column).unwrap();
            proxy
                .entry("a".to_string())
                .unwrap()
                .set_value(10)
                .unwrap();
            assert!(proxy.values().remove(2));
            assert!(proxy.key_set().add("z".to_string()).is_err());
            assert!(proxy.values().add(5).is_err());
        }
        assert_eq!(
            tracker.ops_for(column),
            &[
                CollectionOp::PutMapEntries(
                    [(Value::from("a"), Value::from(10i64))].into_iter().collect()
                ),
                CollectionOp::RemoveMapKey(Value::from("b")),
            ]
        );
    }

    #[test]
    fn key_set_retain_removes_each_dropped_key() {
        let model = model();
        let column = model.column_by_name("attrs").unwrap();
        let mut map = backing();
        let mut tracker = DeltaTracker::new();
        {
            let mut proxy = TrackedMap::new(&mut map, &mut tracker, column).unwrap();
            assert!(proxy.key_set().retain_all(vec!["b".to_string()]));
        }
        assert_eq!(
            tracker.ops_for(column),
            &[CollectionOp::RemoveMapKey(Value::from("a"))]
        );
    }
}
