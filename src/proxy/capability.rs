use super::element::{Previous, ProxyElement};
use crate::core::Result;
use std::collections::{btree_map, btree_set};
use std::slice;

/// Mutable-list surface shared by the tracked and write-only list proxies.
pub trait ListProxy<T: ProxyElement> {
    fn len(&self) -> Result<usize>;
    fn is_empty(&self) -> Result<bool>;
    fn get(&self, index: usize) -> Result<&T>;
    fn contains(&self, value: &T) -> Result<bool>;
    fn iter(&self) -> Result<slice::Iter<'_, T>>;

    fn add(&mut self, value: T) -> Result<bool>;
    fn add_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn add_at(&mut self, index: usize, value: T) -> Result<()>;
    fn add_all_at(&mut self, index: usize, values: Vec<T>) -> Result<bool>;
    fn remove(&mut self, value: T) -> Result<bool>;
    fn remove_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn retain_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn remove_at(&mut self, index: usize) -> Result<Previous<T>>;
    fn set(&mut self, index: usize, value: T) -> Result<Previous<T>>;
    fn clear(&mut self) -> Result<()>;
}

/// Mutable-set surface shared by the tracked and write-only set proxies.
pub trait SetProxy<T: ProxyElement + Ord> {
    fn len(&self) -> Result<usize>;
    fn is_empty(&self) -> Result<bool>;
    fn contains(&self, value: &T) -> Result<bool>;
    fn iter(&self) -> Result<btree_set::Iter<'_, T>>;

    fn add(&mut self, value: T) -> Result<bool>;
    fn add_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn remove(&mut self, value: T) -> Result<bool>;
    fn remove_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn retain_all(&mut self, values: Vec<T>) -> Result<bool>;
    fn clear(&mut self) -> Result<()>;
}

/// Mutable-map surface shared by the tracked and write-only map proxies.
pub trait MapProxy<K: ProxyElement + Ord, V: ProxyElement> {
    fn len(&self) -> Result<usize>;
    fn is_empty(&self) -> Result<bool>;
    fn get(&self, key: &K) -> Result<Option<&V>>;
    fn contains_key(&self, key: &K) -> Result<bool>;
    fn iter(&self) -> Result<btree_map::Iter<'_, K, V>>;

    fn put(&mut self, key: K, value: V) -> Result<Previous<V>>;
    fn put_all(&mut self, entries: Vec<(K, V)>) -> Result<()>;
    fn remove(&mut self, key: K) -> Result<Previous<V>>;
    fn clear(&mut self) -> Result<()>;
}
