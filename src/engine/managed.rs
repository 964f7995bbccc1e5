use crate::core::{Result, Value};
use crate::delta::{CollectionOp, DeltaTracker, ScalarSnapshot};
use crate::model::{ColumnId, ColumnSpec, EntityMapping};
use crate::proxy::{
    ProxyElement, TrackedList, TrackedMap, TrackedSet, WriteOnlyList, WriteOnlyMap, WriteOnlySet,
};
use std::collections::{BTreeMap, BTreeSet};

/// An entity together with its mutation log for the current flush cycle.
///
/// A `loaded` entity carries a snapshot of its field values, so plain field
/// edits are found by diffing. A `detached` entity has no snapshot: only
/// what goes through the tracker (proxies, `assign`, counters) is written,
/// which is the update-without-read workflow.
#[derive(Debug, Clone)]
pub struct ManagedEntity<E> {
    entity: E,
    tracker: DeltaTracker,
    snapshot: Option<ScalarSnapshot>,
}

impl<E> ManagedEntity<E> {
    /// Wraps an entity read from the store.
    pub fn loaded(entity: E, mapping: &EntityMapping<E>) -> Self {
        let snapshot = ScalarSnapshot::capture(&entity, mapping);
        Self {
            entity,
            tracker: DeltaTracker::new(),
            snapshot: Some(snapshot),
        }
    }

    /// Wraps an entity whose current stored state is unknown. Only its key
    /// fields need to be set.
    pub fn detached(entity: E) -> Self {
        Self {
            entity,
            tracker: DeltaTracker::new(),
            snapshot: None,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Direct field access. Edits made here are only written for loaded
    /// entities, through the snapshot diff.
    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub fn tracker(&self) -> &DeltaTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut DeltaTracker {
        &mut self.tracker
    }

    pub fn is_detached(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Records `op` against `column` without touching the entity.
    pub fn track_mutation(&mut self, column: &ColumnSpec, op: CollectionOp) {
        self.tracker.record(column, op);
    }

    /// Sets a scalar field and marks it assigned, so it is written even
    /// without a snapshot.
    pub fn assign(
        &mut self,
        mapping: &EntityMapping<E>,
        column: &ColumnSpec,
        value: impl Into<Value>,
    ) -> Result<()> {
        mapping.set(&mut self.entity, column, value.into())?;
        self.tracker.assign(column);
        Ok(())
    }

    pub fn increment(&mut self, column: &ColumnSpec, by: i64) {
        self.tracker.increment(column, by);
    }

    pub fn decrement(&mut self, column: &ColumnSpec, by: i64) {
        self.tracker.decrement(column, by);
    }

    /// Tracked proxy over the list field selected by `field`.
    pub fn tracked_list<T, F>(
        &mut self,
        column: &ColumnSpec,
        field: F,
    ) -> Result<TrackedList<'_, T>>
    where
        T: ProxyElement,
        F: FnOnce(&mut E) -> &mut Vec<T>,
    {
        TrackedList::new(field(&mut self.entity), &mut self.tracker, column)
    }

    pub fn tracked_set<T, F>(
        &mut self,
        column: &ColumnSpec,
        field: F,
    ) -> Result<TrackedSet<'_, T>>
    where
        T: ProxyElement + Ord,
        F: FnOnce(&mut E) -> &mut BTreeSet<T>,
    {
        TrackedSet::new(field(&mut self.entity), &mut self.tracker, column)
    }

    pub fn tracked_map<K, V, F>(
        &mut self,
        column: &ColumnSpec,
        field: F,
    ) -> Result<TrackedMap<'_, K, V>>
    where
        K: ProxyElement + Ord,
        V: ProxyElement,
        F: FnOnce(&mut E) -> &mut BTreeMap<K, V>,
    {
        TrackedMap::new(field(&mut self.entity), &mut self.tracker, column)
    }

    /// Write-only proxy for `column`; the entity's own field is left alone.
    pub fn write_only_list<T: ProxyElement>(
        &mut self,
        column: &ColumnSpec,
    ) -> Result<WriteOnlyList<'_, T>> {
        WriteOnlyList::new(&mut self.tracker, column)
    }

    pub fn write_only_set<T: ProxyElement + Ord>(
        &mut self,
        column: &ColumnSpec,
    ) -> Result<WriteOnlySet<'_, T>> {
        WriteOnlySet::new(&mut self.tracker, column)
    }

    pub fn write_only_map<K, V>(&mut self, column: &ColumnSpec) -> Result<WriteOnlyMap<'_, K, V>>
    where
        K: ProxyElement + Ord,
        V: ProxyElement,
    {
        WriteOnlyMap::new(&mut self.tracker, column)
    }

    /// Columns changed by plain field edits since load. Columns that carry
    /// collection ops are left to their ops.
    pub fn scalar_changes(&self, mapping: &EntityMapping<E>) -> Vec<ColumnId> {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .changed_columns(&self.entity, mapping)
                .into_iter()
                .filter(|id| self.tracker.ops_for_id(*id).is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_changes(&self, mapping: &EntityMapping<E>) -> bool {
        self.tracker.has_changes() || !self.scalar_changes(mapping).is_empty()
    }

    /// Starts a new flush cycle after a successful write.
    pub(crate) fn mark_flushed(&mut self, mapping: &EntityMapping<E>) {
        self.tracker.reset();
        if self.snapshot.is_some() {
            self.snapshot = Some(ScalarSnapshot::capture(&self.entity, mapping));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::field_accessors;
    use crate::model::EntityModel;
    use crate::proxy::{ListProxy, SetProxy};
    use std::sync::Arc;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Profile {
        id: i64,
        name: String,
        emails: Vec<String>,
        roles: BTreeSet<String>,
    }

    fn mapping() -> EntityMapping<Profile> {
        let model = EntityModel::builder("Profile", "profiles")
            .partition_key("id", DataType::BigInt)
            .column("name", DataType::Text)
            .column("emails", DataType::list(DataType::Text))
            .column("roles", DataType::set(DataType::Text))
            .build()
            .unwrap();
        EntityMapping::new(
            Arc::new(model),
            field_accessors!(Profile { id, name, emails, roles }),
        )
        .unwrap()
    }

    #[test]
    fn field_edits_show_up_in_scalar_changes() {
        let mapping = mapping();
        let mut managed = ManagedEntity::loaded(Profile::default(), &mapping);
        assert!(!managed.has_changes(&mapping));
        managed.entity_mut().name = "ada".to_string();
        let name = mapping.model().column_by_name("name").unwrap().id();
        assert_eq!(managed.scalar_changes(&mapping), vec![name]);
    }

    #[test]
    fn proxied_columns_are_left_to_their_ops() {
        let mapping = mapping();
        let emails = mapping.model().column_by_name("emails").unwrap().clone();
        let mut managed = ManagedEntity::loaded(Profile::default(), &mapping);
        managed
            .tracked_list(&emails, |p| &mut p.emails)
            .unwrap()
            .add("a@example.com".to_string())
            .unwrap();
        assert_eq!(managed.entity().emails, vec!["a@example.com".to_string()]);
        assert!(managed.scalar_changes(&mapping).is_empty());
        assert_eq!(managed.tracker().ops_for(&emails).len(), 1);
    }

    #[test]
    fn detached_entities_only_write_what_is_tracked() {
        let mapping = mapping();
        let roles = mapping.model().column_by_name("roles").unwrap().clone();
        let name = mapping.model().column_by_name("name").unwrap().clone();
        let mut managed = ManagedEntity::detached(Profile {
            id: 3,
            ..Profile::default()
        });
        managed.entity_mut().name = "ignored".to_string();
        assert!(!managed.has_changes(&mapping));

        managed
            .write_only_set::<String>(&roles)
            .unwrap()
            .add("admin".to_string())
            .unwrap();
        managed.assign(&mapping, &name, "grace").unwrap();
        assert!(managed.tracker().is_assigned(&name));
        assert_eq!(managed.entity().name, "grace");
        assert!(managed.entity().roles.is_empty());
    }

    #[test]
    fn mark_flushed_starts_a_new_cycle() {
        let mapping = mapping();
        let mut managed = ManagedEntity::loaded(Profile::default(), &mapping);
        managed.entity_mut().name = "ada".to_string();
        managed.mark_flushed(&mapping);
        assert!(!managed.has_changes(&mapping));
    }
}
