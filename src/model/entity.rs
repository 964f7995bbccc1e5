use super::column::{ColumnDef, ColumnId, ColumnRole, ColumnSpec, MultiValueKind};
use crate::core::{DataType, MappingError, Result};
use std::collections::HashSet;

/// Immutable per-entity-type description of the mapped table.
///
/// Columns are stored in statement order: partition keys, clustering columns,
/// static columns, regular columns, counter columns. A column's `ColumnId` is
/// its position in that order.
#[derive(Debug, Clone)]
pub struct EntityModel {
    entity_type: String,
    keyspace: Option<String>,
    table_name: String,
    columns: Vec<ColumnSpec>,
    default_ttl: Option<u32>,
}

impl EntityModel {
    pub fn builder(
        entity_type: impl Into<String>,
        table_name: impl Into<String>,
    ) -> EntityModelBuilder {
        EntityModelBuilder::new(entity_type, table_name)
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Entity-level TTL default, `None` unless the model declares one.
    pub fn default_ttl(&self) -> Option<u32> {
        self.default_ttl
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Panics when `id` was issued by another model; see `try_column`.
    pub fn column(&self, id: ColumnId) -> &ColumnSpec {
        &self.columns[id.0]
    }

    pub fn try_column(&self, id: ColumnId) -> Result<&ColumnSpec> {
        self.columns.get(id.0).ok_or_else(|| {
            MappingError::ColumnNotFound(format!("#{}", id.0), self.entity_type.clone())
        })
    }

    pub fn column_by_name(&self, name: &str) -> Result<&ColumnSpec> {
        self.columns
            .iter()
            .find(|column| column.name() == name)
            .ok_or_else(|| {
                MappingError::ColumnNotFound(name.to_string(), self.entity_type.clone())
            })
    }

    fn with_role(&self, role: ColumnRole) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(move |column| column.role() == role)
    }

    pub fn partition_keys(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.with_role(ColumnRole::Partition)
    }

    pub fn clustering_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.with_role(ColumnRole::Clustering)
    }

    pub fn static_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.with_role(ColumnRole::Static)
    }

    pub fn regular_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.with_role(ColumnRole::Regular)
    }

    pub fn counter_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.with_role(ColumnRole::Counter)
    }

    /// Partition keys followed by clustering columns.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|column| column.role().is_key())
    }

    pub fn has_static_columns(&self) -> bool {
        self.static_columns().next().is_some()
    }

    pub fn has_clustering_columns(&self) -> bool {
        self.clustering_columns().next().is_some()
    }

    pub fn is_counter_entity(&self) -> bool {
        self.counter_columns().next().is_some()
    }
}

/// Collects column declarations and validates them into an `EntityModel`.
pub struct EntityModelBuilder {
    entity_type: String,
    keyspace: Option<String>,
    table_name: String,
    partition: Vec<ColumnDef>,
    clustering: Vec<ColumnDef>,
    statics: Vec<ColumnDef>,
    regular: Vec<ColumnDef>,
    counters: Vec<ColumnDef>,
    default_ttl: Option<u32>,
}

impl EntityModelBuilder {
    pub fn new(entity_type: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            keyspace: None,
            table_name: table_name.into(),
            partition: Vec::new(),
            clustering: Vec::new(),
            statics: Vec::new(),
            regular: Vec::new(),
            counters: Vec::new(),
            default_ttl: None,
        }
    }

    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn default_ttl(mut self, seconds: u32) -> Self {
        self.default_ttl = Some(seconds);
        self
    }

    pub fn partition_key(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.partition.push(ColumnDef::new(name, data_type));
        self
    }

    pub fn clustering_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.clustering.push(ColumnDef::new(name, data_type));
        self
    }

    pub fn static_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.statics.push(ColumnDef::new(name, data_type));
        self
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.regular.push(ColumnDef::new(name, data_type));
        self
    }

    pub fn counter(mut self, name: impl Into<String>) -> Self {
        self.counters.push(ColumnDef::new(name, DataType::Counter));
        self
    }

    /// Adds a fully specified column (custom codec) under `role`.
    pub fn column_def(mut self, role: ColumnRole, def: ColumnDef) -> Self {
        match role {
            ColumnRole::Partition => self.partition.push(def),
            ColumnRole::Clustering => self.clustering.push(def),
            ColumnRole::Static => self.statics.push(def),
            ColumnRole::Regular => self.regular.push(def),
            ColumnRole::Counter => self.counters.push(def),
        }
        self
    }

    pub fn build(self) -> Result<EntityModel> {
        let invalid = |reason: String| {
            MappingError::InvalidModel(format!("{}: {}", self.entity_type, reason))
        };

        if self.table_name.is_empty() {
            return Err(invalid("table name must not be empty".to_string()));
        }
        if self.partition.is_empty() {
            return Err(invalid("at least one partition key is required".to_string()));
        }
        if !self.counters.is_empty() && !(self.statics.is_empty() && self.regular.is_empty()) {
            return Err(invalid(
                "a counter entity may only declare counter and key columns".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let groups = [
            (ColumnRole::Partition, &self.partition),
            (ColumnRole::Clustering, &self.clustering),
            (ColumnRole::Static, &self.statics),
            (ColumnRole::Regular, &self.regular),
            (ColumnRole::Counter, &self.counters),
        ];
        for (role, defs) in groups {
            for def in defs {
                if !seen.insert(def.name.as_str()) {
                    return Err(invalid(format!("duplicate column '{}'", def.name)));
                }
                if role.is_key() && MultiValueKind::of(&def.data_type) != MultiValueKind::Scalar {
                    return Err(invalid(format!(
                        "key column '{}' cannot be a collection",
                        def.name
                    )));
                }
                if role == ColumnRole::Counter && def.data_type != DataType::Counter {
                    return Err(invalid(format!(
                        "counter column '{}' must have counter type",
                        def.name
                    )));
                }
                if role != ColumnRole::Counter && def.data_type == DataType::Counter {
                    return Err(invalid(format!(
                        "column '{}' has counter type but is not a counter column",
                        def.name
                    )));
                }
            }
        }

        let mut columns = Vec::new();
        let groups = [
            (ColumnRole::Partition, self.partition),
            (ColumnRole::Clustering, self.clustering),
            (ColumnRole::Static, self.statics),
            (ColumnRole::Regular, self.regular),
            (ColumnRole::Counter, self.counters),
        ];
        for (role, defs) in groups {
            for def in defs {
                let id = ColumnId(columns.len());
                columns.push(ColumnSpec::from_def(id, role, def));
            }
        }

        Ok(EntityModel {
            entity_type: self.entity_type,
            keyspace: self.keyspace,
            table_name: self.table_name,
            columns,
            default_ttl: self.default_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> EntityModelBuilder {
        EntityModel::builder("UserEvent", "user_events")
            .keyspace("app")
            .partition_key("id", DataType::BigInt)
            .clustering_column("ts", DataType::BigInt)
            .static_column("owner", DataType::Text)
            .column("tags", DataType::list(DataType::Text))
    }

    #[test]
    fn columns_are_ordered_by_role() {
        let model = events().build().unwrap();
        let names: Vec<&str> = model.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["id", "ts", "owner", "tags"]);
        assert_eq!(model.column_by_name("tags").unwrap().id(), ColumnId(3));
        assert_eq!(
            model.column_by_name("tags").unwrap().kind(),
            MultiValueKind::List
        );
    }

    #[test]
    fn missing_partition_key_is_rejected() {
        let err = EntityModel::builder("Empty", "empty")
            .column("name", DataType::Text)
            .build()
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
    }

    #[test]
    fn counter_entity_cannot_mix_regular_columns() {
        let err = EntityModel::builder("Hits", "hits")
            .partition_key("page", DataType::Text)
            .counter("views")
            .column("label", DataType::Text)
            .build()
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = events().column("owner", DataType::Text).build().unwrap_err();
        assert!(err.to_string().contains("duplicate column 'owner'"));
    }

    #[test]
    fn foreign_column_id_is_not_found() {
        let model = events().build().unwrap();
        assert_eq!(model.try_column(ColumnId(3)).unwrap().name(), "tags");
        assert!(matches!(
            model.try_column(ColumnId(9)),
            Err(MappingError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn unknown_column_lookup_fails() {
        let model = events().build().unwrap();
        let err = model.column_by_name("missing").unwrap_err();
        assert_eq!(
            err,
            MappingError::ColumnNotFound("missing".to_string(), "UserEvent".to_string())
        );
    }
}
