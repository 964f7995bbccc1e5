use super::config::{EngineConfig, InsertStrategy};
use super::executor::{Executor, ResultRows};
use super::managed::ManagedEntity;
use crate::binder::{BoundValue, ValueBinder};
use crate::core::{MappingError, Result};
use crate::delta::DeltaTracker;
use crate::model::{ColumnRole, ColumnSpec, EntityMapping, EntityModel};
use crate::statement::{
    CompiledStatement, StatementCache, StatementTemplateGenerator, TemplateKind, WriteOptions,
};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// A prepared statement with its bound values, ready for the executor or a
/// caller-assembled batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    statement: Arc<CompiledStatement>,
    values: Vec<BoundValue>,
}

impl BoundStatement {
    pub fn statement(&self) -> &Arc<CompiledStatement> {
        &self.statement
    }

    pub fn values(&self) -> &[BoundValue] {
        &self.values
    }

    pub fn text(&self) -> &str {
        self.statement.text()
    }
}

/// Composition root: picks templates, binds values and hands statements to
/// the executor.
///
/// One engine is shared by every flush; only its statement cache is mutable.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use cqlmapper::prelude::*;
/// use std::sync::Arc;
///
/// struct NoopExecutor;
///
/// #[async_trait]
/// impl Executor for NoopExecutor {
///     async fn prepare(&self, _text: &str) -> Result<PreparedId> {
///         Ok(PreparedId(1))
///     }
///
///     async fn execute(
///         &self,
///         _statement: &CompiledStatement,
///         _values: &[BoundValue],
///     ) -> Result<ResultRows> {
///         Ok(ResultRows::empty())
///     }
/// }
///
/// let model = EntityModel::builder("User", "users")
///     .partition_key("id", DataType::BigInt)
///     .column("name", DataType::Text)
///     .build()
///     .unwrap();
/// let engine = PersistenceEngine::new(Arc::new(NoopExecutor), EngineConfig::default());
/// # tokio_test::block_on(async {
/// let select = engine.prepared(&model, TemplateKind::Select).await.unwrap();
/// assert_eq!(select.text(), "SELECT id, name FROM users WHERE id = ?");
/// # });
/// ```
pub struct PersistenceEngine {
    config: EngineConfig,
    executor: Arc<dyn Executor>,
    cache: Arc<StatementCache>,
    binder: ValueBinder,
}

impl PersistenceEngine {
    pub fn new(executor: Arc<dyn Executor>, config: EngineConfig) -> Self {
        let generator = StatementTemplateGenerator::with_keyspace(config.keyspace.clone());
        let cache = StatementCache::with_dynamic_capacity(generator, config.dynamic_cache_capacity);
        let binder = ValueBinder::with_default_ttl(config.default_ttl);
        Self {
            config,
            executor,
            cache: Arc::new(cache),
            binder,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<StatementCache> {
        &self.cache
    }

    pub fn binder(&self) -> &ValueBinder {
        &self.binder
    }

    pub fn generator(&self) -> &StatementTemplateGenerator {
        self.cache.generator()
    }

    /// Generates the template of `kind` without preparing or caching it.
    pub fn compile(&self, model: &EntityModel, kind: TemplateKind) -> Result<CompiledStatement> {
        self.generator().generate(model, kind)
    }

    /// The cached, prepared template of `kind`.
    pub async fn prepared(
        &self,
        model: &EntityModel,
        kind: TemplateKind,
    ) -> Result<Arc<CompiledStatement>> {
        self.cache
            .get_or_prepare(model, kind, self.executor.as_ref())
            .await
    }

    /// Binds `statement` against `entity` and the optional tracker.
    pub fn bind<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        statement: &CompiledStatement,
        tracker: Option<&DeltaTracker>,
        options: &WriteOptions,
    ) -> Result<Vec<BoundValue>> {
        self.binder
            .bind(entity, mapping, statement, tracker, options)
    }

    /// Prepares every template the entity type supports.
    pub async fn warm_up<E>(&self, mapping: &EntityMapping<E>) -> Result<usize> {
        self.cache
            .warm_up(mapping.model(), self.executor.as_ref())
            .await
    }

    async fn template_or_dynamic(
        &self,
        model: &EntityModel,
        kind: TemplateKind,
        dynamic: Option<CompiledStatement>,
    ) -> Result<Arc<CompiledStatement>> {
        match dynamic {
            Some(statement) => {
                self.cache
                    .get_or_prepare_dynamic(statement, self.executor.as_ref())
                    .await
            }
            None => self.prepared(model, kind).await,
        }
    }

    /// INSERT for the full entity, following the configured insert strategy.
    pub async fn build_insert<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<BoundStatement> {
        options.validate()?;
        reject_if_exists(options, "INSERT")?;
        let model = mapping.model();
        let kind = if options.if_not_exists {
            TemplateKind::InsertIfNotExists
        } else {
            TemplateKind::Insert
        };
        let dynamic = if self.config.insert_strategy == InsertStrategy::NotNullFields {
            let columns: Vec<&ColumnSpec> = mapping
                .values(entity)
                .filter(|(column, value)| !column.role().is_key() && !value.is_null())
                .map(|(column, _)| column)
                .collect();
            Some(self.generator().insert_with(model, &columns, options)?)
        } else if options.needs_dynamic_text() {
            let columns: Vec<&ColumnSpec> = model.columns().iter().collect();
            Some(self.generator().insert_with(model, &columns, options)?)
        } else {
            None
        };
        let statement = self.template_or_dynamic(model, kind, dynamic).await?;
        let values = self.bind(entity, mapping, &statement, None, options)?;
        Ok(BoundStatement { statement, values })
    }

    /// INSERT of the partition key and static columns only.
    pub async fn build_insert_static<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<BoundStatement> {
        options.validate()?;
        reject_if_exists(options, "static INSERT")?;
        let model = mapping.model();
        let all_null = mapping
            .values(entity)
            .filter(|(column, _)| column.role() == ColumnRole::Static)
            .all(|(_, value)| value.is_null());
        if model.has_static_columns() && all_null {
            return Err(MappingError::UnsupportedOperation(format!(
                "{}: static insert with every static column null",
                model.entity_type()
            )));
        }
        if options.needs_dynamic_text() {
            return Err(MappingError::UnsupportedOperation(
                "static insert does not take a timestamp or IF conditions".to_string(),
            ));
        }
        let kind = if options.if_not_exists {
            TemplateKind::InsertStaticIfNotExists
        } else {
            TemplateKind::InsertStatic
        };
        let statement = self.prepared(model, kind).await?;
        let values = self.bind(entity, mapping, &statement, None, options)?;
        Ok(BoundStatement { statement, values })
    }

    /// UPDATE of every static and regular column from current field values.
    pub async fn build_update_all<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        static_only: bool,
        options: &WriteOptions,
    ) -> Result<BoundStatement> {
        options.validate()?;
        let model = mapping.model();
        let kind = match (static_only, options.if_exists) {
            (false, false) => TemplateKind::Update,
            (false, true) => TemplateKind::UpdateIfExists,
            (true, false) => TemplateKind::UpdateStatic,
            (true, true) => TemplateKind::UpdateStaticIfExists,
        };
        let dynamic = if options.needs_dynamic_text() || options.if_not_exists {
            Some(self.generator().update_with(model, static_only, options)?)
        } else {
            None
        };
        let statement = self.template_or_dynamic(model, kind, dynamic).await?;
        let values = self.bind(entity, mapping, &statement, None, options)?;
        Ok(BoundStatement { statement, values })
    }

    /// Statements writing everything `managed` accumulated this cycle, in
    /// order. Empty when there is nothing to write.
    pub async fn build_update<E>(
        &self,
        managed: &ManagedEntity<E>,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<Vec<BoundStatement>> {
        let model = mapping.model();
        let scalars = managed.scalar_changes(mapping);
        let statements =
            self.generator()
                .delta_update(model, managed.tracker(), &scalars, options)?;
        let mut bound = Vec::with_capacity(statements.len());
        for statement in statements {
            let statement = self
                .cache
                .get_or_prepare_dynamic(statement, self.executor.as_ref())
                .await?;
            let values = self.bind(
                managed.entity(),
                mapping,
                &statement,
                Some(managed.tracker()),
                options,
            )?;
            bound.push(BoundStatement { statement, values });
        }
        Ok(bound)
    }

    pub async fn build_delete<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        partition_only: bool,
        options: &WriteOptions,
    ) -> Result<BoundStatement> {
        options.validate()?;
        if options.if_not_exists {
            return Err(MappingError::UnsupportedOperation(
                "DELETE does not support IF NOT EXISTS".to_string(),
            ));
        }
        let model = mapping.model();
        let kind = match (partition_only, options.if_exists) {
            (true, false) => TemplateKind::DeletePartition,
            (false, true) => TemplateKind::DeleteIfExists,
            _ => TemplateKind::Delete,
        };
        let dynamic = if options.needs_dynamic_text() || (partition_only && options.if_exists) {
            Some(self.generator().delete_with(model, partition_only, options)?)
        } else {
            None
        };
        let statement = self.template_or_dynamic(model, kind, dynamic).await?;
        let values = self.bind(entity, mapping, &statement, None, options)?;
        Ok(BoundStatement { statement, values })
    }

    pub async fn build_select<E>(
        &self,
        key: &E,
        mapping: &EntityMapping<E>,
    ) -> Result<BoundStatement> {
        let statement = self.prepared(mapping.model(), TemplateKind::Select).await?;
        let values = self.bind(key, mapping, &statement, None, &WriteOptions::default())?;
        Ok(BoundStatement { statement, values })
    }

    /// Runs one bound statement. Failures are logged and returned unchanged.
    pub async fn execute(&self, bound: &BoundStatement) -> Result<ResultRows> {
        let statement = bound.statement();
        let span = info_span!(
            "engine.execute",
            entity_type = %statement.entity_type(),
            operation = %statement.operation()
        );
        async {
            if self.config.log_statements {
                event!(
                    Level::DEBUG,
                    statement = %statement.text(),
                    values = bound.values().len(),
                    "executing statement"
                );
            }
            match self.executor.execute(statement, bound.values()).await {
                Ok(rows) => Ok(rows),
                Err(err) => {
                    event!(Level::ERROR, error = %err, "statement execution failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn insert<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<ResultRows> {
        let span = info_span!("engine.insert", entity_type = %mapping.entity_type());
        async {
            let bound = self.build_insert(entity, mapping, options).await?;
            self.execute(&bound).await
        }
        .instrument(span)
        .await
    }

    pub async fn update_all<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<ResultRows> {
        let span = info_span!("engine.update", entity_type = %mapping.entity_type());
        async {
            let bound = self.build_update_all(entity, mapping, false, options).await?;
            self.execute(&bound).await
        }
        .instrument(span)
        .await
    }

    /// Writes what `managed` accumulated and starts a new cycle.
    ///
    /// The tracker is reset only when every statement ran and every
    /// conditional write applied; otherwise it is kept for a retry.
    pub async fn flush<E>(
        &self,
        managed: &mut ManagedEntity<E>,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<Vec<ResultRows>> {
        let span = info_span!("engine.update", entity_type = %mapping.entity_type());
        async {
            let pending = self.build_update(managed, mapping, options).await?;
            if pending.is_empty() {
                event!(Level::DEBUG, "nothing to flush");
                return Ok(Vec::new());
            }
            let mut results = Vec::with_capacity(pending.len());
            for (done, bound) in pending.iter().enumerate() {
                match self.execute(bound).await {
                    Ok(rows) => results.push(rows),
                    Err(err) => {
                        // Statements before `done` are applied; drop what they wrote.
                        let written: Vec<_> = pending[..done]
                            .iter()
                            .flat_map(|applied| applied.statement().writes().iter().copied())
                            .collect();
                        managed.tracker_mut().discard(&written);
                        event!(
                            Level::WARN,
                            applied = done,
                            total = pending.len(),
                            "flush failed part way, keeping unwritten changes"
                        );
                        return Err(err);
                    }
                }
            }
            if results.iter().all(ResultRows::was_applied) {
                managed.mark_flushed(mapping);
                event!(Level::DEBUG, statements = pending.len(), "entity flushed");
            } else {
                event!(Level::INFO, "conditional flush not applied, keeping tracked changes");
            }
            Ok(results)
        }
        .instrument(span)
        .await
    }

    pub async fn delete<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
        options: &WriteOptions,
    ) -> Result<ResultRows> {
        let span = info_span!("engine.delete", entity_type = %mapping.entity_type());
        async {
            let bound = self.build_delete(entity, mapping, false, options).await?;
            self.execute(&bound).await
        }
        .instrument(span)
        .await
    }

    /// Deletes the whole partition `entity` belongs to.
    pub async fn delete_partition<E>(
        &self,
        entity: &E,
        mapping: &EntityMapping<E>,
    ) -> Result<ResultRows> {
        let span = info_span!("engine.delete", entity_type = %mapping.entity_type());
        async {
            let bound = self
                .build_delete(entity, mapping, true, &WriteOptions::default())
                .await?;
            self.execute(&bound).await
        }
        .instrument(span)
        .await
    }

    pub async fn select<E>(&self, key: &E, mapping: &EntityMapping<E>) -> Result<ResultRows> {
        let span = info_span!("engine.select", entity_type = %mapping.entity_type());
        async {
            let bound = self.build_select(key, mapping).await?;
            self.execute(&bound).await
        }
        .instrument(span)
        .await
    }

    /// Loads the row keyed by `key`'s primary key fields into an entity made
    /// by `factory`. `None` when the row does not exist.
    pub async fn find<E, F>(
        &self,
        key: &E,
        mapping: &EntityMapping<E>,
        factory: F,
    ) -> Result<Option<ManagedEntity<E>>>
    where
        F: FnOnce() -> E,
    {
        let span = info_span!("engine.select", entity_type = %mapping.entity_type());
        async {
            let bound = self.build_select(key, mapping).await?;
            let rows = self.execute(&bound).await?;
            let Some(row) = rows.first() else {
                return Ok(None);
            };
            let mut entity = factory();
            self.binder
                .hydrate(&mut entity, mapping, bound.statement(), row)?;
            Ok(Some(ManagedEntity::loaded(entity, mapping)))
        }
        .instrument(span)
        .await
    }
}

fn reject_if_exists(options: &WriteOptions, statement: &str) -> Result<()> {
    if options.if_exists {
        return Err(MappingError::UnsupportedOperation(format!(
            "{} does not support IF EXISTS",
            statement
        )));
    }
    Ok(())
}
