use super::compiled::{CompiledStatement, PreparedId};
use super::generator::StatementTemplateGenerator;
use super::kind::TemplateKind;
use crate::core::Result;
use crate::engine::Executor;
use crate::model::EntityModel;
use log::{debug, info, warn};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<CompiledStatement>>>;
type IdSlot = Arc<OnceCell<PreparedId>>;

/// Snapshot of cache occupancy and executor traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub static_entries: usize,
    pub dynamic_entries: usize,
    pub prepare_calls: u64,
}

/// Two-tier memo of prepared statements.
///
/// The static tier is keyed by `(entity type, template kind)` and holds the
/// prepared template. The dynamic tier is keyed by statement text and holds
/// only the prepared id. Each key owns a `OnceCell`, so concurrent misses
/// on the same key await a single `prepare` and share its result. A failed
/// prepare leaves the cell empty and the next caller retries.
///
/// The maps are only locked to find or create a cell, never across an await.
pub struct StatementCache {
    generator: StatementTemplateGenerator,
    static_tier: Mutex<HashMap<(String, TemplateKind), Slot>>,
    dynamic_tier: Mutex<LruCache<String, IdSlot>>,
    prepare_calls: AtomicU64,
}

impl StatementCache {
    /// Unbounded dynamic tier.
    pub fn new(generator: StatementTemplateGenerator) -> Self {
        Self::with_dynamic_capacity(generator, None)
    }

    /// `Some(n)` bounds the dynamic tier to `n` texts, evicting the least
    /// recently used; `None` or `Some(0)` leaves it unbounded.
    pub fn with_dynamic_capacity(
        generator: StatementTemplateGenerator,
        capacity: Option<usize>,
    ) -> Self {
        let dynamic = capacity
            .and_then(NonZeroUsize::new)
            .map(LruCache::new)
            .unwrap_or_else(LruCache::unbounded);
        Self {
            generator,
            static_tier: Mutex::new(HashMap::new()),
            dynamic_tier: Mutex::new(dynamic),
            prepare_calls: AtomicU64::new(0),
        }
    }

    pub fn generator(&self) -> &StatementTemplateGenerator {
        &self.generator
    }

    /// Already-prepared static template, without generating or preparing.
    pub fn get(
        &self,
        entity_type: &str,
        kind: TemplateKind,
    ) -> Result<Option<Arc<CompiledStatement>>> {
        let tier = self.static_tier.lock()?;
        Ok(tier
            .get(&(entity_type.to_string(), kind))
            .and_then(|slot| slot.get().cloned()))
    }

    /// Returns the prepared static template, generating and preparing it on
    /// first use.
    pub async fn get_or_prepare(
        &self,
        model: &EntityModel,
        kind: TemplateKind,
        executor: &dyn Executor,
    ) -> Result<Arc<CompiledStatement>> {
        let slot = {
            let mut tier = self.static_tier.lock()?;
            tier.entry((model.entity_type().to_string(), kind))
                .or_default()
                .clone()
        };
        let statement = slot
            .get_or_try_init(move || async move {
                debug!("static miss: {} {:?}", model.entity_type(), kind);
                let statement = self.generator.generate(model, kind)?;
                self.prepare(statement, executor).await
            })
            .await?;
        Ok(statement.clone())
    }

    /// Returns the prepared form of a dynamic statement.
    ///
    /// The tier remembers only the prepared id per text. Equal texts can
    /// carry different placeholder manifests (a delta segment binds the op
    /// at its own position), so the returned statement is always `statement`
    /// itself with the shared id attached.
    pub async fn get_or_prepare_dynamic(
        &self,
        statement: CompiledStatement,
        executor: &dyn Executor,
    ) -> Result<Arc<CompiledStatement>> {
        let slot = {
            let mut tier = self.dynamic_tier.lock()?;
            match tier.get(statement.text()) {
                Some(slot) => slot.clone(),
                None => {
                    let slot = IdSlot::default();
                    if let Some((evicted, _)) =
                        tier.push(statement.text().to_string(), slot.clone())
                    {
                        if evicted != statement.text() {
                            debug!("dynamic tier evicted: {}", evicted);
                        }
                    }
                    slot
                }
            }
        };
        let text = statement.text();
        let id = *slot
            .get_or_try_init(|| async move {
                debug!("dynamic miss: {}", text);
                self.prepare_text(text, executor).await
            })
            .await?;
        Ok(Arc::new(statement.with_prepared(id)))
    }

    async fn prepare(
        &self,
        statement: CompiledStatement,
        executor: &dyn Executor,
    ) -> Result<Arc<CompiledStatement>> {
        let id = self.prepare_text(statement.text(), executor).await?;
        Ok(Arc::new(statement.with_prepared(id)))
    }

    async fn prepare_text(&self, text: &str, executor: &dyn Executor) -> Result<PreparedId> {
        self.prepare_calls.fetch_add(1, Ordering::Relaxed);
        match executor.prepare(text).await {
            Ok(id) => Ok(id),
            Err(err) => {
                warn!("prepare failed for '{}': {}", text, err);
                Err(err)
            }
        }
    }

    /// Prepares every template kind `model` supports. Returns how many are
    /// now cached for it.
    pub async fn warm_up(&self, model: &EntityModel, executor: &dyn Executor) -> Result<usize> {
        let kinds = self.generator.supported_kinds(model);
        for kind in &kinds {
            self.get_or_prepare(model, *kind, executor).await?;
        }
        info!(
            "warmed up {} statement templates for {}",
            kinds.len(),
            model.entity_type()
        );
        Ok(kinds.len())
    }

    pub fn clear_dynamic(&self) -> Result<()> {
        self.dynamic_tier.lock()?.clear();
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let static_entries = self
            .static_tier
            .lock()?
            .values()
            .filter(|slot| slot.initialized())
            .count();
        let dynamic_entries = self
            .dynamic_tier
            .lock()?
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .count();
        Ok(CacheStats {
            static_entries,
            dynamic_entries,
            prepare_calls: self.prepare_calls.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BoundValue;
    use crate::core::{DataType, MappingError};
    use crate::engine::ResultRows;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct CountingExecutor {
        prepared: AtomicU64,
        fail_next: AtomicBool,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn prepare(&self, _text: &str) -> Result<PreparedId> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(MappingError::Executor("node unavailable".to_string()));
            }
            Ok(PreparedId(self.prepared.fetch_add(1, Ordering::SeqCst)))
        }

        async fn execute(
            &self,
            _statement: &CompiledStatement,
            _values: &[BoundValue],
        ) -> Result<ResultRows> {
            Ok(ResultRows::empty())
        }
    }

    fn model() -> EntityModel {
        EntityModel::builder("User", "users")
            .partition_key("id", DataType::Uuid)
            .column("name", DataType::Text)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn second_lookup_hits_the_static_tier() {
        let cache = StatementCache::new(StatementTemplateGenerator::new());
        let executor = CountingExecutor::default();
        let model = model();
        let first = cache
            .get_or_prepare(&model, TemplateKind::Insert, &executor)
            .await
            .unwrap();
        let second = cache
            .get_or_prepare(&model, TemplateKind::Insert, &executor)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.prepared(), Some(PreparedId(0)));
        assert_eq!(cache.stats().unwrap().prepare_calls, 1);
        assert!(cache.get("User", TemplateKind::Insert).unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_prepare_is_retried() {
        let cache = StatementCache::new(StatementTemplateGenerator::new());
        let executor = CountingExecutor::default();
        executor.fail_next.store(true, Ordering::SeqCst);
        let model = model();
        assert!(
            cache
                .get_or_prepare(&model, TemplateKind::Select, &executor)
                .await
                .is_err()
        );
        assert!(
            cache
                .get_or_prepare(&model, TemplateKind::Select, &executor)
                .await
                .is_ok()
        );
        assert_eq!(cache.stats().unwrap().static_entries, 1);
    }

    #[tokio::test]
    async fn invalid_templates_never_reach_the_executor() {
        let cache = StatementCache::new(StatementTemplateGenerator::new());
        let executor = CountingExecutor::default();
        let err = cache
            .get_or_prepare(&model(), TemplateKind::UpdateStatic, &executor)
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
        assert_eq!(executor.prepared.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bounded_dynamic_tier_evicts_least_recent() {
        let cache =
            StatementCache::with_dynamic_capacity(StatementTemplateGenerator::new(), Some(1));
        let executor = CountingExecutor::default();
        let model = model();
        let generator = StatementTemplateGenerator::new();
        let options = crate::statement::WriteOptions::new().with_timestamp(1);
        let update = generator.update_with(&model, false, &options).unwrap();
        let delete = generator.delete_with(&model, false, &options).unwrap();

        cache
            .get_or_prepare_dynamic(update.clone(), &executor)
            .await
            .unwrap();
        cache.get_or_prepare_dynamic(delete, &executor).await.unwrap();
        cache.get_or_prepare_dynamic(update, &executor).await.unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.dynamic_entries, 1);
        assert_eq!(stats.prepare_calls, 3);
    }

    #[tokio::test]
    async fn equal_texts_keep_their_own_parameters() {
        let cache = StatementCache::new(StatementTemplateGenerator::new());
        let executor = CountingExecutor::default();
        let model = EntityModel::builder("Doc", "docs")
            .partition_key("id", DataType::BigInt)
            .column("lines", DataType::list(DataType::Text))
            .build()
            .unwrap();
        let lines = model.column_by_name("lines").unwrap();
        let mut tracker = crate::delta::DeltaTracker::new();
        tracker.append_list(lines, [crate::core::Value::from("a")]);
        tracker.remove_at(lines, 0);
        tracker.append_list(lines, [crate::core::Value::from("b")]);
        let segments = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &crate::statement::WriteOptions::new())
            .unwrap();
        assert_eq!(segments[0].text(), segments[2].text());

        let first = cache
            .get_or_prepare_dynamic(segments[0].clone(), &executor)
            .await
            .unwrap();
        let last = cache
            .get_or_prepare_dynamic(segments[2].clone(), &executor)
            .await
            .unwrap();
        assert_eq!(first.parameters(), segments[0].parameters());
        assert_eq!(last.parameters(), segments[2].parameters());
        assert_ne!(first.parameters(), last.parameters());
        assert_eq!(first.prepared(), last.prepared());
        assert_eq!(cache.stats().unwrap().prepare_calls, 1);
    }

    #[tokio::test]
    async fn warm_up_prepares_supported_kinds() {
        let cache = StatementCache::new(StatementTemplateGenerator::new());
        let executor = CountingExecutor::default();
        let count = cache.warm_up(&model(), &executor).await.unwrap();
        // static-only and counter forms are rejected for this model
        assert_eq!(count, 8);
        assert_eq!(cache.stats().unwrap().static_entries, 8);
    }
}
