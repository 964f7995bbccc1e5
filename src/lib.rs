// ============================================================================
// cqlmapper Library
// ============================================================================

//! Object mapping layer for wide-column stores with CQL-style statements.
//!
//! Entities are described once by an [`EntityModel`] and bound to a Rust
//! type through an [`EntityMapping`]. Collection fields are edited through
//! proxies that record deltas, so a flush writes `tags = tags + ?` instead
//! of rewriting the whole column. Statement text is generated per entity
//! type, prepared once and cached; the [`PersistenceEngine`] binds values
//! and hands statements to a driver-side [`Executor`].
//!
//! ```
//! use cqlmapper::prelude::*;
//!
//! let model = EntityModel::builder("Event", "events")
//!     .partition_key("id", DataType::BigInt)
//!     .clustering_column("ts", DataType::BigInt)
//!     .column("tags", DataType::list(DataType::Text))
//!     .build()
//!     .unwrap();
//! let insert = StatementTemplateGenerator::new()
//!     .generate(&model, TemplateKind::Insert)
//!     .unwrap();
//! assert_eq!(
//!     insert.text(),
//!     "INSERT INTO events (id, ts, tags) VALUES (?, ?, ?) USING TTL ?"
//! );
//! ```

pub mod binder;
pub mod core;
pub mod delta;
pub mod engine;
pub mod model;
pub mod prelude;
pub mod proxy;
pub mod statement;

// Re-export main types for convenience
pub use core::{DataType, FromValue, MappingError, Result, Row, Value, WireValue};
pub use delta::{CollectionOp, DeltaTracker};
pub use engine::{
    BoundStatement, EngineConfig, Executor, InsertStrategy, ManagedEntity, PersistenceEngine,
    ResultRows,
};
pub use model::{ColumnSpec, EntityMapping, EntityModel, FieldAccessor};
pub use statement::{
    CompiledStatement, PreparedId, StatementCache, StatementTemplateGenerator, TemplateKind,
    WriteOptions,
};
