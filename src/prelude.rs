//! Everything an application needs to map an entity and flush it.
//!
//! ```
//! use cqlmapper::prelude::*;
//! ```

pub use crate::binder::{BoundValue, ValueBinder};
pub use crate::core::{DataType, FromValue, MappingError, Result, Row, Value, WireValue};
pub use crate::delta::{CollectionOp, DeltaTracker};
pub use crate::engine::{
    BoundStatement, EngineConfig, Executor, InsertStrategy, ManagedEntity, PersistenceEngine,
    ResultRows,
};
pub use crate::field_accessors;
pub use crate::model::{ColumnSpec, EntityMapping, EntityModel, FieldAccessor, ValueCodec};
pub use crate::proxy::{
    ListProxy, MapProxy, Previous, SetProxy, TrackedList, TrackedMap, TrackedSet, WriteOnlyList,
    WriteOnlyMap, WriteOnlySet,
};
pub use crate::statement::{
    CompiledStatement, PreparedId, StatementTemplateGenerator, TemplateKind, WriteOptions,
};
