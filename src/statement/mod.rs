//! Statement synthesis: templates from an `EntityModel`, delta-driven
//! updates from a `DeltaTracker`, and the prepared-statement cache.

pub mod cache;
pub mod compiled;
pub mod delta;
pub mod generator;
pub mod kind;
pub mod options;

pub use cache::{CacheStats, StatementCache};
pub use compiled::{CompiledStatement, PreparedId};
pub use delta::{Clause, render_op};
pub use generator::StatementTemplateGenerator;
pub use kind::{BindParameter, OperationKind, TemplateKind};
pub use options::WriteOptions;
