//! The persistence engine and its collaborators: executor seam,
//! configuration and the per-entity flush state.

pub mod config;
pub mod executor;
pub mod managed;
pub mod persistence;

pub use config::{EngineConfig, InsertStrategy};
pub use executor::{Executor, ResultRows};
pub use managed::ManagedEntity;
pub use persistence::{BoundStatement, PersistenceEngine};
