//! Mutation recording: collection deltas, scalar assignments, counter deltas.

pub mod op;
pub mod scalar;
pub mod tracker;

pub use op::CollectionOp;
pub use scalar::ScalarSnapshot;
pub use tracker::{DeltaEntry, DeltaTracker};
