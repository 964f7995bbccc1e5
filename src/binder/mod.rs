//! Placeholder values for compiled statements and the reverse row decode.

pub mod bound;
pub mod value_binder;

pub use bound::{BindTarget, BoundValue, apply_all};
pub use value_binder::{ValueBinder, delta_payload};
