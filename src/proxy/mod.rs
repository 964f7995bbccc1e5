//! Collection proxies that record mutations into a `DeltaTracker`.
//!
//! Two families share the capability traits in `capability`:
//!
//! - tracked proxies (`TrackedList`, `TrackedSet`, `TrackedMap`) sit over a
//!   loaded collection, answer reads from it and record only effective
//!   changes;
//! - write-only proxies (`WriteOnlyList`, `WriteOnlySet`, `WriteOnlyMap`) hold
//!   no value at all, record every mutation and fail every read.

pub mod capability;
pub mod element;
pub mod tracked_list;
pub mod tracked_map;
pub mod tracked_set;
pub mod write_only;

pub use capability::{ListProxy, MapProxy, SetProxy};
pub use element::{EntityProxy, Previous, ProxyElement};
pub use tracked_list::{TrackedList, TrackedListCursor};
pub use tracked_map::{KeySetView, TrackedEntry, TrackedMap, ValuesView};
pub use tracked_set::TrackedSet;
pub use write_only::{WriteOnlyList, WriteOnlyMap, WriteOnlySet};

use crate::core::{MappingError, Result};
use crate::model::{ColumnSpec, MultiValueKind};

pub(crate) fn expect_kind(column: &ColumnSpec, kind: MultiValueKind) -> Result<()> {
    if column.kind() == kind {
        Ok(())
    } else {
        Err(MappingError::TypeMismatch(format!(
            "column '{}' is {}, not a {:?} collection",
            column.name(),
            column.data_type(),
            kind
        )))
    }
}
