use crate::core::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One atomic, read-independent mutation intent on a collection column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOp {
    AddElements(BTreeSet<Value>),
    RemoveElements(BTreeSet<Value>),
    ClearAll,
    AppendListElements(Vec<Value>),
    PrependListElements(Vec<Value>),
    SetListElementAtIndex(usize, Value),
    RemoveListElementAtIndex(usize),
    PutMapEntries(BTreeMap<Value, Value>),
    RemoveMapKey(Value),
}

impl CollectionOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddElements(_) => "AddElements",
            Self::RemoveElements(_) => "RemoveElements",
            Self::ClearAll => "ClearAll",
            Self::AppendListElements(_) => "AppendListElements",
            Self::PrependListElements(_) => "PrependListElements",
            Self::SetListElementAtIndex(_, _) => "SetListElementAtIndex",
            Self::RemoveListElementAtIndex(_) => "RemoveListElementAtIndex",
            Self::PutMapEntries(_) => "PutMapEntries",
            Self::RemoveMapKey(_) => "RemoveMapKey",
        }
    }

    /// True for ops whose payload is empty and would render a no-op clause.
    pub fn is_empty_mutation(&self) -> bool {
        match self {
            Self::AddElements(values) | Self::RemoveElements(values) => values.is_empty(),
            Self::AppendListElements(values) | Self::PrependListElements(values) => {
                values.is_empty()
            }
            Self::PutMapEntries(entries) => entries.is_empty(),
            _ => false,
        }
    }
}
