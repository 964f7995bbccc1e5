use crate::model::ColumnId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Select => "SELECT",
        };
        write!(f, "{}", name)
    }
}

/// One static statement form. Each entity type has at most one compiled
/// statement per template kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemplateKind {
    Insert,
    InsertIfNotExists,
    /// Partition keys and static columns only.
    InsertStatic,
    InsertStaticIfNotExists,
    Update,
    UpdateIfExists,
    /// SET over static columns, WHERE over partition keys only.
    UpdateStatic,
    UpdateStaticIfExists,
    /// `c = c + ?` for every counter column.
    CounterUpdate,
    Delete,
    DeleteIfExists,
    /// WHERE over partition keys only.
    DeletePartition,
    Select,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 13] = [
        Self::Insert,
        Self::InsertIfNotExists,
        Self::InsertStatic,
        Self::InsertStaticIfNotExists,
        Self::Update,
        Self::UpdateIfExists,
        Self::UpdateStatic,
        Self::UpdateStaticIfExists,
        Self::CounterUpdate,
        Self::Delete,
        Self::DeleteIfExists,
        Self::DeletePartition,
        Self::Select,
    ];

    pub fn operation(self) -> OperationKind {
        match self {
            Self::Insert
            | Self::InsertIfNotExists
            | Self::InsertStatic
            | Self::InsertStaticIfNotExists => OperationKind::Insert,
            Self::Update
            | Self::UpdateIfExists
            | Self::UpdateStatic
            | Self::UpdateStaticIfExists
            | Self::CounterUpdate => OperationKind::Update,
            Self::Delete | Self::DeleteIfExists | Self::DeletePartition => OperationKind::Delete,
            Self::Select => OperationKind::Select,
        }
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            Self::InsertIfNotExists
                | Self::InsertStaticIfNotExists
                | Self::UpdateIfExists
                | Self::UpdateStaticIfExists
                | Self::DeleteIfExists
        )
    }

    pub fn is_static_only(self) -> bool {
        matches!(
            self,
            Self::InsertStatic
                | Self::InsertStaticIfNotExists
                | Self::UpdateStatic
                | Self::UpdateStaticIfExists
        )
    }
}

/// What the binder must supply for one `?` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindParameter {
    /// Current field value of the column.
    Column(ColumnId),
    /// Payload of the `op`-th recorded collection op on the column.
    Delta { column: ColumnId, op: usize },
    /// Pending counter delta of the column.
    Counter(ColumnId),
    /// Expected value of the `index`-th write condition.
    Condition { column: ColumnId, index: usize },
    Ttl,
    Timestamp,
}

impl BindParameter {
    pub fn column(&self) -> Option<ColumnId> {
        match self {
            Self::Column(id) | Self::Counter(id) => Some(*id),
            Self::Delta { column, .. } | Self::Condition { column, .. } => Some(*column),
            Self::Ttl | Self::Timestamp => None,
        }
    }
}
