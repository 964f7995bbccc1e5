use super::codec::{CheckedCodec, ValueCodec, default_codec};
use crate::core::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable position of a column inside its `EntityModel`.
///
/// Used as the key for delta tracking and accessor lookup in place of any
/// field or method identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub(crate) usize);

impl ColumnId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a column may appear in generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Partition,
    Clustering,
    Static,
    Regular,
    Counter,
}

impl ColumnRole {
    pub fn is_key(self) -> bool {
        matches!(self, Self::Partition | Self::Clustering)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiValueKind {
    Scalar,
    List,
    Set,
    Map,
}

impl MultiValueKind {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::List(_) => Self::List,
            DataType::Set(_) => Self::Set,
            DataType::Map(_, _) => Self::Map,
            _ => Self::Scalar,
        }
    }
}

/// A column as declared by the caller, before the model assigns its id.
#[derive(Clone)]
pub struct ColumnDef {
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) codec: Option<Arc<dyn ValueCodec>>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            codec: None,
        }
    }

    /// Uses `codec` instead of the shared MessagePack codec.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = Some(codec);
        self
    }
}

/// Immutable description of one mapped column.
#[derive(Clone)]
pub struct ColumnSpec {
    id: ColumnId,
    name: String,
    role: ColumnRole,
    data_type: DataType,
    kind: MultiValueKind,
    codec: Arc<dyn ValueCodec>,
    raw_codec: Arc<dyn ValueCodec>,
}

impl ColumnSpec {
    pub(crate) fn from_def(id: ColumnId, role: ColumnRole, def: ColumnDef) -> Self {
        let kind = MultiValueKind::of(&def.data_type);
        let raw_codec = def.codec.unwrap_or_else(default_codec);
        let codec: Arc<dyn ValueCodec> =
            Arc::new(CheckedCodec::new(def.data_type.clone(), raw_codec.clone()));
        Self {
            id,
            name: def.name,
            role,
            data_type: def.data_type,
            kind,
            codec,
            raw_codec,
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ColumnRole {
        self.role
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn kind(&self) -> MultiValueKind {
        self.kind
    }

    pub fn codec(&self) -> &Arc<dyn ValueCodec> {
        &self.codec
    }

    /// The codec without the column type check, for delta payloads whose
    /// shape differs from the column type (a single list element, a key set).
    pub fn raw_codec(&self) -> &Arc<dyn ValueCodec> {
        &self.raw_codec
    }

    pub fn is_collection(&self) -> bool {
        self.kind != MultiValueKind::Scalar
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("data_type", &self.data_type)
            .field("kind", &self.kind)
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl PartialEq for ColumnSpec {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.role == other.role
            && self.data_type == other.data_type
    }
}

impl Eq for ColumnSpec {}
