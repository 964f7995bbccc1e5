use super::kind::{BindParameter, OperationKind, TemplateKind};
use crate::delta::DeltaEntry;
use crate::model::ColumnId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle returned by the executor for a prepared statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreparedId(pub u64);

impl fmt::Display for PreparedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prepared#{}", self.0)
    }
}

/// A parameterized statement plus the order in which its placeholders bind.
///
/// Immutable once built; the cache hands out `Arc<CompiledStatement>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    entity_type: String,
    template: Option<TemplateKind>,
    operation: OperationKind,
    text: String,
    parameters: Vec<BindParameter>,
    conditional: bool,
    prepared: Option<PreparedId>,
    writes: Vec<DeltaEntry>,
}

impl CompiledStatement {
    pub(crate) fn new(
        entity_type: impl Into<String>,
        template: Option<TemplateKind>,
        operation: OperationKind,
        text: String,
        parameters: Vec<BindParameter>,
        conditional: bool,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            template,
            operation,
            text,
            parameters,
            conditional,
            prepared: None,
            writes: Vec::new(),
        }
    }

    pub(crate) fn with_writes(mut self, writes: Vec<DeltaEntry>) -> Self {
        self.writes = writes;
        self
    }

    pub fn with_prepared(mut self, id: PreparedId) -> Self {
        self.prepared = Some(id);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The static template this was compiled from; `None` for dynamic text.
    pub fn template(&self) -> Option<TemplateKind> {
        self.template
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[BindParameter] {
        &self.parameters
    }

    /// Columns whose current field value is bound, in placeholder order.
    pub fn parameter_columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.parameters.iter().filter_map(|parameter| match parameter {
            BindParameter::Column(id) => Some(*id),
            _ => None,
        })
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn prepared(&self) -> Option<PreparedId> {
        self.prepared
    }

    /// Tracker entries this statement writes; empty for template statements.
    pub fn writes(&self) -> &[DeltaEntry] {
        &self.writes
    }

    pub fn is_dynamic(&self) -> bool {
        self.template.is_none()
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
