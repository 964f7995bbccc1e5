use crate::binder::BoundValue;
use crate::core::{Result, Row};
use crate::statement::{CompiledStatement, PreparedId};
use async_trait::async_trait;

/// Rows returned by the store for one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRows {
    rows: Vec<Row>,
    applied: Option<bool>,
}

impl ResultRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            applied: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Outcome of a conditional write (`[applied]` column).
    pub fn with_applied(mut self, applied: bool) -> Self {
        self.applied = Some(applied);
        self
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// False only when the store reported a conditional write as not applied.
    pub fn was_applied(&self) -> bool {
        self.applied.unwrap_or(true)
    }
}

/// The driver-side collaborator that prepares and runs statements.
///
/// Retries, consistency levels and timeouts belong to implementations; the
/// engine surfaces every failure as is.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn prepare(&self, text: &str) -> Result<PreparedId>;

    async fn execute(
        &self,
        statement: &CompiledStatement,
        values: &[BoundValue],
    ) -> Result<ResultRows>;
}
