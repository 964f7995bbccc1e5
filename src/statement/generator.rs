use super::compiled::CompiledStatement;
use super::kind::{BindParameter, OperationKind, TemplateKind};
use super::options::WriteOptions;
use crate::core::{MappingError, Result, Value};
use crate::model::{ColumnRole, ColumnSpec, EntityModel, qualified_table, quote_identifier};

/// Which lightweight-transaction clause a statement carries.
#[derive(Debug, Clone, Copy)]
pub(super) enum Guard<'o> {
    None,
    IfNotExists,
    IfExists,
    Conditions(&'o [(String, Value)]),
}

impl Guard<'_> {
    pub(super) fn is_conditional(&self) -> bool {
        !matches!(self, Guard::None)
    }
}

/// Statement modifiers that change the text: timestamp placeholder and guard.
#[derive(Debug, Clone, Copy)]
pub(super) struct Shape<'o> {
    pub(super) timestamp: bool,
    pub(super) guard: Guard<'o>,
}

impl<'o> Shape<'o> {
    pub(super) fn plain() -> Self {
        Self {
            timestamp: false,
            guard: Guard::None,
        }
    }

    fn guarded(guard: Guard<'o>) -> Self {
        Self {
            timestamp: false,
            guard,
        }
    }

    pub(super) fn from_options(options: &'o WriteOptions) -> Result<Self> {
        options.validate()?;
        let guard = if options.if_not_exists {
            Guard::IfNotExists
        } else if options.if_exists {
            Guard::IfExists
        } else if !options.conditions.is_empty() {
            Guard::Conditions(&options.conditions)
        } else {
            Guard::None
        };
        Ok(Self {
            timestamp: options.timestamp.is_some(),
            guard,
        })
    }
}

pub(super) fn column_list<'c>(columns: impl Iterator<Item = &'c ColumnSpec>) -> String {
    columns
        .map(|column| quote_identifier(column.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` USING TTL ? AND TIMESTAMP ?`, or the subset that applies.
pub(super) fn using_clause(ttl: bool, timestamp: bool, params: &mut Vec<BindParameter>) -> String {
    let mut parts = Vec::new();
    if ttl {
        parts.push("TTL ?");
        params.push(BindParameter::Ttl);
    }
    if timestamp {
        parts.push("TIMESTAMP ?");
        params.push(BindParameter::Timestamp);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" USING {}", parts.join(" AND "))
    }
}

/// `pk = ? AND ck = ?`; clustering columns are left out for partition-level
/// statements.
pub(super) fn key_clause(
    model: &EntityModel,
    partition_only: bool,
    params: &mut Vec<BindParameter>,
) -> String {
    model
        .primary_key()
        .filter(|column| !partition_only || column.role() == ColumnRole::Partition)
        .map(|column| {
            params.push(BindParameter::Column(column.id()));
            format!("{} = ?", quote_identifier(column.name()))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(super) fn guard_clause(
    model: &EntityModel,
    guard: Guard<'_>,
    params: &mut Vec<BindParameter>,
) -> Result<String> {
    match guard {
        Guard::None => Ok(String::new()),
        Guard::IfNotExists => Ok(" IF NOT EXISTS".to_string()),
        Guard::IfExists => Ok(" IF EXISTS".to_string()),
        Guard::Conditions(conditions) => {
            let mut parts = Vec::with_capacity(conditions.len());
            for (index, (name, _)) in conditions.iter().enumerate() {
                let column = model.column_by_name(name)?;
                if column.role().is_key() {
                    return Err(MappingError::UnsupportedOperation(format!(
                        "IF condition on primary key column '{}'",
                        name
                    )));
                }
                params.push(BindParameter::Condition {
                    column: column.id(),
                    index,
                });
                parts.push(format!("{} = ?", quote_identifier(column.name())));
            }
            Ok(format!(" IF {}", parts.join(" AND ")))
        }
    }
}

pub(super) fn reject_counter_guard(model: &EntityModel, guard: Guard<'_>) -> Result<()> {
    if model.is_counter_entity() && guard.is_conditional() {
        return Err(MappingError::InvalidModel(format!(
            "{}: conditional writes are not allowed on counter tables",
            model.entity_type()
        )));
    }
    Ok(())
}

fn require_static_columns(model: &EntityModel, kind: TemplateKind) -> Result<()> {
    if !model.has_static_columns() {
        return Err(MappingError::InvalidModel(format!(
            "{}: {:?} requested but the entity has no static columns",
            model.entity_type(),
            kind
        )));
    }
    Ok(())
}

/// Builds statement text and placeholder order from an `EntityModel`.
///
/// Output is a pure function of the model and the requested form, so
/// regenerating a template yields byte-identical text.
#[derive(Debug, Clone, Default)]
pub struct StatementTemplateGenerator {
    keyspace: Option<String>,
}

impl StatementTemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders every table under `keyspace` instead of the model's own.
    pub fn with_keyspace(keyspace: Option<String>) -> Self {
        Self { keyspace }
    }

    pub fn table(&self, model: &EntityModel) -> String {
        let keyspace = self.keyspace.as_deref().or(model.keyspace());
        qualified_table(keyspace, model.table_name())
    }

    /// The static template of `kind` for `model`.
    pub fn generate(&self, model: &EntityModel, kind: TemplateKind) -> Result<CompiledStatement> {
        let (text, params) = match kind {
            TemplateKind::Insert | TemplateKind::InsertIfNotExists => {
                let columns: Vec<&ColumnSpec> = self.insertable(model)?.collect();
                let guard = if kind == TemplateKind::InsertIfNotExists {
                    Guard::IfNotExists
                } else {
                    Guard::None
                };
                self.insert_text(model, &columns, Shape::guarded(guard))?
            }
            TemplateKind::InsertStatic | TemplateKind::InsertStaticIfNotExists => {
                require_static_columns(model, kind)?;
                let columns: Vec<&ColumnSpec> = model
                    .partition_keys()
                    .chain(model.static_columns())
                    .collect();
                let guard = if kind == TemplateKind::InsertStaticIfNotExists {
                    Guard::IfNotExists
                } else {
                    Guard::None
                };
                self.insert_text(model, &columns, Shape::guarded(guard))?
            }
            TemplateKind::Update | TemplateKind::UpdateIfExists => {
                let columns: Vec<&ColumnSpec> = model
                    .static_columns()
                    .chain(model.regular_columns())
                    .collect();
                let guard = if kind == TemplateKind::UpdateIfExists {
                    Guard::IfExists
                } else {
                    Guard::None
                };
                self.update_text(model, &columns, false, Shape::guarded(guard))?
            }
            TemplateKind::UpdateStatic | TemplateKind::UpdateStaticIfExists => {
                require_static_columns(model, kind)?;
                let columns: Vec<&ColumnSpec> = model.static_columns().collect();
                let guard = if kind == TemplateKind::UpdateStaticIfExists {
                    Guard::IfExists
                } else {
                    Guard::None
                };
                self.update_text(model, &columns, true, Shape::guarded(guard))?
            }
            TemplateKind::CounterUpdate => self.counter_update_text(model, Shape::plain())?,
            TemplateKind::Delete => self.delete_text(model, false, Shape::plain())?,
            TemplateKind::DeleteIfExists => {
                self.delete_text(model, false, Shape::guarded(Guard::IfExists))?
            }
            TemplateKind::DeletePartition => self.delete_text(model, true, Shape::plain())?,
            TemplateKind::Select => self.select_text(model),
        };
        Ok(CompiledStatement::new(
            model.entity_type(),
            Some(kind),
            kind.operation(),
            text,
            params,
            kind.is_conditional(),
        ))
    }

    /// Every template kind `model` supports, skipping the ones it rejects.
    pub fn supported_kinds(&self, model: &EntityModel) -> Vec<TemplateKind> {
        TemplateKind::ALL
            .into_iter()
            .filter(|kind| self.generate(model, *kind).is_ok())
            .collect()
    }

    /// INSERT over an explicit column subset; keys are always included.
    pub fn insert_with(
        &self,
        model: &EntityModel,
        value_columns: &[&ColumnSpec],
        options: &WriteOptions,
    ) -> Result<CompiledStatement> {
        let shape = Shape::from_options(options)?;
        if matches!(shape.guard, Guard::IfExists | Guard::Conditions(_)) {
            return Err(MappingError::UnsupportedOperation(
                "INSERT only supports IF NOT EXISTS".to_string(),
            ));
        }
        self.insertable(model)?;
        let columns: Vec<&ColumnSpec> = model
            .primary_key()
            .chain(
                value_columns
                    .iter()
                    .copied()
                    .filter(|column| !column.role().is_key()),
            )
            .collect();
        let (text, params) = self.insert_text(model, &columns, shape)?;
        Ok(CompiledStatement::new(
            model.entity_type(),
            None,
            OperationKind::Insert,
            text,
            params,
            shape.guard.is_conditional(),
        ))
    }

    /// Full-field UPDATE with per-call options.
    pub fn update_with(
        &self,
        model: &EntityModel,
        static_only: bool,
        options: &WriteOptions,
    ) -> Result<CompiledStatement> {
        let shape = Shape::from_options(options)?;
        if let Guard::IfNotExists = shape.guard {
            return Err(MappingError::UnsupportedOperation(
                "UPDATE does not support IF NOT EXISTS".to_string(),
            ));
        }
        let columns: Vec<&ColumnSpec> = if static_only {
            require_static_columns(model, TemplateKind::UpdateStatic)?;
            model.static_columns().collect()
        } else {
            model
                .static_columns()
                .chain(model.regular_columns())
                .collect()
        };
        let (text, params) = self.update_text(model, &columns, static_only, shape)?;
        Ok(CompiledStatement::new(
            model.entity_type(),
            None,
            OperationKind::Update,
            text,
            params,
            shape.guard.is_conditional(),
        ))
    }

    pub fn delete_with(
        &self,
        model: &EntityModel,
        partition_only: bool,
        options: &WriteOptions,
    ) -> Result<CompiledStatement> {
        let shape = Shape::from_options(options)?;
        if let Guard::IfNotExists = shape.guard {
            return Err(MappingError::UnsupportedOperation(
                "DELETE does not support IF NOT EXISTS".to_string(),
            ));
        }
        let (text, params) = self.delete_text(model, partition_only, shape)?;
        Ok(CompiledStatement::new(
            model.entity_type(),
            None,
            OperationKind::Delete,
            text,
            params,
            shape.guard.is_conditional(),
        ))
    }

    fn insertable<'m>(
        &self,
        model: &'m EntityModel,
    ) -> Result<impl Iterator<Item = &'m ColumnSpec>> {
        if model.is_counter_entity() {
            return Err(MappingError::InvalidModel(format!(
                "{}: counter tables cannot be inserted, use a counter update",
                model.entity_type()
            )));
        }
        Ok(model
            .columns()
            .iter()
            .filter(|column| column.role() != ColumnRole::Counter))
    }

    fn insert_text(
        &self,
        model: &EntityModel,
        columns: &[&ColumnSpec],
        shape: Shape<'_>,
    ) -> Result<(String, Vec<BindParameter>)> {
        let mut params: Vec<BindParameter> = columns
            .iter()
            .map(|column| BindParameter::Column(column.id()))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let guard = guard_clause(model, shape.guard, &mut params)?;
        let using = using_clause(true, shape.timestamp, &mut params);
        let text = format!(
            "INSERT INTO {} ({}) VALUES ({}){}{}",
            self.table(model),
            column_list(columns.iter().copied()),
            placeholders,
            guard,
            using
        );
        Ok((text, params))
    }

    fn update_text(
        &self,
        model: &EntityModel,
        columns: &[&ColumnSpec],
        partition_only: bool,
        shape: Shape<'_>,
    ) -> Result<(String, Vec<BindParameter>)> {
        if model.is_counter_entity() {
            return Err(MappingError::InvalidModel(format!(
                "{}: counter tables only support counter updates",
                model.entity_type()
            )));
        }
        if columns.is_empty() {
            return Err(MappingError::InvalidModel(format!(
                "{}: no updatable columns",
                model.entity_type()
            )));
        }
        let mut params = Vec::new();
        let using = using_clause(true, shape.timestamp, &mut params);
        let assignments = columns
            .iter()
            .map(|column| {
                params.push(BindParameter::Column(column.id()));
                format!("{} = ?", quote_identifier(column.name()))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let keys = key_clause(model, partition_only, &mut params);
        let guard = guard_clause(model, shape.guard, &mut params)?;
        let text = format!(
            "UPDATE {}{} SET {} WHERE {}{}",
            self.table(model),
            using,
            assignments,
            keys,
            guard
        );
        Ok((text, params))
    }

    fn counter_update_text(
        &self,
        model: &EntityModel,
        shape: Shape<'_>,
    ) -> Result<(String, Vec<BindParameter>)> {
        if !model.is_counter_entity() {
            return Err(MappingError::InvalidModel(format!(
                "{}: counter update requested but the entity has no counter columns",
                model.entity_type()
            )));
        }
        reject_counter_guard(model, shape.guard)?;
        let mut params = Vec::new();
        let assignments = model
            .counter_columns()
            .map(|column| {
                params.push(BindParameter::Counter(column.id()));
                let name = quote_identifier(column.name());
                format!("{} = {} + ?", name, name)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let keys = key_clause(model, false, &mut params);
        let text = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table(model),
            assignments,
            keys
        );
        Ok((text, params))
    }

    fn delete_text(
        &self,
        model: &EntityModel,
        partition_only: bool,
        shape: Shape<'_>,
    ) -> Result<(String, Vec<BindParameter>)> {
        reject_counter_guard(model, shape.guard)?;
        let mut params = Vec::new();
        let using = using_clause(false, shape.timestamp, &mut params);
        let keys = key_clause(model, partition_only, &mut params);
        let guard = guard_clause(model, shape.guard, &mut params)?;
        let text = format!(
            "DELETE FROM {}{} WHERE {}{}",
            self.table(model),
            using,
            keys,
            guard
        );
        Ok((text, params))
    }

    fn select_text(&self, model: &EntityModel) -> (String, Vec<BindParameter>) {
        let mut params = Vec::new();
        let keys = key_clause(model, false, &mut params);
        let text = format!(
            "SELECT {} FROM {} WHERE {}",
            column_list(model.columns().iter()),
            self.table(model),
            keys
        );
        (text, params)
    }
}
