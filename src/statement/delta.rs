//! UPDATE synthesis from a `DeltaTracker`.
//!
//! Each recorded op becomes one clause in the store's partial-update syntax.
//! `RemoveListElementAtIndex` has no SET form, so it becomes its own
//! `DELETE col[i]` statement, and the surrounding clauses are split into
//! separate UPDATE segments to keep the recorded order across statements.
//! Each statement lists the tracker entries it writes, so a flush that
//! fails part way can drop the ones already applied.

use super::compiled::CompiledStatement;
use super::generator::{
    Guard, Shape, StatementTemplateGenerator, guard_clause, key_clause, reject_counter_guard,
    using_clause,
};
use super::kind::{BindParameter, OperationKind};
use super::options::WriteOptions;
use crate::core::{MappingError, Result};
use crate::delta::{CollectionOp, DeltaEntry, DeltaTracker};
use crate::model::{ColumnId, ColumnRole, ColumnSpec, EntityModel, MultiValueKind, quote_identifier};

/// A single SET clause with the placeholders it introduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub column: ColumnId,
    pub text: String,
    pub parameters: Vec<BindParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Set(Clause, DeltaEntry),
    DeleteAt(ColumnId, usize, DeltaEntry),
}

/// Renders the clause for the `op_index`-th op on `column`, or `None` for
/// ops that need their own DELETE statement.
pub fn render_op(column: &ColumnSpec, op_index: usize, op: &CollectionOp) -> Option<Clause> {
    let name = quote_identifier(column.name());
    let delta = BindParameter::Delta {
        column: column.id(),
        op: op_index,
    };
    let (text, parameters) = match op {
        CollectionOp::AppendListElements(_)
        | CollectionOp::AddElements(_)
        | CollectionOp::PutMapEntries(_) => (format!("{} = {} + ?", name, name), vec![delta]),
        CollectionOp::PrependListElements(_) => (format!("{} = ? + {}", name, name), vec![delta]),
        CollectionOp::RemoveElements(_) | CollectionOp::RemoveMapKey(_) => {
            (format!("{} = {} - ?", name, name), vec![delta])
        }
        CollectionOp::SetListElementAtIndex(index, _) => {
            (format!("{}[{}] = ?", name, index), vec![delta])
        }
        CollectionOp::ClearAll => (format!("{} = null", name), Vec::new()),
        CollectionOp::RemoveListElementAtIndex(_) => return None,
    };
    Some(Clause {
        column: column.id(),
        text,
        parameters,
    })
}

impl StatementTemplateGenerator {
    /// UPDATE (and `DELETE col[i]`) statements for everything `tracker` holds
    /// plus plain assignments for `scalars`.
    ///
    /// Scalars come first, then collection ops column by column in model
    /// order, each column's ops in recorded order. Counter deltas render as
    /// `c = c + ?`. Returns no statements when there is nothing to write.
    pub fn delta_update(
        &self,
        model: &EntityModel,
        tracker: &DeltaTracker,
        scalars: &[ColumnId],
        options: &WriteOptions,
    ) -> Result<Vec<CompiledStatement>> {
        let shape = Shape::from_options(options)?;
        if let Guard::IfNotExists = shape.guard {
            return Err(MappingError::UnsupportedOperation(
                "UPDATE does not support IF NOT EXISTS".to_string(),
            ));
        }
        reject_counter_guard(model, shape.guard)?;

        let mut steps = Vec::new();
        for column in model.columns() {
            if scalars.contains(&column.id()) || tracker.is_assigned(column) {
                match column.role() {
                    role if role.is_key() => {
                        return Err(MappingError::UnsupportedOperation(format!(
                            "primary key column '{}' cannot be updated",
                            column.name()
                        )));
                    }
                    ColumnRole::Counter => {
                        return Err(MappingError::InvalidModel(format!(
                            "counter column '{}' only takes increments",
                            column.name()
                        )));
                    }
                    _ => {}
                }
                let name = quote_identifier(column.name());
                steps.push(Step::Set(
                    Clause {
                        column: column.id(),
                        text: format!("{} = ?", name),
                        parameters: vec![BindParameter::Column(column.id())],
                    },
                    DeltaEntry::Assigned(column.id()),
                ));
            }
        }
        for column in model.columns() {
            for (index, op) in tracker.ops_for(column).iter().enumerate() {
                check_op(column, op)?;
                let entry = DeltaEntry::Op {
                    column: column.id(),
                    index,
                };
                match render_op(column, index, op) {
                    Some(clause) => steps.push(Step::Set(clause, entry)),
                    None => {
                        if let CollectionOp::RemoveListElementAtIndex(at) = op {
                            steps.push(Step::DeleteAt(column.id(), *at, entry));
                        }
                    }
                }
            }
        }
        for (id, _) in tracker.counter_deltas() {
            let column = model.try_column(id)?;
            if column.role() != ColumnRole::Counter {
                return Err(MappingError::InvalidModel(format!(
                    "column '{}' is not a counter",
                    column.name()
                )));
            }
            let name = quote_identifier(column.name());
            steps.push(Step::Set(
                Clause {
                    column: id,
                    text: format!("{} = {} + ?", name, name),
                    parameters: vec![BindParameter::Counter(id)],
                },
                DeltaEntry::Counter(id),
            ));
        }

        let mut statements = Vec::new();
        let mut pending: Vec<Clause> = Vec::new();
        let mut written: Vec<DeltaEntry> = Vec::new();
        for step in steps {
            match step {
                Step::Set(clause, entry) => {
                    pending.push(clause);
                    written.push(entry);
                }
                Step::DeleteAt(column, index, entry) => {
                    if !pending.is_empty() {
                        let segment = self.update_segment(model, &pending, shape)?;
                        statements.push(segment.with_writes(std::mem::take(&mut written)));
                        pending.clear();
                    }
                    let delete = self.delete_element(model, column, index, shape)?;
                    statements.push(delete.with_writes(vec![entry]));
                }
            }
        }
        if !pending.is_empty() {
            let segment = self.update_segment(model, &pending, shape)?;
            statements.push(segment.with_writes(written));
        }
        // Once the first statement applies, a condition on a column it wrote
        // no longer holds for the next one.
        if shape.guard.is_conditional() && statements.len() > 1 {
            return Err(MappingError::UnsupportedOperation(format!(
                "{}: a conditional write must fit in one statement, this one needs {}",
                model.entity_type(),
                statements.len()
            )));
        }
        Ok(statements)
    }

    fn update_segment(
        &self,
        model: &EntityModel,
        clauses: &[Clause],
        shape: Shape<'_>,
    ) -> Result<CompiledStatement> {
        let mut params = Vec::new();
        let counter = model.is_counter_entity();
        let using = if counter {
            String::new()
        } else {
            using_clause(true, shape.timestamp, &mut params)
        };
        let assignments = clauses
            .iter()
            .map(|clause| {
                params.extend(clause.parameters.iter().copied());
                clause.text.as_str()
            })
            .collect::<Vec<_>>()
            .join(", ");
        let partition_only = touches_only_statics(model, clauses.iter().map(|c| c.column));
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
        Ok(CompiledStatement::new(
            model.entity_type(),
            None,
            OperationKind::Update,
            text,
            params,
            shape.guard.is_conditional(),
        ))
    }

    fn delete_element(
        &self,
        model: &EntityModel,
        column: ColumnId,
        index: usize,
        shape: Shape<'_>,
    ) -> Result<CompiledStatement> {
        let mut params = Vec::new();
        let using = using_clause(false, shape.timestamp, &mut params);
        let partition_only = touches_only_statics(model, std::iter::once(column));
        let keys = key_clause(model, partition_only, &mut params);
        let guard = guard_clause(model, shape.guard, &mut params)?;
        let text = format!(
            "DELETE {}[{}] FROM {}{} WHERE {}{}",
            quote_identifier(model.column(column).name()),
            index,
            self.table(model),
            using,
            keys,
            guard
        );
        Ok(CompiledStatement::new(
            model.entity_type(),
            None,
            OperationKind::Delete,
            text,
            params,
            shape.guard.is_conditional(),
        ))
    }
}

fn check_op(column: &ColumnSpec, op: &CollectionOp) -> Result<()> {
    let kind = column.kind();
    let fits = match op {
        CollectionOp::ClearAll => kind != MultiValueKind::Scalar,
        CollectionOp::AddElements(_) => kind == MultiValueKind::Set,
        CollectionOp::RemoveElements(_) => {
            matches!(kind, MultiValueKind::List | MultiValueKind::Set)
        }
        CollectionOp::AppendListElements(_)
        | CollectionOp::PrependListElements(_)
        | CollectionOp::SetListElementAtIndex(_, _)
        | CollectionOp::RemoveListElementAtIndex(_) => kind == MultiValueKind::List,
        CollectionOp::PutMapEntries(_) | CollectionOp::RemoveMapKey(_) => {
            kind == MultiValueKind::Map
        }
    };
    if fits {
        Ok(())
    } else {
        Err(MappingError::TypeMismatch(format!(
            "{} does not apply to column '{}' of type {}",
            op.name(),
            column.name(),
            column.data_type()
        )))
    }
}

// Static columns live at partition level, so a write touching nothing else
// is keyed by the partition key alone.
fn touches_only_statics(model: &EntityModel, columns: impl Iterator<Item = ColumnId>) -> bool {
    let mut any = false;
    for id in columns {
        if model.column(id).role() != ColumnRole::Static {
            return false;
        }
        any = true;
    }
    any && model.has_clustering_columns()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};

    fn events() -> EntityModel {
        EntityModel::builder("Event", "events")
            .partition_key("id", DataType::BigInt)
            .clustering_column("ts", DataType::BigInt)
            .static_column("owner", DataType::Text)
            .column("tags", DataType::list(DataType::Text))
            .column("labels", DataType::set(DataType::Text))
            .column("attrs", DataType::map(DataType::Text, DataType::Text))
            .column("title", DataType::Text)
            .build()
            .unwrap()
    }

    fn column<'m>(model: &'m EntityModel, name: &str) -> &'m ColumnSpec {
        model.column_by_name(name).unwrap()
    }

    #[test]
    fn append_renders_one_list_parameter() {
        let model = events();
        let tags = column(&model, "tags");
        let mut tracker = DeltaTracker::new();
        tracker.append_list(tags, [Value::from("a"), Value::from("b")]);

        let statements = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &WriteOptions::new())
            .unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].text(),
            "UPDATE events USING TTL ? SET tags = tags + ? WHERE id = ? AND ts = ?"
        );
        assert_eq!(
            statements[0].parameters(),
            &[
                BindParameter::Ttl,
                BindParameter::Delta {
                    column: tags.id(),
                    op: 0
                },
                BindParameter::Column(ColumnId(0)),
                BindParameter::Column(ColumnId(1)),
            ]
        );
    }

    #[test]
    fn every_op_kind_has_its_clause() {
        let model = events();
        let tags = column(&model, "tags");
        let labels = column(&model, "labels");
        let attrs = column(&model, "attrs");
        let mut tracker = DeltaTracker::new();
        tracker.prepend_list(tags, [Value::from("p")]);
        tracker.set_at(tags, 2, Value::from("s"));
        tracker.add_elements(labels, [Value::from("x")]);
        tracker.remove_elements(labels, [Value::from("y")]);
        tracker.clear(attrs);
        tracker.put_entries(attrs, [(Value::from("k"), Value::from("v"))]);
        tracker.remove_key(attrs, Value::from("z"));

        let statements = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &WriteOptions::new())
            .unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].text(),
            "UPDATE events USING TTL ? SET tags = ? + tags, tags[2] = ?, labels = labels + ?, \
             labels = labels - ?, attrs = null, attrs = attrs + ?, attrs = attrs - ? \
             WHERE id = ? AND ts = ?"
        );
    }

    #[test]
    fn remove_at_splits_segments_in_order() {
        let model = events();
        let tags = column(&model, "tags");
        let mut tracker = DeltaTracker::new();
        tracker.append_list(tags, [Value::from("a")]);
        tracker.remove_at(tags, 0);
        tracker.append_list(tags, [Value::from("b")]);

        let statements = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &WriteOptions::new())
            .unwrap();
        let texts: Vec<&str> = statements.iter().map(|s| s.text()).collect();
        assert_eq!(
            texts,
            vec![
                "UPDATE events USING TTL ? SET tags = tags + ? WHERE id = ? AND ts = ?",
                "DELETE tags[0] FROM events WHERE id = ? AND ts = ?",
                "UPDATE events USING TTL ? SET tags = tags + ? WHERE id = ? AND ts = ?",
            ]
        );
        assert_eq!(
            statements[2].parameters()[1],
            BindParameter::Delta {
                column: tags.id(),
                op: 2
            }
        );
        assert_eq!(
            statements[1].writes(),
            &[DeltaEntry::Op {
                column: tags.id(),
                index: 1
            }]
        );
        assert_eq!(
            statements[2].writes(),
            &[DeltaEntry::Op {
                column: tags.id(),
                index: 2
            }]
        );
    }

    #[test]
    fn scalars_come_first_and_static_only_writes_drop_clustering() {
        let model = events();
        let owner = column(&model, "owner");
        let title = column(&model, "title");
        let generator = StatementTemplateGenerator::new();

        let statements = generator
            .delta_update(&model, &DeltaTracker::new(), &[owner.id()], &WriteOptions::new())
            .unwrap();
        assert_eq!(
            statements[0].text(),
            "UPDATE events USING TTL ? SET owner = ? WHERE id = ?"
        );

        let mut tracker = DeltaTracker::new();
        tracker.assign(title);
        let statements = generator
            .delta_update(&model, &tracker, &[owner.id()], &WriteOptions::new())
            .unwrap();
        assert_eq!(
            statements[0].text(),
            "UPDATE events USING TTL ? SET owner = ?, title = ? WHERE id = ? AND ts = ?"
        );
    }

    #[test]
    fn nothing_to_write_yields_no_statements() {
        let statements = StatementTemplateGenerator::new()
            .delta_update(&events(), &DeltaTracker::new(), &[], &WriteOptions::new())
            .unwrap();
        assert!(statements.is_empty());
    }

    #[test]
    fn counter_deltas_render_without_ttl() {
        let model = EntityModel::builder("PageViews", "page_views")
            .partition_key("page", DataType::Text)
            .counter("hits")
            .counter("bounces")
            .build()
            .unwrap();
        let mut tracker = DeltaTracker::new();
        tracker.increment(column(&model, "bounces"), 2);
        tracker.increment(column(&model, "hits"), 1);
        let generator = StatementTemplateGenerator::new();

        let statements = generator
            .delta_update(&model, &tracker, &[], &WriteOptions::new())
            .unwrap();
        assert_eq!(
            statements[0].text(),
            "UPDATE page_views SET hits = hits + ?, bounces = bounces + ? WHERE page = ?"
        );
        let err = generator
            .delta_update(&model, &tracker, &[], &WriteOptions::new().if_exists())
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
    }

    #[test]
    fn guarded_delta_must_fit_one_statement() {
        let model = events();
        let tags = column(&model, "tags");
        let title = column(&model, "title");
        let mut tracker = DeltaTracker::new();
        tracker.assign(title);
        tracker.remove_at(tags, 0);
        let options = WriteOptions::new().with_condition("title", Value::from("old"));
        let err = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &options)
            .unwrap_err();
        assert!(matches!(err, MappingError::UnsupportedOperation(_)));
    }

    #[test]
    fn ops_must_match_the_column_kind() {
        let model = events();
        let generator = StatementTemplateGenerator::new();
        let cases: Vec<(&str, CollectionOp)> = vec![
            ("labels", CollectionOp::AppendListElements(vec![Value::from("a")])),
            ("tags", CollectionOp::AddElements([Value::from("a")].into_iter().collect())),
            ("attrs", CollectionOp::RemoveListElementAtIndex(0)),
            ("tags", CollectionOp::RemoveMapKey(Value::from("k"))),
            ("title", CollectionOp::ClearAll),
        ];
        for (name, op) in cases {
            let mut tracker = DeltaTracker::new();
            tracker.record(column(&model, name), op);
            let err = generator
                .delta_update(&model, &tracker, &[], &WriteOptions::new())
                .unwrap_err();
            assert!(matches!(err, MappingError::TypeMismatch(_)), "{}", name);
        }
    }

    #[test]
    fn counters_and_plain_columns_keep_their_roles() {
        let generator = StatementTemplateGenerator::new();
        let model = events();
        let mut tracker = DeltaTracker::new();
        tracker.increment(column(&model, "title"), 1);
        let err = generator
            .delta_update(&model, &tracker, &[], &WriteOptions::new())
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));

        let views = EntityModel::builder("PageViews", "page_views")
            .partition_key("page", DataType::Text)
            .counter("hits")
            .build()
            .unwrap();
        let mut tracker = DeltaTracker::new();
        tracker.assign(column(&views, "hits"));
        let err = generator
            .delta_update(&views, &tracker, &[], &WriteOptions::new())
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
    }

    #[test]
    fn single_guarded_statement_carries_the_guard() {
        let model = events();
        let tags = column(&model, "tags");
        let mut tracker = DeltaTracker::new();
        tracker.remove_at(tags, 1);
        let statements = StatementTemplateGenerator::new()
            .delta_update(&model, &tracker, &[], &WriteOptions::new().if_exists())
            .unwrap();
        assert_eq!(
            statements[0].text(),
            "DELETE tags[1] FROM events WHERE id = ? AND ts = ? IF EXISTS"
        );
        assert!(statements[0].is_conditional());
    }
}
