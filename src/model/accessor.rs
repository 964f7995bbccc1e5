use super::column::ColumnSpec;
use super::entity::EntityModel;
use crate::core::{MappingError, Result, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type FieldGetter<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;
pub type FieldSetter<E> = Arc<dyn Fn(&mut E, Value) -> Result<()> + Send + Sync>;

struct FieldFns<E> {
    getter: FieldGetter<E>,
    setter: FieldSetter<E>,
}

impl<E> Clone for FieldFns<E> {
    fn clone(&self) -> Self {
        Self {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

/// Getter/setter table for one entity type, keyed by column name.
///
/// Resolved against an `EntityModel` by `EntityMapping::new`, after which
/// lookups are by `ColumnId`.
pub struct FieldAccessor<E> {
    fields: HashMap<String, FieldFns<E>>,
}

impl<E> Default for FieldAccessor<E> {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }
}

impl<E> FieldAccessor<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<G, S>(mut self, column: impl Into<String>, getter: G, setter: S) -> Self
    where
        G: Fn(&E) -> Value + Send + Sync + 'static,
        S: Fn(&mut E, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.fields.insert(
            column.into(),
            FieldFns {
                getter: Arc::new(getter),
                setter: Arc::new(setter),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An `EntityModel` paired with the accessor table for its Rust type.
///
/// Built once per entity type at bootstrap and shared read-only.
pub struct EntityMapping<E> {
    model: Arc<EntityModel>,
    fields: Vec<FieldFns<E>>,
}

impl<E> Clone for EntityMapping<E> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<E> fmt::Debug for EntityMapping<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("entity_type", &self.model.entity_type())
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl<E> EntityMapping<E> {
    /// Every model column must have an accessor, and every accessor a column.
    pub fn new(model: Arc<EntityModel>, accessor: FieldAccessor<E>) -> Result<Self> {
        let mut by_name = accessor.fields;
        let mut fields = Vec::with_capacity(model.columns().len());
        for column in model.columns() {
            let fns = by_name.remove(column.name()).ok_or_else(|| {
                MappingError::InvalidModel(format!(
                    "{}: no field accessor for column '{}'",
                    model.entity_type(),
                    column.name()
                ))
            })?;
            fields.push(fns);
        }
        if let Some(extra) = by_name.keys().next() {
            return Err(MappingError::ColumnNotFound(
                extra.clone(),
                model.entity_type().to_string(),
            ));
        }
        Ok(Self { model, fields })
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn entity_type(&self) -> &str {
        self.model.entity_type()
    }

    /// Fails with `ColumnNotFound` when `column` is not one of this model's
    /// columns.
    pub fn get(&self, entity: &E, column: &ColumnSpec) -> Result<Value> {
        Ok((self.field(column)?.getter)(entity))
    }

    pub fn set(&self, entity: &mut E, column: &ColumnSpec, value: Value) -> Result<()> {
        (self.field(column)?.setter)(entity, value)
    }

    /// Every column of the model with its current field value, in column order.
    pub(crate) fn values<'a>(
        &'a self,
        entity: &'a E,
    ) -> impl Iterator<Item = (&'a ColumnSpec, Value)> + 'a {
        self.model
            .columns()
            .iter()
            .zip(&self.fields)
            .map(move |(column, fns)| (column, (fns.getter)(entity)))
    }

    fn field(&self, column: &ColumnSpec) -> Result<&FieldFns<E>> {
        let index = column.id().index();
        match (self.model.columns().get(index), self.fields.get(index)) {
            (Some(own), Some(fns)) if own.name() == column.name() => Ok(fns),
            _ => Err(MappingError::ColumnNotFound(
                column.name().to_string(),
                self.model.entity_type().to_string(),
            )),
        }
    }
}

/// Builds a `FieldAccessor` from struct fields.
///
/// Each field must implement `Clone`, `Into<Value>` and `FromValue`. A field
/// stored under a different column name is written `field as "column"`.
///
/// ```
/// use cqlmapper::field_accessors;
///
/// #[derive(Clone, Default)]
/// struct Post {
///     id: i64,
///     title: String,
///     tags: Vec<String>,
/// }
///
/// let accessor = field_accessors!(Post { id, title as "post_title", tags });
/// assert_eq!(accessor.len(), 3);
/// ```
#[macro_export]
macro_rules! field_accessors {
    ($entity:ty { $($field:ident $(as $column:literal)?),+ $(,)? }) => {{
        let accessor = $crate::model::FieldAccessor::<$entity>::new();
        $(
            let accessor = accessor.field(
                $crate::field_accessors!(@column $field $($column)?),
                |entity: &$entity| $crate::core::Value::from(entity.$field.clone()),
                |entity: &mut $entity, value: $crate::core::Value| {
                    entity.$field = $crate::core::FromValue::from_value(value)?;
                    Ok(())
                },
            );
        )+
        accessor
    }};
    (@column $field:ident $column:literal) => {
        $column
    };
    (@column $field:ident) => {
        stringify!($field)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;

    #[derive(Clone, Default)]
    struct Post {
        id: i64,
        title: String,
    }

    fn model() -> Arc<EntityModel> {
        Arc::new(
            EntityModel::builder("Post", "posts")
                .partition_key("id", DataType::BigInt)
                .column("title", DataType::Text)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn macro_builds_getters_and_setters() {
        let mapping = EntityMapping::new(model(), crate::field_accessors!(Post { id, title })).unwrap();
        let mut post = Post::default();
        let title = mapping.model().column_by_name("title").unwrap().clone();
        mapping.set(&mut post, &title, Value::from("hello")).unwrap();
        assert_eq!(post.title, "hello");
        assert_eq!(mapping.get(&post, &title).unwrap(), Value::from("hello"));
    }

    #[test]
    fn column_of_another_model_is_not_found() {
        let mapping = EntityMapping::new(model(), crate::field_accessors!(Post { id, title })).unwrap();
        let other = EntityModel::builder("Comment", "comments")
            .partition_key("id", DataType::BigInt)
            .column("title", DataType::Text)
            .column("body", DataType::Text)
            .build()
            .unwrap();
        let body = other.column_by_name("body").unwrap();
        let mut post = Post::default();
        assert!(matches!(
            mapping.get(&post, body),
            Err(MappingError::ColumnNotFound(_, _))
        ));
        assert!(matches!(
            mapping.set(&mut post, body, Value::from("x")),
            Err(MappingError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn missing_accessor_is_invalid_model() {
        let err = EntityMapping::new(model(), crate::field_accessors!(Post { id })).unwrap_err();
        assert!(matches!(err, MappingError::InvalidModel(_)));
    }

    #[test]
    fn accessor_for_unknown_column_is_rejected() {
        let accessor = crate::field_accessors!(Post { id, title })
            .field("ghost", |_: &Post| Value::Null, |_, _| Ok(()));
        let err = EntityMapping::new(model(), accessor).unwrap_err();
        assert!(matches!(err, MappingError::ColumnNotFound(_, _)));
    }
}
