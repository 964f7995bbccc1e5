//! Entity metadata handed to the engine at bootstrap.

pub mod accessor;
pub mod codec;
pub mod column;
pub mod entity;
pub mod naming;

pub use accessor::{EntityMapping, FieldAccessor, FieldGetter, FieldSetter};
pub use codec::{CheckedCodec, JsonCodec, MsgPackCodec, ValueCodec, default_codec};
pub use column::{ColumnDef, ColumnId, ColumnRole, ColumnSpec, MultiValueKind};
pub use entity::{EntityModel, EntityModelBuilder};
pub use naming::{qualified_table, quote_identifier};
