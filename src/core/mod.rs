pub mod error;
pub mod types;
pub mod value;

pub use error::{MappingError, Result};
pub use types::{DataType, Row, WireValue};
pub use value::{FromValue, Value};
