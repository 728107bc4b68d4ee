pub mod error;
pub mod types;
pub mod value;

pub use error::{CascadeError, Result};
pub use types::{EntityId, EntityKey, Row, namespace_of};
pub use value::{DataType, Value};
