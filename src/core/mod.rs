pub mod error;
pub mod types;
pub mod value;

pub use error::{BoxError, OrmError, Result};
pub use types::{ColumnMeta, Row};
pub use value::{Value, ValueType};
