pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Column, Row, Schema};
pub use value::{DataType, Value};
