pub mod error;
pub mod literal;
pub mod path;
pub mod table;
pub mod value;

pub use error::BridgeError;
pub use path::PathExpression;
pub use table::Table;
pub use value::*;
