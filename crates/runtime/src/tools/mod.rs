//! Tools exposed to the model: four arithmetic operations and a SQL
//! statement executor, behind the [`ToolHost`] boundary.

pub mod arithmetic;
pub mod errors;
mod host;
mod registry;
pub mod sql;

pub use arithmetic::{ArithmeticError, Operation};
pub use errors::ToolError;
pub use host::ToolHost;
pub use registry::{ToolKind, ToolRegistry};
pub use sql::SqlQueryTool;
