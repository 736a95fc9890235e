//! Statement policy for the SQL tool.
//!
//! Core principle: **a statement runs only if its kind is allowed.**
//! Deny rules override allow rules.

mod error;
mod policy;
mod statement;

pub use error::{Error, Result};
pub use policy::{AllowRules, Decision, DenyRules, Limits, Policy};
pub use statement::StatementKind;
