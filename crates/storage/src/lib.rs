//! SQLite access for the Anhelados business database.
//!
//! The database file and its schema are owned outside this crate: nothing
//! here creates, migrates or validates tables. The crate offers two things:
//!
//! - [`Store::query`] runs one caller-supplied statement on a fresh
//!   connection and returns a tagged [`QueryOutcome`] (rows, empty, or
//!   failed). Errors never escape the call.
//! - [`Store::schema`] introspects the live file into a [`Schema`] whose
//!   `Display` output is meant to be embedded in a model prompt.
//!
//! # Example
//!
//! ```no_run
//! use storage::{QueryOptions, QueryOutcome, Store};
//!
//! let store = Store::new("./anhelados.db");
//! match store.query("SELECT Nombre, Precio FROM productos", QueryOptions::default()) {
//!     QueryOutcome::Rows { rows, .. } => println!("{} productos", rows.len()),
//!     QueryOutcome::Empty => println!("sin productos"),
//!     QueryOutcome::Failed { reason } => eprintln!("{reason}"),
//! }
//!
//! println!("{}", store.schema()?);
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod outcome;
mod schema;
mod store;

pub use error::{Error, Result};
pub use outcome::QueryOutcome;
pub use schema::{Column, Reference, Schema, Table};
pub use store::{QueryOptions, Store};
