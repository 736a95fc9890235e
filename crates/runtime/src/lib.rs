//! Anhelados runtime: the tool-calling chat loop behind Chispitas.
//!
//! The runtime is organized around these concepts:
//!
//! - **Backend**: a trait abstracting LLM providers; [`OpenAiBackend`] talks
//!   to any OpenAI-compatible Chat Completions endpoint.
//! - **ToolHost**: the boundary between the model loop and side effects.
//!   [`ToolRegistry::standard`] exposes `Multiply`, `Add`, `Subtract`,
//!   `Divide` and `SQLQuery`.
//! - **Session**: one conversation. Runs tool rounds until the model answers
//!   and keeps the user-visible [`ConversationHistory`].
//!
//! # Example
//!
//! ```ignore
//! use policy::Policy;
//! use runtime::{OpenAiBackend, Session, SqlQueryTool, ToolRegistry, system_prompt};
//! use storage::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new("./anhelados.db");
//! let schema = store.schema()?;
//! let backend = OpenAiBackend::builder("sk-...", "gpt-3.5-turbo")
//!     .system(system_prompt(&schema))
//!     .build()?;
//! let tools = ToolRegistry::standard(SqlQueryTool::new(store, Policy::permissive()))?;
//!
//! let mut session = Session::new(backend, tools);
//! let reply = session.chat("¿Cuál es el producto más caro?").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

mod error;
pub mod history;
pub mod model;
mod prompt;
pub mod providers;
mod session;
pub mod tools;

pub use error::{Error, Result};
pub use history::{ConversationHistory, Speaker, Turn};
pub use model::{Backend, Message, ModelError, ModelRequest, ModelResponse, ToolCall, ToolSpec};
pub use prompt::{BUSINESS_PROMPT, system_prompt};
pub use providers::{OpenAiBackend, OpenAiBackendBuilder};
pub use session::{DEFAULT_MAX_ITERATIONS, Session, SessionId};
pub use tools::{SqlQueryTool, ToolError, ToolHost, ToolRegistry};
