//! LLM provider adapters.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its API.

mod openai;

pub use openai::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder,
};
