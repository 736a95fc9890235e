//! Wiring shared by every subcommand.

use std::sync::Arc;

use runtime::{Backend, OpenAiBackend, Session, SqlQueryTool, ToolRegistry, system_prompt};
use storage::{Schema, Store};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;

pub type Tools = Arc<ToolRegistry>;

pub struct App {
    pub config: Config,
    pub store: Store,
    pub tools: Tools,
}

impl App {
    /// Does not touch the database; commands that need it open it lazily.
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::new(config.database.path.clone());
        let sql = SqlQueryTool::new(store.clone(), config.policy.clone());
        Ok(Self {
            tools: Arc::new(ToolRegistry::standard(sql)?),
            store,
            config,
        })
    }

    /// Introspect the live database; fails when the file is missing.
    pub fn schema(&self) -> Result<Schema> {
        let schema = self.store.schema()?;
        debug!(tables = schema.tables.len(), "schema loaded");
        Ok(schema)
    }

    /// Build the provider with the system prompt generated from the schema.
    pub fn backend(&self) -> Result<OpenAiBackend> {
        let schema = self.schema()?;
        let backend = &self.config.backend;
        let client = OpenAiBackend::builder(self.config.api_key()?, &backend.model)
            .base_url(&backend.base_url)
            .max_tokens(backend.max_tokens)
            .timeout(backend.timeout())
            .system(system_prompt(&schema))
            .build()?;
        info!(%client, "backend ready");
        Ok(client)
    }

    pub fn session<B: Backend>(&self, backend: B) -> Session<B, Tools> {
        Session::new(backend, Arc::clone(&self.tools))
            .with_max_iterations(self.config.agent.max_iterations)
    }
}
