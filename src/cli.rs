//! Command-line interface for todo-api
//!
//! Flags (and their `TODO_API_*` environment variables) override values
//! loaded from the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::api;
use crate::config::Config;
use crate::error::Result;

/// todo-api - a todo list over HTTP
///
/// Serves CRUD operations on an ordered task list persisted to a JSON file.
#[derive(Parser, Debug, Default)]
#[command(name = "todo-api")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./todo-api.toml when present)
    #[arg(long, env = "TODO_API_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to listen on
    #[arg(short = 'H', long, env = "TODO_API_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TODO_API_PORT")]
    pub port: Option<u16>,

    /// List file to serve
    #[arg(short, long, env = "TODO_API_FILE")]
    pub file: Option<PathBuf>,

    /// Max wait for the list lock in milliseconds (0 waits forever)
    #[arg(long, env = "TODO_API_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: Option<u64>,

    /// Skip the advisory lock on <file>.lock
    #[arg(long)]
    pub no_file_lock: bool,
}

impl Cli {
    /// Resolve the effective configuration
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::discover(self.config.as_deref())?;

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(file) = &self.file {
            config.store.file = file.clone();
        }
        if let Some(timeout) = self.lock_timeout_ms {
            config.store.lock_timeout_ms = timeout;
        }
        if self.no_file_lock {
            config.store.file_lock = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Start the server and block until it shuts down
    pub fn run(self) -> Result<()> {
        let config = self.config()?;
        tracing::debug!(?config, "resolved configuration");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(api::serve(&config))
    }
}
