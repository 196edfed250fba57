//! todo-api - file-backed todo list over HTTP
//!
//! A small HTTP service exposing CRUD operations on an ordered list of task
//! items persisted to a single JSON file.
//!
//! # Core Concepts
//!
//! - **Task list**: transient, per-request working copy of the list file
//! - **Positional IDs**: items are addressed by `index + 1`; deleting an item
//!   renumbers everything after it
//! - **List guard**: one process-wide lock serializing every
//!   load → mutate → save cycle against the file
//!
//! # Module Organization
//!
//! - `api`: axum router, response envelope, error replies, server loop
//! - `cli`: command-line interface using clap
//! - `config`: configuration loading from `todo-api.toml`
//! - `error`: error types, HTTP status and exit code mapping
//! - `lock`: list guard, file locking and atomic writes
//! - `router`: path/method resolution, ID validation, dispatch
//! - `task`: task item and list model with load/save

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod router;
pub mod task;

pub use error::{Error, Result};
