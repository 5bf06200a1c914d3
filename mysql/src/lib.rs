pub mod cli;
pub mod common;
pub mod diagnostics;
pub mod manager;
pub mod process;
pub mod tools;
pub mod wrapper;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MySqlError {
    #[error("Tool not found: {tool}: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("Cannot access {path:?}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Stream {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid gzip archive: {path:?}: {source}")]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Diagnostic output of a tool that is not a known harmless warning
    #[error("{0}")]
    Diagnostic(String),

    #[error("{tool} failed: {message}")]
    Process { tool: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} was cancelled")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, MySqlError>;

// Re-export key types for convenience
pub use crate::common::MySqlConfig;
pub use crate::manager::{DumpFile, MySqlManager};
pub use crate::tools::{SystemResolver, ToolResolver};
pub use crate::wrapper::{MySqlClient, MySqlDump};
