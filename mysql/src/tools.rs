use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

use common::config::ToolsConfig;

use crate::{MySqlError, Result};

pub const MYSQLDUMP: &str = "mysqldump";
pub const MYSQL: &str = "mysql";

/// Turns a logical tool name into the executable to run
pub trait ToolResolver: Send + Sync {
    fn resolve(&self, tool: &str) -> Result<PathBuf>;
}

/// Looks tools up on `PATH`, unless an explicit path was configured for them
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    overrides: HashMap<String, PathBuf>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty configured paths fall back to the `PATH` lookup.
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let mut resolver = Self::new();
        let configured = [(MYSQLDUMP, &tools.mysqldump), (MYSQL, &tools.mysql)];
        for (tool, path) in configured {
            if let Some(path) = path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
                resolver = resolver.with_override(tool, path.clone());
            }
        }
        resolver
    }

    pub fn with_override(mut self, tool: &str, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(tool.to_string(), path.into());
        self
    }
}

impl ToolResolver for SystemResolver {
    fn resolve(&self, tool: &str) -> Result<PathBuf> {
        // `which` also validates explicit paths: they must exist and be executable.
        let lookup = match self.overrides.get(tool) {
            Some(path) => which::which(path),
            None => which::which(tool),
        };

        let path = lookup.map_err(|source| MySqlError::ToolNotFound {
            tool: tool.to_string(),
            source,
        })?;
        debug!("Resolved {tool} to {}", path.display());
        Ok(path)
    }
}
