use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::{MySqlError, Result};

/// Connection parameters for a single MySQL database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl MySqlConfig {
    /// Builds a config, rejecting an empty database name. An empty password
    /// is stored as no password at all.
    pub fn new(
        host: impl Into<String>,
        port: Option<u16>,
        user: impl Into<String>,
        password: Option<String>,
        database: impl Into<String>,
    ) -> Result<Self> {
        let database = database.into();
        if database.trim().is_empty() {
            return Err(MySqlError::Validation(
                "Database name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.filter(|p| !p.is_empty()),
            database,
        })
    }

    /// Connection flags in the order the MySQL clients expect them:
    /// port (if set), host, user, password (if set).
    ///
    /// The password goes out as a single `-p<password>` token; older clients
    /// read a separate token after `-p` as the database name.
    pub fn connection_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(7);

        if let Some(port) = self.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }

        args.push("-h".to_string());
        args.push(self.host.clone());
        args.push("-u".to_string());
        args.push(self.user.clone());

        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            args.push(format!("-p{password}"));
        }

        args
    }
}

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Renders an argument vector for logs with any `-p<password>` token masked.
pub fn display_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.starts_with("-p") && arg.len() > 2 {
                "-p****"
            } else {
                arg.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_regular_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

pub fn file_size(path: &Path) -> io::Result<u64> {
    Ok(path.metadata()?.len())
}

/// Format a byte count into a human-readable string (e.g. "45.2 MB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}
