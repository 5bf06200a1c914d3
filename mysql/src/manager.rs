use chrono::Utc;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use common::config::ColumnStatistics;

use crate::common::{is_regular_file, MySqlConfig};
use crate::tools::{SystemResolver, ToolResolver};
use crate::wrapper::{MySqlClient, MySqlDump};
use crate::{MySqlError, Result};

/// A finished dump on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// High level backup and restore of one database
pub struct MySqlManager {
    config: MySqlConfig,
    resolver: Arc<dyn ToolResolver>,
    column_statistics: ColumnStatistics,
    cancel: CancellationToken,
}

impl MySqlManager {
    /// Create a new MySqlManager instance
    pub fn new(config: MySqlConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(SystemResolver::new()),
            column_statistics: ColumnStatistics::Auto,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_column_statistics(mut self, strategy: ColumnStatistics) -> Self {
        self.column_statistics = strategy;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    pub fn dumper(&self) -> MySqlDump {
        MySqlDump::new(self.config.clone())
            .with_resolver(self.resolver.clone())
            .with_column_statistics(self.column_statistics)
            .with_cancellation(self.cancel.clone())
    }

    pub fn client(&self) -> MySqlClient {
        MySqlClient::new(self.config.clone())
            .with_resolver(self.resolver.clone())
            .with_cancellation(self.cancel.clone())
    }

    /// `<backup_dir>/<database>_<YYYYmmdd_HHMMSS>.sql.gz`
    pub fn backup_file_name(&self, backup_dir: &Path) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        backup_dir.join(format!("{}_{}.sql.gz", self.config.database, timestamp))
    }

    /// Dumps into a new timestamped file inside `backup_dir`.
    pub async fn backup(&self, backup_dir: &Path) -> Result<DumpFile> {
        if !backup_dir.exists() {
            info!("Creating backup directory: {:?}", backup_dir);
            fs::create_dir_all(backup_dir).map_err(|source| MySqlError::FileAccess {
                path: backup_dir.to_path_buf(),
                source,
            })?;
        }

        let path = self.backup_file_name(backup_dir);
        self.dump_to(&path).await
    }

    pub async fn dump_to(&self, path: &Path) -> Result<DumpFile> {
        let size_bytes = self.dumper().dump_to_compressed_file(path).await?;
        Ok(DumpFile {
            path: path.to_path_buf(),
            size_bytes,
        })
    }

    /// Makes sure the database exists (dropping it first when `drop_first`),
    /// then loads `dump_file` into it.
    pub async fn restore(&self, dump_file: &Path, drop_first: bool) -> Result<()> {
        // Never drop a database for a dump that is not there.
        if !is_regular_file(dump_file) {
            return Err(MySqlError::Validation(format!(
                "File '{}' does not exist",
                dump_file.display()
            )));
        }

        let client = self.client();
        client.ensure_database(drop_first).await?;
        client.restore_from_compressed_file(dump_file).await
    }

    pub async fn supports_column_statistics(&self) -> bool {
        self.dumper().supports_column_statistics().await
    }
}
