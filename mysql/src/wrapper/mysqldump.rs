use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;

use common::config::ColumnStatistics;

use crate::common::{file_size, format_bytes, MySqlConfig};
use crate::diagnostics::{self, DUMP_BENIGN};
use crate::process::{self, Pipes};
use crate::tools::{SystemResolver, ToolResolver, MYSQLDUMP};
use crate::{MySqlError, Result};

/// Flag MySQL 8 clients need against pre-8 servers; unknown to older clients.
pub const COLUMN_STATISTICS_FLAG: &str = "--column-statistics=0";

const DUMP_FLAGS: [&str; 9] = [
    "--skip-opt",
    "--add-drop-table",
    "--extended-insert",
    "--create-options",
    "--quick",
    "--set-charset",
    "--default-character-set=utf8",
    "--compress",
    "--no-tablespaces",
];

/// Decides whether the installed `mysqldump` accepts [`COLUMN_STATISTICS_FLAG`].
#[async_trait]
pub trait ColumnStatisticsProbe: Send + Sync {
    async fn supports_column_statistics(&self) -> bool;
}

/// Asks the tool itself with a schema-only run that carries the flag.
pub struct TrialRunProbe {
    config: MySqlConfig,
    resolver: Arc<dyn ToolResolver>,
}

impl TrialRunProbe {
    pub fn new(config: MySqlConfig, resolver: Arc<dyn ToolResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn probe_args(config: &MySqlConfig) -> Vec<String> {
        let mut args = vec!["--no-data".to_string(), COLUMN_STATISTICS_FLAG.to_string()];
        args.extend(config.connection_args());
        args.push(config.database.clone());
        args
    }
}

#[async_trait]
impl ColumnStatisticsProbe for TrialRunProbe {
    async fn supports_column_statistics(&self) -> bool {
        let program = match self.resolver.resolve(MYSQLDUMP) {
            Ok(program) => program,
            Err(e) => {
                debug!("Column statistics probe skipped: {e}");
                return false;
            }
        };

        let args = Self::probe_args(&self.config);
        let pipes = Pipes::new(Stdio::null(), Stdio::null(), Stdio::null());
        let mut child = match process::spawn(&program, MYSQLDUMP, &args, pipes) {
            Ok(child) => child,
            Err(e) => {
                debug!("Column statistics probe failed to start: {e}");
                return false;
            }
        };

        let supported = matches!(child.wait().await, Ok(status) if status.success());
        debug!("{MYSQLDUMP} supports {COLUMN_STATISTICS_FLAG}: {supported}");
        supported
    }
}

/// Answer fixed up front, e.g. from configuration
pub struct FixedProbe(pub bool);

#[async_trait]
impl ColumnStatisticsProbe for FixedProbe {
    async fn supports_column_statistics(&self) -> bool {
        self.0
    }
}

/// Builds the full `mysqldump` argument vector.
pub fn dump_args(config: &MySqlConfig, column_statistics: bool) -> Vec<String> {
    let mut args: Vec<String> = DUMP_FLAGS.iter().map(|f| f.to_string()).collect();

    if column_statistics {
        args.push(COLUMN_STATISTICS_FLAG.to_string());
    }

    args.extend(config.connection_args());
    args.push(config.database.clone());
    args
}

/// Wrapper for the `mysqldump` command streaming into a gzip file
pub struct MySqlDump {
    config: MySqlConfig,
    resolver: Arc<dyn ToolResolver>,
    probe: Option<Arc<dyn ColumnStatisticsProbe>>,
    cancel: CancellationToken,
}

impl MySqlDump {
    /// Create a new MySqlDump instance
    pub fn new(config: MySqlConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(SystemResolver::new()),
            probe: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the default trial run probe.
    pub fn with_probe(mut self, probe: Arc<dyn ColumnStatisticsProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_column_statistics(self, strategy: ColumnStatistics) -> Self {
        match strategy {
            ColumnStatistics::Auto => self,
            ColumnStatistics::On => self.with_probe(Arc::new(FixedProbe(true))),
            ColumnStatistics::Off => self.with_probe(Arc::new(FixedProbe(false))),
        }
    }

    /// Cancelling `token` kills a running dump.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn supports_column_statistics(&self) -> bool {
        match &self.probe {
            Some(probe) => probe.supports_column_statistics().await,
            None => {
                TrialRunProbe::new(self.config.clone(), self.resolver.clone())
                    .supports_column_statistics()
                    .await
            }
        }
    }

    /// `mysqldump --version` of the resolved tool
    pub async fn version(&self) -> Result<String> {
        let program = self.resolver.resolve(MYSQLDUMP)?;
        process::version(&program, MYSQLDUMP).await
    }

    /// Dumps the database into a gzip file at `destination` and returns the
    /// size of the written file.
    ///
    /// On error the file is left in place for inspection. Its content must
    /// not be trusted.
    pub async fn dump_to_compressed_file<P: AsRef<Path>>(&self, destination: P) -> Result<u64> {
        let destination = destination.as_ref();
        let program = self.resolver.resolve(MYSQLDUMP)?;
        let args = dump_args(&self.config, self.supports_column_statistics().await);

        info!("Dumping database to '{}'", destination.display());

        let file = File::create(destination).map_err(|source| MySqlError::FileAccess {
            path: destination.to_path_buf(),
            source,
        })?;
        let encoder = GzEncoder::new(file, Compression::default());

        let pipes = Pipes::new(Stdio::null(), Stdio::piped(), Stdio::piped());
        let mut child = process::spawn(&program, MYSQLDUMP, &args, pipes)?;
        let stderr = process::capture(child.stderr.take());
        let stdout = child.stdout.take().ok_or_else(|| MySqlError::Stream {
            context: "Error dumping database".to_string(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not captured"),
        })?;

        // The pipe exists only once the child is running, so the copy starts here.
        let mut source = SyncIoBridge::new(stdout);
        let mut copy = tokio::task::spawn_blocking(move || {
            let mut encoder = encoder;
            io::copy(&mut source, &mut encoder).map(|written| (written, encoder))
        });

        let copied = tokio::select! {
            joined = &mut copy => joined.map_err(io::Error::other).and_then(|r| r),
            _ = self.cancel.cancelled() => {
                process::abort(&mut child, MYSQLDUMP).await;
                return Err(MySqlError::Cancelled(MYSQLDUMP.to_string()));
            }
        };

        let (written, encoder) = match copied {
            Ok(copied) => copied,
            Err(source) => {
                process::abort(&mut child, MYSQLDUMP).await;
                return Err(MySqlError::Stream {
                    context: "Error compressing database".to_string(),
                    source,
                });
            }
        };
        debug!("Compressed {written} bytes of dump output");

        let diagnostics = process::collect(stderr, MYSQLDUMP).await?;
        let status = process::wait(&mut child, MYSQLDUMP, &self.cancel).await?;

        diagnostics::classify_bytes(&diagnostics, DUMP_BENIGN)?;
        if !status.success() {
            return Err(MySqlError::Process {
                tool: MYSQLDUMP.to_string(),
                message: process::failure_message(status, &diagnostics),
            });
        }

        finish(encoder, destination.to_path_buf()).await?;

        let size = file_size(destination).map_err(|source| MySqlError::FileAccess {
            path: destination.to_path_buf(),
            source,
        })?;
        info!("Wrote {} ({})", destination.display(), format_bytes(size));

        Ok(size)
    }
}

/// Writes the gzip trailer, then flushes and syncs the file.
async fn finish(encoder: GzEncoder<File>, path: PathBuf) -> Result<()> {
    let context = format!("Error finalizing {}", path.display());
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut file = encoder.finish()?;
        file.flush()?;
        file.sync_all()
    })
    .await
    .map_err(io::Error::other)
    .and_then(|r| r)
    .map_err(|source| MySqlError::Stream { context, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(port: Option<u16>, password: Option<&str>) -> MySqlConfig {
        MySqlConfig::new("db.local", port, "backup", password.map(str::to_string), "app_db")
            .unwrap()
    }

    #[test]
    fn dump_args_without_column_statistics() {
        let args = dump_args(&config(None, None), false);
        assert!(!args.iter().any(|a| a == COLUMN_STATISTICS_FLAG));
        assert_eq!(&args[..DUMP_FLAGS.len()], &DUMP_FLAGS);
        assert_eq!(
            &args[DUMP_FLAGS.len()..],
            &["-h", "db.local", "-u", "backup", "app_db"]
        );
    }

    #[test]
    fn column_statistics_flag_precedes_connection_flags() {
        let args = dump_args(&config(Some(3307), Some("pw")), true);
        let positions: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == COLUMN_STATISTICS_FLAG)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(positions, vec![DUMP_FLAGS.len()]);

        let port = args.iter().position(|a| a == "-P").unwrap();
        assert!(positions[0] < port);
        assert_eq!(
            &args[port..],
            &["-P", "3307", "-h", "db.local", "-u", "backup", "-ppw", "app_db"]
        );
    }

    #[test]
    fn no_password_means_no_password_flag() {
        let args = dump_args(&config(None, Some("")), true);
        assert!(!args.iter().any(|a| a.starts_with("-p")));
        assert_eq!(args.last().map(String::as_str), Some("app_db"));
    }

    #[test]
    fn probe_args_are_schema_only() {
        let args = TrialRunProbe::probe_args(&config(Some(3306), None));
        assert_eq!(
            args,
            vec![
                "--no-data",
                COLUMN_STATISTICS_FLAG,
                "-P",
                "3306",
                "-h",
                "db.local",
                "-u",
                "backup",
                "app_db"
            ]
        );
    }

    #[tokio::test]
    async fn configured_strategy_skips_the_trial_run() {
        let dump = MySqlDump::new(config(None, None))
            .with_resolver(Arc::new(SystemResolver::new().with_override(
                MYSQLDUMP,
                "/nonexistent/mysqldump",
            )))
            .with_column_statistics(ColumnStatistics::On);
        assert!(dump.supports_column_statistics().await);

        let dump = dump.with_column_statistics(ColumnStatistics::Off);
        assert!(!dump.supports_column_statistics().await);
    }

    #[tokio::test]
    async fn probe_without_tool_reports_unsupported() {
        let resolver =
            SystemResolver::new().with_override(MYSQLDUMP, "/nonexistent/mysqldump");
        let probe = TrialRunProbe::new(config(None, None), Arc::new(resolver));
        assert!(!probe.supports_column_statistics().await);
    }
}
