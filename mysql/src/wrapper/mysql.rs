use flate2::read::GzDecoder;
use log::{debug, error, info};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;

use crate::common::{is_regular_file, quote_identifier, MySqlConfig};
use crate::diagnostics::{self, CLIENT_BENIGN};
use crate::process::{self, Pipes};
use crate::tools::{SystemResolver, ToolResolver, MYSQL};
use crate::{MySqlError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const FEED_CHUNK: usize = 64 * 1024;

/// Why feeding the dump into the client stopped early
#[derive(Debug)]
enum FeedError {
    /// The archive could not be decompressed
    Archive(io::Error),
    /// The client stopped reading
    Pipe(io::Error),
}

/// Statement creating the database, dropping it first when asked to.
pub fn ensure_database_statement(database: &str, drop_first: bool) -> String {
    let name = quote_identifier(database);
    let create = format!("CREATE DATABASE IF NOT EXISTS {name}");
    if drop_first {
        format!("DROP DATABASE IF EXISTS {name}; {create}")
    } else {
        create
    }
}

/// Wrapper for the `mysql` command line client
pub struct MySqlClient {
    config: MySqlConfig,
    resolver: Arc<dyn ToolResolver>,
    cancel: CancellationToken,
}

impl MySqlClient {
    /// Create a new MySqlClient instance
    pub fn new(config: MySqlConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(SystemResolver::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Cancelling `token` kills a running client.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn restore_args(&self) -> Vec<String> {
        let mut args = vec!["--default-character-set=utf8".to_string()];
        args.extend(self.config.connection_args());
        args.push(self.config.database.clone());
        args
    }

    pub fn admin_args(&self, statement: &str) -> Vec<String> {
        let mut args = vec![
            "--default-character-set=utf8".to_string(),
            "--compress".to_string(),
        ];
        args.extend(self.config.connection_args());
        args.push("-e".to_string());
        args.push(statement.to_string());
        args
    }

    /// `mysql --version` of the resolved tool
    pub async fn version(&self) -> Result<String> {
        let program = self.resolver.resolve(MYSQL)?;
        process::version(&program, MYSQL).await
    }

    /// Creates the database if it is missing, optionally dropping it first.
    pub async fn ensure_database(&self, drop_first: bool) -> Result<()> {
        let program = self.resolver.resolve(MYSQL)?;
        let database = &self.config.database;
        let statement = ensure_database_statement(database, drop_first);

        if drop_first {
            info!("Dropping database `{database}`");
        }
        info!("Creating database (if not exists) `{database}`");

        let args = self.admin_args(&statement);
        let pipes = Pipes::new(Stdio::null(), Stdio::null(), Stdio::piped());
        let mut child = process::spawn(&program, MYSQL, &args, pipes)?;
        let stderr = process::capture(child.stderr.take());

        let status = process::wait(&mut child, MYSQL, &self.cancel).await?;
        let diagnostics = process::collect(stderr, MYSQL).await?;

        if !status.success() {
            return Err(MySqlError::Process {
                tool: MYSQL.to_string(),
                message: process::failure_message(status, &diagnostics),
            });
        }

        diagnostics::classify_bytes(&diagnostics, CLIENT_BENIGN)
    }

    /// Streams a gzip dump from `source` into the database.
    pub async fn restore_from_compressed_file<P: AsRef<Path>>(&self, source: P) -> Result<()> {
        let source = source.as_ref();
        let program = self.resolver.resolve(MYSQL)?;

        // Checked before spawning: a client waiting on stdin nobody feeds never exits.
        if !is_regular_file(source) {
            return Err(MySqlError::Validation(format!(
                "File '{}' does not exist",
                source.display()
            )));
        }

        let mut decoder = open_archive(source)?;
        let args = self.restore_args();

        let pipes = Pipes::new(Stdio::piped(), Stdio::piped(), Stdio::piped());
        let mut child = process::spawn(&program, MYSQL, &args, pipes)?;
        let stdout = process::capture(child.stdout.take());
        let stderr = process::capture(child.stderr.take());
        let stdin = child.stdin.take().ok_or_else(|| MySqlError::Stream {
            context: "Error importing database".to_string(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "stdin was not captured"),
        })?;

        let mut sink = SyncIoBridge::new(stdin);
        let feeder = tokio::task::spawn_blocking(move || {
            let fed = feed(&mut decoder, &mut sink);
            // Closing stdin is what lets the client see end of input and exit.
            drop(sink);
            fed
        });

        let status = process::wait(&mut child, MYSQL, &self.cancel).await?;
        let mut output = process::collect(stdout, MYSQL).await?;
        output.extend(process::collect(stderr, MYSQL).await?);

        let fed = feeder
            .await
            .map_err(|e| FeedError::Pipe(io::Error::other(e)))
            .and_then(|r| r);
        if let Err(e) = &fed {
            error!("Streaming '{}' into {MYSQL} failed: {e:?}", source.display());
        }

        if !status.success() {
            return Err(MySqlError::Process {
                tool: MYSQL.to_string(),
                message: process::failure_message(status, &output),
            });
        }

        match fed {
            Ok(bytes) => debug!("Streamed {bytes} bytes into {MYSQL}"),
            Err(FeedError::Archive(e)) => {
                return Err(MySqlError::InvalidArchive {
                    path: source.to_path_buf(),
                    source: e,
                })
            }
            Err(FeedError::Pipe(e)) => {
                return Err(MySqlError::Stream {
                    context: format!("Restore input from '{}' was truncated", source.display()),
                    source: e,
                })
            }
        }

        if let Err(e) = diagnostics::classify_bytes(&output, CLIENT_BENIGN) {
            debug!("{MYSQL} output: {e}");
        }

        info!("Imported '{}' to `{}`", source.display(), self.config.database);
        Ok(())
    }
}

/// Opens `path` and checks for the gzip magic before handing out a decoder.
fn open_archive(path: &Path) -> Result<GzDecoder<File>> {
    let file_access = |source| MySqlError::FileAccess {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(file_access)?;

    let mut magic = [0u8; 2];
    if let Err(source) = file.read_exact(&mut magic) {
        return Err(MySqlError::InvalidArchive {
            path: path.to_path_buf(),
            source,
        });
    }
    if magic != GZIP_MAGIC {
        return Err(MySqlError::InvalidArchive {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, "missing gzip header"),
        });
    }
    file.seek(SeekFrom::Start(0)).map_err(file_access)?;

    Ok(GzDecoder::new(file))
}

fn feed<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> std::result::Result<u64, FeedError> {
    let mut buf = vec![0u8; FEED_CHUNK];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FeedError::Archive(e)),
        };
        writer.write_all(&buf[..n]).map_err(FeedError::Pipe)?;
        total += n as u64;
    }

    writer.flush().map_err(FeedError::Pipe)?;
    Ok(total)
}
