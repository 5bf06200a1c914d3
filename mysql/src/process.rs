use log::{debug, warn};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::display_args;
use crate::{MySqlError, Result};

/// Standard stream wiring for a child process
pub struct Pipes {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl Pipes {
    pub fn new(stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }
}

/// Starts `program` with `args` passed as a vector, never through a shell.
pub fn spawn(program: &Path, tool: &str, args: &[String], pipes: Pipes) -> Result<Child> {
    debug!("Running {tool} command: {} {}", program.display(), display_args(args));

    Command::new(program)
        .args(args)
        .stdin(pipes.stdin)
        .stdout(pipes.stdout)
        .stderr(pipes.stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MySqlError::Process {
            tool: tool.to_string(),
            message: format!("failed to start {}: {e}", program.display()),
        })
}

/// Reads a child stream to the end on its own task so the child never blocks
/// on a full pipe.
pub fn capture<R>(reader: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            reader.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

pub async fn collect(handle: JoinHandle<io::Result<Vec<u8>>>, tool: &str) -> Result<Vec<u8>> {
    handle
        .await
        .map_err(io::Error::other)
        .and_then(|r| r)
        .map_err(|source| MySqlError::Stream {
            context: format!("Failed to read {tool} output"),
            source,
        })
}

/// Waits for the child to exit, killing it if `cancel` fires first.
pub async fn wait(child: &mut Child, tool: &str, cancel: &CancellationToken) -> Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status.map_err(|e| MySqlError::Process {
            tool: tool.to_string(),
            message: format!("failed to wait for process: {e}"),
        }),
        _ = cancel.cancelled() => {
            abort(child, tool).await;
            Err(MySqlError::Cancelled(tool.to_string()))
        }
    }
}

/// Kills and reaps the child. Errors are logged only: the caller is already
/// on a failure path.
pub async fn abort(child: &mut Child, tool: &str) {
    warn!("Stopping {tool}");
    if let Err(e) = child.kill().await {
        warn!("Failed to stop {tool}: {e}");
    }
}

/// Human readable reason for a failed exit: the tool's own output when it
/// printed any, the exit status otherwise.
pub fn failure_message(status: ExitStatus, output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    let text = text.trim();
    if text.is_empty() {
        status.to_string()
    } else {
        text.to_string()
    }
}

/// Runs `<program> --version` and returns its first line.
pub async fn version(program: &Path, tool: &str) -> Result<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| MySqlError::Process {
            tool: tool.to_string(),
            message: format!("failed to start {}: {e}", program.display()),
        })?;

    if !output.status.success() {
        return Err(MySqlError::Process {
            tool: tool.to_string(),
            message: failure_message(output.status, &output.stderr),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout);
    let version = version.lines().next().unwrap_or_default().trim().to_string();
    debug!("{tool} version: {version}");
    Ok(version)
}
