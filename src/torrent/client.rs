use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::platform::{client_process_descriptor, ensure_executable};
use crate::error::DownloadError;

/// Literal marker terminating every helper response on its stdout.
pub const RESULT_SENTINEL: &str = "#=end";

/// One running torrent client helper and the line/JSON protocol spoken over
/// its standard streams. The protocol is strictly synchronous: one command in
/// flight, exactly one sentinel-terminated reply per command.
pub struct TorrentClientProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    disposed: bool,
}

impl TorrentClientProcess {
    /// Launches the platform-specific helper found under `assets_dir`.
    pub fn launch(assets_dir: &Path) -> Result<Self, DownloadError> {
        let descriptor = client_process_descriptor(assets_dir)?;
        ensure_executable(&descriptor.executable)?;

        let mut command = Command::new(&descriptor.executable);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // backstop only; dispose() is the deterministic teardown path
            .kill_on_drop(true);

        if let Some(var) = descriptor.library_path_var {
            command.env(var, &descriptor.library_dir);
        }

        debug!(executable = %descriptor.executable.display(), "launching torrent client");
        let mut child = command.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        Ok(Self {
            child,
            stdin,
            stdout,
            disposed: false,
        })
    }

    /// Writes one command line and returns the decoded JSON reply.
    pub async fn execute_command(
        &mut self,
        command: &str,
        token: &CancellationToken,
        timeout: Duration,
    ) -> Result<serde_json::Value, DownloadError> {
        debug!(command, "executing torrent client command");

        self.write_command(command).await?;
        let raw = self.read_command_result(token, timeout).await?;

        serde_json::from_str(&raw)
            .map_err(|e| DownloadError::Protocol(format!("invalid json in client response: {e}")))
    }

    async fn write_command(&mut self, command: &str) -> Result<(), DownloadError> {
        let stdin = self.stdin.as_mut().ok_or(DownloadError::ProcessExited)?;
        stdin.write_all(command.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Accumulates stdout one byte at a time until the buffer ends with the
    /// sentinel, then strips it. There is no length prefix; the suffix check
    /// is the framing the existing helper was built against, preserved as-is.
    /// Checks for child exit before each read so a dead helper fails fast
    /// instead of hanging the read.
    async fn read_command_result(
        &mut self,
        token: &CancellationToken,
        timeout: Duration,
    ) -> Result<String, DownloadError> {
        let deadline = Instant::now() + timeout;
        let child = &mut self.child;
        let stdout = self.stdout.as_mut().ok_or(DownloadError::ProcessExited)?;

        let mut buffer: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];

        while !buffer.ends_with(RESULT_SENTINEL.as_bytes()) {
            if child.try_wait()?.is_some() {
                return Err(DownloadError::ProcessExited);
            }

            let n = tokio::select! {
                _ = token.cancelled() => return Err(DownloadError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(DownloadError::Timeout("torrent client response"));
                }
                read = stdout.read(&mut byte) => read?,
            };

            if n == 0 {
                return Err(DownloadError::ProcessExited);
            }
            buffer.push(byte[0]);
        }

        buffer.truncate(buffer.len() - RESULT_SENTINEL.len());
        String::from_utf8(buffer)
            .map_err(|e| DownloadError::Protocol(format!("client response is not utf-8: {e}")))
    }

    /// Whether the helper process has terminated.
    pub fn has_exited(&mut self) -> Result<bool, DownloadError> {
        Ok(self.child.try_wait()?.is_some())
    }

    /// Idempotent teardown: closes both streams and kills the helper if it is
    /// still running. Safe to call before any command and more than once.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        drop(self.stdin.take());
        drop(self.stdout.take());

        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill().await {
                warn!("failed to kill torrent client: {e}");
            }
        }
    }
}
