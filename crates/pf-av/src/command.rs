//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// How a streamed execution ended.
enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use pf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> pf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("pngquant"))
///     .arg("--quality").arg("65-85")
///     .arg("--output").arg("/tmp/out.png")
///     .arg("/tmp/in.png")
///     .execute()
///     .await?;
/// println!("{}", output.stderr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments appended so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// File name of the program, used to label errors and log lines.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Same as [`ToolCommand::execute_with_stderr_callback`], minus
    /// cancellation.
    pub async fn execute(&self) -> pf_core::Result<ToolOutput> {
        self.execute_with_stderr_callback(|_| {}, None).await
    }

    /// Execute the command, handing every stderr chunk to `on_stderr` as it
    /// arrives.
    ///
    /// stdin is closed. stdout is drained and logged at debug level but not
    /// interpreted. When `cancel` fires before the process exits, the process
    /// is killed and [`pf_core::Error::Cancelled`] is returned regardless of
    /// what it may already have written.
    ///
    /// # Errors
    ///
    /// - [`pf_core::Error::Spawn`] if the process cannot be started.
    /// - [`pf_core::Error::Tool`] on a non-zero exit (message includes the
    ///   accumulated stderr) or when the timeout expires.
    /// - [`pf_core::Error::Cancelled`] if `cancel` fires first.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_stderr: impl FnMut(&str),
        cancel: Option<&CancellationToken>,
    ) -> pf_core::Result<ToolOutput> {
        let name = self.program_name();
        tracing::debug!(tool = %name, args = ?self.args, "Running tool");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| pf_core::Error::spawn(&name, e))?;

        let stdout = child.stdout.take();
        let stdout_tool = name.clone();
        let stdout_task = tokio::spawn(async move {
            let mut collected = String::new();
            if let Some(out) = stdout {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(tool = %stdout_tool, "stdout: {line}");
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
            collected
        });

        let stderr = child.stderr.take();
        let mut diagnostics = String::new();
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Outcome::Cancelled,
            res = tokio::time::timeout(
                self.timeout,
                drain_and_wait(&mut child, stderr, &mut diagnostics, &mut on_stderr),
            ) => match res {
                Ok(status) => Outcome::Exited(status),
                Err(_elapsed) => Outcome::TimedOut,
            },
        };

        match outcome {
            Outcome::Cancelled => {
                terminate(&mut child, &name).await;
                stdout_task.abort();
                tracing::info!(tool = %name, "Process killed after cancellation");
                Err(pf_core::Error::Cancelled)
            }
            Outcome::TimedOut => {
                terminate(&mut child, &name).await;
                stdout_task.abort();
                Err(pf_core::Error::tool(
                    name,
                    format!("timed out after {:?}", self.timeout),
                ))
            }
            Outcome::Exited(Err(e)) => Err(pf_core::Error::tool(
                name,
                format!("I/O error waiting for process: {e}"),
            )),
            Outcome::Exited(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                if !status.success() {
                    return Err(pf_core::Error::tool(
                        name,
                        format!("exited with status {status}: {}", diagnostics.trim()),
                    ));
                }
                Ok(ToolOutput {
                    status,
                    stdout,
                    stderr: diagnostics,
                })
            }
        }
    }
}

/// Read stderr to EOF, forwarding chunks, then reap the child.
async fn drain_and_wait(
    child: &mut Child,
    stderr: Option<ChildStderr>,
    diagnostics: &mut String,
    on_stderr: &mut impl FnMut(&str),
) -> std::io::Result<ExitStatus> {
    if let Some(mut stderr) = stderr {
        let mut buf = [0u8; 4096];
        let mut lines = LineBuffer::default();
        loop {
            let n = stderr.read(&mut buf).await?;
            let chunk = if n == 0 {
                lines.finish()
            } else {
                lines.push(&buf[..n])
            };
            if let Some(chunk) = chunk {
                diagnostics.push_str(&chunk);
                on_stderr(&chunk);
            }
            if n == 0 {
                break;
            }
        }
    }
    child.wait().await
}

/// Holds raw stderr bytes until a line break, so neither a UTF-8 sequence
/// nor a progress token is split across two chunks.
///
/// ffmpeg ends progress lines with `\r`, so both `\r` and `\n` count.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `bytes` and return everything up to the last line break.
    fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let end = self
            .pending
            .iter()
            .rposition(|&b| b == b'\n' || b == b'\r')?
            + 1;
        let complete: Vec<u8> = self.pending.drain(..end).collect();
        Some(String::from_utf8_lossy(&complete).into_owned())
    }

    /// Whatever is left once the stream has ended.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

async fn terminate(child: &mut Child, tool: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(tool, "Failed to kill process: {e}");
    }
}
