//! Generator backed by an external process.
//!
//! The child receives the generation parameters as JSON on stdin and
//! `JOB_ID` / `OUTPUT_PATH` in its environment. Progress is read from stdout
//! lines of the form `PROGRESS <percent> <message>`; every other line is
//! logged. The job succeeds when the process exits 0 and the output file
//! exists.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::config::CommandGeneratorConfig;
use crate::error::GenerationError;
use crate::generator::{GenerationOutput, GenerationRequest, Generator, ProgressReporter};

/// Maximum stderr captured from the child (1 MiB).
const MAX_STDERR_BYTES: u64 = 1024 * 1024;

/// Stderr characters kept in the job's error message.
const STDERR_TAIL_CHARS: usize = 2000;

/// Prefix of stdout lines that carry progress.
const PROGRESS_PREFIX: &str = "PROGRESS ";

pub struct CommandGenerator {
    config: CommandGeneratorConfig,
}

impl CommandGenerator {
    pub fn new(config: CommandGeneratorConfig) -> Self {
        Self { config }
    }

    fn command(&self, request: &GenerationRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .env("JOB_ID", request.job_id.to_string())
            .env("OUTPUT_PATH", &request.output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_directory {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn initialize(&self) -> Result<(), GenerationError> {
        if let Some(dir) = &self.config.working_directory {
            if !tokio::fs::try_exists(dir).await? {
                return Err(GenerationError::Unavailable(format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }
        tracing::info!(
            program = %self.config.program,
            args = ?self.config.args,
            "Command generator ready",
        );
        Ok(())
    }

    async fn execute(
        &self,
        request: GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<GenerationOutput, GenerationError> {
        let mut child = self.command(&request).spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&request.params)
                .map_err(|e| GenerationError::Failed(format!("Cannot encode parameters: {e}")))?;
            // The child may exit without reading its input.
            let _ = stdin.write_all(&payload).await;
            drop(stdin);
        }

        let stderr_task = tokio::spawn(read_capped(child.stderr.take()));

        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            // Lines are decoded lossily; stray bytes must not fail the job.
            while reader.read_until(b'\n', &mut buf).await? > 0 {
                let line = String::from_utf8_lossy(&buf);
                match parse_progress_line(&line) {
                    Some((percent, message)) => progress.report_text(percent, message),
                    None => tracing::debug!(
                        job_id = %request.job_id,
                        line = %line.trim_end(),
                        "Generator output"
                    ),
                }
                buf.clear();
            }
        }

        let status = child.wait().await?;
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(GenerationError::ProcessFailed {
                status: describe_status(status),
                stderr: tail(stderr.trim(), STDERR_TAIL_CHARS).to_string(),
            });
        }

        if !tokio::fs::try_exists(&request.output_path).await? {
            return Err(GenerationError::MissingOutput(request.output_path));
        }

        Ok(GenerationOutput {
            path: request.output_path,
        })
    }
}

/// Split `PROGRESS <percent> <message>` into its parts.
fn parse_progress_line(line: &str) -> Option<(f64, &str)> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?.trim_start();
    let (percent, message) = rest.split_once(' ').unwrap_or((rest, ""));
    let percent: f64 = percent.parse().ok()?;
    percent.is_finite().then_some((percent, message.trim()))
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

/// Last `max_chars` characters of `s`.
fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// Read a whole stream into memory, capped at [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
