// envsync/src/utils/command.rs
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::find_executable;
use crate::errors::{Result, SyncError};

/// An external tool invocation as an explicit argument list.
///
/// Arguments are never joined into a shell string for execution; the only
/// place a shell string is produced is [`ToolCommand::to_shell_string`], which
/// quotes every word and is used for logging and for commands that must run
/// inside a remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Renders the command as a single POSIX shell command line.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Quotes one word for a POSIX shell. Words made only of safe characters are
/// returned unchanged.
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Case-insensitive check for the word "error" in stderr.
    pub fn stderr_mentions_error(&self) -> bool {
        self.stderr.to_lowercase().contains("error")
    }

    /// Best human-readable failure text: stderr, falling back to stdout.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Both ends of a `producer | consumer` pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipeOutput {
    pub producer: CommandOutput,
    pub consumer: CommandOutput,
}

impl PipeOutput {
    pub fn success(&self) -> bool {
        self.producer.success() && self.consumer.success()
    }
}

/// Seam between the sync engines and the operating system.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion, capturing stdout and stderr.
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;

    /// Runs a command with stdout streamed into `destination`.
    async fn run_to_file(&self, command: &ToolCommand, destination: &Path) -> Result<CommandOutput>;

    /// Runs `producer | consumer`. The consumer's timeout bounds the pipeline.
    async fn pipe(&self, producer: &ToolCommand, consumer: &ToolCommand) -> Result<PipeOutput>;
}

/// Runs commands as local child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }

    fn prepare(&self, command: &ToolCommand) -> Result<Command> {
        let program = find_executable(command.program())?;
        let mut cmd = Command::new(program);
        cmd.args(command.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

async fn bounded<F, T>(command: &ToolCommand, work: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match command.timeout_duration() {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result.map_err(SyncError::from),
            // The child is dropped with the future and killed.
            Err(_) => Err(SyncError::Timeout {
                command: command.to_string(),
                seconds: limit.as_secs(),
            }),
        },
        None => work.await.map_err(SyncError::from),
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let mut cmd = self.prepare(command)?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        debug!(command = %command, "running");

        let output = bounded(command, async move { cmd.spawn()?.wait_with_output().await }).await?;
        Ok(output.into())
    }

    async fn run_to_file(&self, command: &ToolCommand, destination: &Path) -> Result<CommandOutput> {
        let mut cmd = self.prepare(command)?;
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(destination)?;
        cmd.stdout(Stdio::from(file)).stderr(Stdio::piped());
        debug!(command = %command, destination = %destination.display(), "running into file");

        let output = bounded(command, async move { cmd.spawn()?.wait_with_output().await }).await?;
        Ok(output.into())
    }

    async fn pipe(&self, producer: &ToolCommand, consumer: &ToolCommand) -> Result<PipeOutput> {
        let mut producer_cmd = self.prepare(producer)?;
        producer_cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut consumer_cmd = self.prepare(consumer)?;
        consumer_cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(producer = %producer, consumer = %consumer, "running pipeline");

        let work = async move {
            let mut producer_child = producer_cmd.spawn()?;
            let mut consumer_child = consumer_cmd.spawn()?;
            let mut source = producer_child
                .stdout
                .take()
                .ok_or_else(|| io::Error::other("producer stdout is not captured"))?;
            let mut sink = consumer_child
                .stdin
                .take()
                .ok_or_else(|| io::Error::other("consumer stdin is not captured"))?;

            let copy = async move {
                let copied = tokio::io::copy(&mut source, &mut sink).await;
                drop(sink);
                copied
            };
            let (copied, produced, consumed) = tokio::join!(
                copy,
                producer_child.wait_with_output(),
                consumer_child.wait_with_output()
            );
            // A broken pipe shows up again in the exit statuses.
            if let Err(e) = copied {
                debug!(error = %e, "pipeline copy ended early");
            }
            Ok::<_, io::Error>((produced?, consumed?))
        };

        let (produced, consumed) = bounded(consumer, work).await?;
        Ok(PipeOutput {
            producer: produced.into(),
            consumer: consumed.into(),
        })
    }
}
