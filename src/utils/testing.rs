// Recording runner used by the engine tests.
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use super::command::{CommandOutput, CommandRunner, PipeOutput, ToolCommand};
use crate::errors::Result;

type Responder = Box<dyn Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync>;

pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub(crate) fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        status_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Records every command line and answers with a scripted output.
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    responder: Responder,
}

impl ScriptedRunner {
    pub(crate) fn succeeding() -> Self {
        Self::with(|_| ok("https://example.test\n"))
    }

    pub(crate) fn with<F>(responder: F) -> Self
    where
        F: Fn(&ToolCommand) -> CommandOutput + Send + Sync + 'static,
    {
        Self::answering(move |command| Ok(responder(command)))
    }

    /// Like [`ScriptedRunner::with`], but the responder may fail the way a
    /// real spawn does (missing tool, timeout).
    pub(crate) fn answering<F>(responder: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, line: String) {
        self.calls.lock().expect("calls lock").push(line);
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.record(command.to_shell_string());
        (self.responder)(command)
    }

    async fn run_to_file(&self, command: &ToolCommand, destination: &Path) -> Result<CommandOutput> {
        self.record(format!("{} > {}", command, destination.display()));
        let output = (self.responder)(command)?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, &output.stdout)?;
        Ok(output)
    }

    async fn pipe(&self, producer: &ToolCommand, consumer: &ToolCommand) -> Result<PipeOutput> {
        self.record(format!("{} | {}", producer, consumer));
        Ok(PipeOutput {
            producer: (self.responder)(producer)?,
            consumer: (self.responder)(consumer)?,
        })
    }
}
