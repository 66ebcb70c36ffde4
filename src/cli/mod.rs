// envsync/src/cli/mod.rs
//! Interactive flows behind the `envsync` subcommands.
pub mod config;
pub mod env;
pub mod init;
pub mod status;

use anyhow::{Context, Result};
use std::io::{Write, stdin, stdout};

/// Source of operator answers. Stdin in the binary, a script in tests.
pub trait Prompt {
    /// Asks a free-form question. An empty reply takes `default`.
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String>;

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;
}

pub fn resolve_answer(input: &str, default: Option<&str>) -> String {
    match input.trim() {
        "" => default.unwrap_or_default().to_string(),
        answer => answer.to_string(),
    }
}

pub fn parse_confirmation(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

pub struct StdinPrompt;

impl StdinPrompt {
    fn read_reply(&self, line: &str) -> Result<String> {
        print!("{}", line);
        stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        stdin().read_line(&mut input).context("Failed to read user input")?;
        Ok(input)
    }
}

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        let line = match default.filter(|d| !d.is_empty()) {
            Some(d) => format!("{} [{}]: ", question, d),
            None => format!("{}: ", question),
        };
        let input = self.read_reply(&line)?;
        Ok(resolve_answer(&input, default))
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "yes" } else { "no" };
        let input = self.read_reply(&format!("{} (yes/no) [{}]: ", question, hint))?;
        Ok(parse_confirmation(&input, default))
    }
}
