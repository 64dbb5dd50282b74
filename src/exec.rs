//! External command execution helpers.
//!
//! Every external program this tool touches (git, package managers,
//! privilege-escalation wrappers) goes through [`Invocation`]: a plain
//! program-plus-arguments plan that can be inspected by tests and logged
//! before it runs.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// A planned external command: program name plus arguments.
///
/// Building the plan is separated from running it so dispatch logic (which
/// package manager, whether `sudo` is prepended) can be unit-tested without
/// executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute, resolved via `PATH`.
    program: String,
    /// Arguments passed to the program.
    args: Vec<String>,
}

impl Invocation {
    /// Create a new invocation plan.
    #[must_use]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// Program name of this invocation.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments of this invocation.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Return a copy of this invocation wrapped in a privilege-escalation
    /// program (`sudo`/`doas`), the original program becoming the first
    /// argument.
    #[must_use]
    pub fn escalated(&self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program.clone());
        args.extend(self.args.iter().cloned());
        Self {
            program: wrapper.to_string(),
            args,
        }
    }

    /// Render the command line for log messages.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Execute the command, failing on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or exits non-zero;
    /// captured stderr is included in the error message.
    pub fn execute(&self) -> Result<Output> {
        self.execute_in(None)
    }

    /// Execute the command in the given working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or exits non-zero.
    pub fn execute_in(&self, cwd: Option<&Path>) -> Result<Output> {
        let output = self.output_in(cwd)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Command failed ({}): {}",
                self.rendered(),
                stderr.trim()
            ));
        }

        Ok(output)
    }

    /// Spawn the command and capture its output without judging the exit
    /// status. Callers that classify failures themselves (the git checkout
    /// sequence categorizes stderr) build on this.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be spawned.
    pub fn output_in(&self, cwd: Option<&Path>) -> Result<Output> {
        debug!("running: {}", self.rendered());

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        command
            .output()
            .with_context(|| format!("Failed to execute: {}", self.rendered()))
    }
}
