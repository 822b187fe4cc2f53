use std::io;
use std::process::{Command as ProcessCommand, Stdio};

use camino::Utf8Path;
use thiserror::Error;

/// Captured result of one external process invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("refusing to execute an empty command")]
    EmptyArgv,
    #[error("executing `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("command `{command}` failed with exit code {status:?}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Error text captured from the process, or the spawn error itself.
    pub fn detail(&self) -> String {
        match self {
            CommandError::EmptyArgv => String::new(),
            CommandError::Spawn { source, .. } => source.to_string(),
            CommandError::Failed { stderr, .. } => stderr.trim().to_owned(),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            CommandError::EmptyArgv => "",
            CommandError::Spawn { command, .. } | CommandError::Failed { command, .. } => command,
        }
    }
}

/// Seam between the stage engine and the operating system.
pub trait CommandRunner {
    /// Run `argv` to completion, optionally inside `cwd`.
    ///
    /// A non-zero exit status is reported as [`CommandError::Failed`]; the
    /// runner never decides whether that ends the pipeline.
    fn execute(
        &self,
        argv: &[String],
        cwd: Option<&Utf8Path>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as real child processes, blocking until they exit.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(
        &self,
        argv: &[String],
        cwd: Option<&Utf8Path>,
    ) -> Result<CommandOutput, CommandError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(CommandError::EmptyArgv);
        };
        let render = format_command(argv);

        let mut command = ProcessCommand::new(program);
        command.args(args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        tracing::debug!(command = %render, cwd = ?cwd, "spawning");
        let output = command.output().map_err(|source| CommandError::Spawn {
            command: render.clone(),
            source,
        })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        };

        if result.succeeded() {
            let stdout = result.stdout.trim();
            if !stdout.is_empty() {
                tracing::info!(command = %render, "{}", stdout);
            }
            Ok(result)
        } else {
            tracing::error!(
                command = %render,
                status = ?result.status,
                "{}",
                result.stderr.trim()
            );
            Err(CommandError::Failed {
                command: render,
                status: result.status,
                stderr: result.stderr,
            })
        }
    }
}

/// Build an owned argv from string slices.
pub fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_owned()).collect()
}

pub fn format_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.chars().any(|c| c.is_whitespace()) {
                let escaped = arg.replace('"', "\\\"");
                format!("\"{}\"", escaped)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
