use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::alert::AlertSink;
use crate::cli::Stage;
use crate::config::{ConfigError, PipelineConfig};
use crate::console::Console;
use crate::layout::Layout;
use crate::process::{CommandError, CommandOutput, CommandRunner, argv, format_command};
use crate::version;

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("working copy {0} does not exist; run the clone stage first")]
    MissingWorkingCopy(Utf8PathBuf),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Outcome of the build stage's commit step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommitResult {
    Committed,
    NothingToCommit,
}

/// Runs exactly one stage per call against the configured working copy.
pub struct StageEngine<R> {
    runner: R,
    sink: Box<dyn AlertSink>,
    layout: Layout,
    console: Console,
}

impl<R: CommandRunner> StageEngine<R> {
    pub fn new(runner: R, sink: Box<dyn AlertSink>, layout: Layout, console: Console) -> Self {
        Self {
            runner,
            sink,
            layout,
            console,
        }
    }

    /// Run `stage`. Any failure is alerted once and then handed back unchanged.
    pub fn run(&self, stage: Stage, config: &PipelineConfig) -> Result<(), StageError> {
        let span = tracing::info_span!("stage", name = stage.as_str());
        let _entered = span.enter();

        self.console.header(stage.as_str());
        let result = match stage {
            Stage::Clone => self.clone_stage(config),
            Stage::Build => self.build_stage(config),
            Stage::Test => self.test_stage(config),
            Stage::Deploy => self.deploy_stage(config),
            Stage::Rollback => self.rollback_stage(config),
        };

        if let Err(err) = &result {
            let message = alert_message(stage, err);
            tracing::error!(error = %message, "stage failed");
            self.console.error(&message);
            self.sink.notify(&message);
        } else {
            tracing::info!("stage succeeded");
        }
        result
    }

    fn clone_stage(&self, config: &PipelineConfig) -> Result<(), StageError> {
        let url = config.repo_url()?;
        let dir = self.layout.working_copy(config.target()?);

        if dir.exists() {
            self.console.info("Working copy already present, pulling updates...");
            self.git(&["pull"], &dir)?;
        } else {
            self.console.info(&format!("Cloning {} into {} ...", url, dir));
            let clone = argv(["git", "clone", url, dir.as_str()]);
            self.runner.execute(&clone, None)?;
        }

        self.console.success("Clone completed.");
        Ok(())
    }

    fn build_stage(&self, config: &PipelineConfig) -> Result<(), StageError> {
        let dir = self.existing_working_copy(config)?;

        let version = version::next(&dir)?;
        version::write(&dir, version)?;
        tracing::info!(version, "version marker updated");

        self.git(&["add", "."], &dir)?;
        match self.commit(&dir, &format!("Build version {version}"))? {
            CommitResult::Committed => {}
            CommitResult::NothingToCommit => {
                tracing::warn!(version, "nothing to commit, working copy is clean");
                self.console.warn("No changes to commit (clean repo).");
            }
        }

        self.console.success(&format!("Build done. Version = {version}"));
        Ok(())
    }

    /// Commit staged changes, reporting a clean index as its own outcome
    /// instead of a failed `git commit`.
    fn commit(&self, dir: &Utf8Path, message: &str) -> Result<CommitResult, StageError> {
        let status = self.git(&["status", "--porcelain"], dir)?;
        if status.stdout.trim().is_empty() {
            return Ok(CommitResult::NothingToCommit);
        }
        self.git(&["commit", "-m", message], dir)?;
        Ok(CommitResult::Committed)
    }

    fn test_stage(&self, config: &PipelineConfig) -> Result<(), StageError> {
        let dir = self.existing_working_copy(config)?;
        let command = config.test_argv()?;

        self.console.info(&format!("Running tests: {}", format_command(&command)));
        self.runner.execute(&command, Some(&dir))?;

        self.console.success("All tests passed.");
        Ok(())
    }

    fn deploy_stage(&self, config: &PipelineConfig) -> Result<(), StageError> {
        let dir = self.existing_working_copy(config)?;
        let branch = config.deploy_branch()?;

        // Rebase onto the remote first so the push never races a newer remote head.
        self.git(&["pull", "origin", branch, "--rebase"], &dir)?;
        self.git(&["push", "origin", branch], &dir)?;

        self.console.success(&format!("Deployed on branch '{branch}'"));
        Ok(())
    }

    fn rollback_stage(&self, config: &PipelineConfig) -> Result<(), StageError> {
        let dir = self.existing_working_copy(config)?;

        // Revert, never reset: the remote history stays append-only.
        self.git(&["revert", "--no-edit", "HEAD"], &dir)?;
        self.git(&["push", "origin", "HEAD"], &dir)?;

        self.console.success("Rollback finished.");
        Ok(())
    }

    fn existing_working_copy(&self, config: &PipelineConfig) -> Result<Utf8PathBuf, StageError> {
        let dir = self.layout.working_copy(config.target()?);
        if !dir.is_dir() {
            return Err(StageError::MissingWorkingCopy(dir));
        }
        Ok(dir)
    }

    fn git(&self, args: &[&str], dir: &Utf8Path) -> Result<CommandOutput, CommandError> {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push("git".to_owned());
        command.extend(args.iter().map(|arg| (*arg).to_owned()));
        self.runner.execute(&command, Some(dir))
    }
}

/// Text sent to the alert channel for a failed stage.
pub fn alert_message(stage: Stage, err: &StageError) -> String {
    match err {
        StageError::Command(CommandError::Failed { command, stderr, .. }) => {
            format!("Command failed: {}\nError: {}", command, stderr.trim())
        }
        StageError::Command(err @ CommandError::Spawn { .. }) => {
            format!("Command failed: {}\nError: {}", err.command(), err.detail())
        }
        other => format!("Unexpected error during stage '{}': {:#}", stage, other),
    }
}
