use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

pub const LOGS_DIR: &str = "logs";
pub const PROJECTS_DIR: &str = "cloned_projects";

/// On-disk layout rooted at the tool's base directory.
#[derive(Clone, Debug)]
pub struct Layout {
    base: Utf8PathBuf,
    logs_dir: Utf8PathBuf,
    projects_dir: Utf8PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<Utf8PathBuf>) -> Self {
        let base = base.into();
        Self {
            logs_dir: base.join(LOGS_DIR),
            projects_dir: base.join(PROJECTS_DIR),
            base,
        }
    }

    /// Create the logs and projects directories if they are missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.logs_dir, &self.projects_dir] {
            fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir))?;
        }
        Ok(())
    }

    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    pub fn logs_dir(&self) -> &Utf8Path {
        &self.logs_dir
    }

    pub fn working_copy(&self, target: &str) -> Utf8PathBuf {
        self.projects_dir.join(target)
    }
}
