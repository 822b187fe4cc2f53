use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;

use crate::cli::Cli;
use crate::config::{self, DEFAULT_CONFIG_FILE, PipelineConfig};
use crate::console::Console;
use crate::engine::StageEngine;
use crate::layout::Layout;
use crate::process::SystemRunner;
use crate::{alert, logging};

pub fn run(cli: Cli) -> Result<()> {
    let console = Console::new(cli.no_color);
    let layout = Layout::new(resolve_base_dir(cli.base_dir)?);
    layout.ensure()?;

    let log_file = logging::log_file_path(layout.logs_dir(), Local::now());
    logging::init(&log_file)?;
    let removed = logging::rotate(layout.logs_dir(), logging::KEEP_LOGS)?;
    tracing::debug!(log_file = %log_file, removed, "logging initialized");

    let config_path = match cli.file {
        Some(path) => utf8(path)?,
        None => layout.base().join(DEFAULT_CONFIG_FILE),
    };
    let config = load_config(&config_path, &console)?;

    let sink = alert::from_config(&config, console);
    let engine = StageEngine::new(SystemRunner, sink, layout, console);
    engine
        .run(cli.stage, &config)
        .with_context(|| format!("stage `{}` failed", cli.stage))
}

fn load_config(path: &Utf8Path, console: &Console) -> Result<PipelineConfig> {
    match config::load_from_path(path) {
        Ok(config) => {
            tracing::info!(path = %path, "configuration loaded");
            Ok(config)
        }
        Err(err) => {
            console.error(&format!("{err}"));
            tracing::error!(path = %path, error = %err, "configuration unavailable");
            Err(err.into())
        }
    }
}

fn resolve_base_dir(base_dir: Option<PathBuf>) -> Result<Utf8PathBuf> {
    match base_dir {
        Some(path) => utf8(path),
        None => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            utf8(cwd)
        }
    }
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| anyhow!("path {} must be valid UTF-8", path.display()))
}
