use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

pub const VERSION_FILE: &str = "VERSION";

pub fn marker_path(working_copy: &Utf8Path) -> Utf8PathBuf {
    working_copy.join(VERSION_FILE)
}

/// Current build number, or `None` before the first build.
pub fn read(working_copy: &Utf8Path) -> Result<Option<u64>> {
    let path = marker_path(working_copy);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let value = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} does not hold a build number: {:?}", path, raw.trim()))?;
    Ok(Some(value))
}

pub fn next(working_copy: &Utf8Path) -> Result<u64> {
    match read(working_copy)? {
        None => Ok(1),
        Some(current) => current.checked_add(1).with_context(|| {
            format!(
                "{} cannot be incremented past {current}",
                marker_path(working_copy)
            )
        }),
    }
}

pub fn write(working_copy: &Utf8Path, version: u64) -> Result<()> {
    let path = marker_path(working_copy);
    fs::write(&path, version.to_string()).with_context(|| format!("writing {}", path))
}
