use std::fs::{self, File};
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

pub const LOG_PREFIX: &str = "deployer_";
pub const LOG_SUFFIX: &str = ".log";
pub const KEEP_LOGS: usize = 10;

static INIT: OnceLock<()> = OnceLock::new();

/// Path of the log file for a run started at `now`.
pub fn log_file_path(logs_dir: &Utf8Path, now: DateTime<Local>) -> Utf8PathBuf {
    logs_dir.join(format!(
        "{LOG_PREFIX}{}{LOG_SUFFIX}",
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Initialize logging backends using `tracing`: console plus a plain-text
/// log file. Only the first call installs the subscriber.
pub fn init(log_file: &Utf8Path) -> Result<()> {
    let file =
        File::create(log_file).with_context(|| format!("creating log file {}", log_file))?;

    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .with(file_layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            // Ignore error if a subscriber is already set (e.g., tests).
        }
    });
    Ok(())
}

/// Delete all but the `keep` most recently modified run logs in `logs_dir`.
/// Returns the number of files removed.
pub fn rotate(logs_dir: &Utf8Path, keep: usize) -> Result<usize> {
    let mut logs: Vec<(SystemTime, Utf8PathBuf)> = Vec::new();
    for entry in fs::read_dir(logs_dir).with_context(|| format!("listing {}", logs_dir))? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(LOG_PREFIX) && name.ends_with(LOG_SUFFIX)) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, logs_dir.join(name.as_ref())));
    }

    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => tracing::warn!(path = %path, error = %err, "could not remove old log"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn log_file_name_embeds_timestamp() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let path = log_file_path(Utf8Path::new("/tmp/logs"), now);
        assert_eq!(path, Utf8PathBuf::from("/tmp/logs/deployer_20260304_050607.log"));
    }

    #[test]
    fn rotate_keeps_newest_logs_only() {
        let dir = tempfile::tempdir().unwrap();
        let logs = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        for i in 0..13u64 {
            let path = logs.join(format!("deployer_{i:02}.log"));
            let file = File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i * 10)).unwrap();
        }
        fs::write(logs.join("notes.txt"), "keep me").unwrap();

        assert_eq!(rotate(&logs, KEEP_LOGS).unwrap(), 3);

        for i in 0..3 {
            assert!(!logs.join(format!("deployer_{i:02}.log")).exists());
        }
        for i in 3..13 {
            assert!(logs.join(format!("deployer_{i:02}.log")).exists());
        }
        assert!(logs.join("notes.txt").exists());
    }

    #[test]
    fn rotate_is_a_no_op_under_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let logs = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        File::create(logs.join("deployer_only.log")).unwrap();
        assert_eq!(rotate(&logs, KEEP_LOGS).unwrap(), 0);
    }
}
