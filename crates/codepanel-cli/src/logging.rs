// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Where log lines go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn init(target: &LogTarget) -> Result<()> {
    let filter = env_filter();
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            registry
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .try_init()
        }
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

pub fn default_log_path() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory for the log file; set XDG_DATA_HOME or HOME")
    })?;
    Ok(data_root.join(codepanel_db::APP_NAME).join("codepanel.log"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{default_log_path, open_log_file};
    use anyhow::Result;
    use std::io::Write;

    #[test]
    fn log_file_is_created_with_parents_and_appended() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("codepanel.log");
        writeln!(open_log_file(&path)?, "first")?;
        writeln!(open_log_file(&path)?, "second")?;
        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn default_log_path_lives_in_app_dir() -> Result<()> {
        let path = default_log_path()?;
        assert!(path.ends_with("codepanel/codepanel.log"));
        Ok(())
    }
}
