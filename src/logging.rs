use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub debug: bool,
    pub json: bool,
    pub target: LogTarget,
}

/// The interactive panel owns the terminal, so its logs go to a file.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("traymon").join("traymon.log"))
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
pub fn env_filter(debug: bool) -> EnvFilter {
    let fallback = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init(options: &LogOptions) -> Result<()> {
    let writer = match &options.target {
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::File(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
    };
    let ansi = options.target == LogTarget::Stderr && !options.json;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(options.debug))
        .with_ansi(ansi)
        .with_writer(writer);

    let installed = if options.json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_with_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("traymon-log-{}", std::process::id()));
        let path = dir.join("nested").join("traymon.log");
        let _ = fs::remove_dir_all(&dir);

        open_log_file(&path).unwrap();
        assert!(path.exists());
        // Appends instead of truncating
        open_log_file(&path).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_log_path_lives_under_traymon() {
        if let Some(path) = default_log_path() {
            assert!(path.ends_with("traymon/traymon.log"));
        }
    }
}
