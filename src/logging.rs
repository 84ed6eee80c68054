use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

static ACTIVE_LOG_FILE: OnceCell<Option<PathBuf>> = OnceCell::new();

/// Initialise logging. `debug` selects the `debug` level and lets `RUST_LOG`
/// override it; otherwise the level is fixed at `info`. With `log_file` set,
/// output goes to that file instead of stdout.
///
/// Only the first call installs a subscriber; later calls return `false`.
pub fn init(debug: bool, log_file: Option<PathBuf>) -> bool {
    // Without debug logging `RUST_LOG` is ignored so a stray variable in the
    // environment cannot turn on verbose output.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let appender = log_file.as_deref().and_then(split_log_path).and_then(|(dir, name)| {
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(name)
            .build(dir)
            .map_err(|err| eprintln!("log file {} unavailable: {err}", dir.join(name).display()))
            .ok()
    });

    let file_target = if appender.is_some() { log_file } else { None };
    let installed = match appender {
        Some(appender) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(appender)
            .try_init()
            .is_ok(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
    };

    if installed {
        let _ = ACTIVE_LOG_FILE.set(file_target);
    }
    installed
}

/// The file the installed subscriber writes to, if any.
pub fn active_log_file() -> Option<&'static Path> {
    ACTIVE_LOG_FILE.get().and_then(|path| path.as_deref())
}

fn split_log_path(path: &Path) -> Option<(&Path, &str)> {
    let name = path.file_name()?.to_str()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        let (dir, name) = split_log_path(Path::new("scan.log")).expect("split");
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "scan.log");
        assert!(split_log_path(Path::new("/")).is_none());
    }
}
