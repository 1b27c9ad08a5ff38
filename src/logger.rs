//! Session logger: routes `tracing` events to a single file in the OS data directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\retouch\retouch.log`
//!   Linux:    `~/.local/share/retouch/retouch.log`
//!   macOS:    `~/Library/Application Support/retouch/retouch.log`
//!
//! Headless runs use [`init_stderr`] instead. Whichever initialiser runs
//! first wins; later calls are ignored.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing::Level;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static PANIC_FILE: OnceLock<Mutex<File>> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Initialise the file logger.
///
/// * Creates (or truncates) the log file.
/// * Installs a `tracing` subscriber writing to it at `DEBUG` and above.
/// * Installs a panic hook that writes the panic message to the log before
///   propagating to the default handler.
pub fn init() {
    if LOG_PATH.get().is_some() {
        return;
    }
    let path = log_file_path();

    let file = match create_log_file(&path) {
        Ok(f) => f,
        Err(e) => {
            // Can't open log file: not fatal, fall back to stderr
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            init_stderr(false);
            return;
        }
    };
    let panic_file = file.try_clone().ok();

    let installed = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .with_max_level(Level::DEBUG)
        .try_init()
        .is_ok();
    if !installed {
        return;
    }
    let _ = LOG_PATH.set(path.clone());
    if let Some(f) = panic_file {
        let _ = PANIC_FILE.set(Mutex::new(f));
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log = %path.display(),
        "=== retouch session started ==="
    );

    // Mirror panics to the log, then run the default handler
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(mutex) = PANIC_FILE.get()
            && let Ok(mut file) = mutex.lock()
        {
            let _ = writeln!(file, "PANIC: {}", info);
        }
        prev(info);
    }));
}

/// Initialise logging to stderr. `verbose` lowers the level from `WARN` to `DEBUG`.
pub fn init_stderr(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .try_init();
}

/// Create (or truncate) the log file at `path`, making parent folders as needed.
fn create_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn log_file_path() -> PathBuf {
    data_dir().join("retouch").join("retouch.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort: current working directory
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_app_folder() {
        let path = log_file_path();
        assert!(path.ends_with("retouch/retouch.log"));
    }

    #[test]
    fn log_file_is_created_then_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retouch").join("retouch.log");

        let mut first = create_log_file(&path).unwrap();
        writeln!(first, "previous session").unwrap();
        drop(first);
        assert!(fs::metadata(&path).unwrap().len() > 0);

        create_log_file(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn repeated_init_is_ignored() {
        init_stderr(false);
        init_stderr(true);
        tracing::debug!("still alive");
    }
}
