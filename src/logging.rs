//! tracing setup. The terminal belongs to the UI, so events go to a file.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{AppError, Result};

pub struct LogConfig<'a> {
    /// Level or directive for this crate when `RUST_LOG` is unset.
    pub level: &'a str,
    pub verbose: bool,
    pub file: Option<PathBuf>,
}

/// Directive used when `RUST_LOG` is unset. A bare level applies to this
/// crate only; anything containing `=` or `,` is taken as a full directive.
fn default_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("keyscope={}", level)
    }
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber. Returns the path being written to.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let path = config
        .file
        .ok_or_else(|| AppError::Logging("no log directory available".into()))?;
    let file = open_log_file(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config.level, config.verbose)))
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped_to_crate() {
        assert_eq!(default_directive("info", false), "keyscope=info");
        assert_eq!(default_directive("warn", true), "keyscope=debug");
    }

    #[test]
    fn full_directive_passes_through() {
        assert_eq!(
            default_directive("keyscope=trace,tokio=warn", false),
            "keyscope=trace,tokio=warn"
        );
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("keyscope.log");
        open_log_file(&path).expect("open");
        assert!(path.exists());
    }

    #[test]
    fn missing_path_is_a_logging_error() {
        let err = init_logging(LogConfig {
            level: "info",
            verbose: false,
            file: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Logging(_)));
    }
}
