use thiserror::Error;

use crate::browse::ViewId;
use crate::keyspace::backend::BackendError;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from config, fixture or log files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// A scan request was rejected; accumulated state is unchanged.
    #[error("Scan failed for {view} view: {source}")]
    Scan {
        view: ViewId,
        #[source]
        source: BackendError,
    },

    /// A metadata batch could not be fetched.
    #[error("Metadata fetch failed: {0}")]
    Hydration(#[source] BackendError),

    /// The background tree worker crashed or was unavailable.
    #[error("Tree build failed: {0}")]
    TreeBuild(String),

    /// A key match pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A keyspace fixture file could not be parsed.
    #[error("Invalid keyspace fixture: {0}")]
    Fixture(String),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn scan_error_names_the_view() {
        let err = AppError::Scan {
            view: ViewId::Tree,
            source: BackendError::Unavailable("timeout".into()),
        };
        assert_eq!(
            err.to_string(),
            "Scan failed for tree view: backend unavailable: timeout"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn terminal_error_display() {
        let err = AppError::Terminal("failed to enter raw mode".into());
        assert_eq!(err.to_string(), "Terminal error: failed to enter raw mode");
    }
}
