//! Error types for template resolution and rendering.
//!
//! [`ViewError`] is the single error type returned by the public API. Errors
//! from the source backend and the template compiler are wrapped, never
//! retried and never replaced by a fallback template.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The template or layout file does not exist at the resolved path.
    #[error("template not found: \"{name}\" ({})", path.display())]
    NotFound {
        /// The logical template name that was requested.
        name: String,
        /// The path it resolved to.
        path: PathBuf,
    },

    /// Reading the template failed for a reason other than absence.
    #[error("failed to read template \"{}\": {source}", path.display())]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template text could not be compiled.
    ///
    /// Calls to unregistered functions are not caught here. MiniJinja looks
    /// functions up when the template runs, so those surface as
    /// [`ViewError::Execution`] with kind
    /// [`UnknownFunction`](minijinja::ErrorKind::UnknownFunction).
    #[error("failed to compile \"{file}\": {source}")]
    Compile {
        /// The file that failed, or `<syntax>` for delimiter errors.
        file: String,
        #[source]
        source: minijinja::Error,
    },

    /// Executing a compiled template against the supplied data failed.
    ///
    /// Output written to the sink before the failure is left in place.
    #[error("failed to render \"{template}\": {source}")]
    Execution {
        /// The cache key of the composition being executed.
        template: String,
        #[source]
        source: minijinja::Error,
    },

    /// The engine configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ViewError {
    /// Returns true if this error reports a missing template file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ViewError::NotFound { .. })
    }
}

impl From<serde_yaml::Error> for ViewError {
    fn from(err: serde_yaml::Error) -> Self {
        ViewError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ViewError::NotFound {
            name: "index".to_string(),
            path: PathBuf::from("views/index.html"),
        };
        let msg = err.to_string();
        assert!(msg.contains("template not found"));
        assert!(msg.contains("views/index.html"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;

        let err = ViewError::Io {
            path: PathBuf::from("views/locked.html"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{ not: a list").unwrap_err();
        let err: ViewError = yaml_err.into();
        assert!(matches!(err, ViewError::Config(_)));
    }
}
