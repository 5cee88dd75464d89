use thiserror::Error;

/// Failure reported by a rendering backend call.
///
/// A missing element is not a `BackendError`; lookups report absence as
/// `Ok(None)` or an empty list.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("failed to launch rendering backend: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("query for \"{selector}\" failed: {reason}")]
    Query { selector: String, reason: String },

    #[error("element operation failed: {0}")]
    Element(String),

    #[error("failed to capture snapshot to {path}: {reason}")]
    Snapshot { path: String, reason: String },

    #[error("failed to close rendering backend: {0}")]
    Close(String),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid pattern for field {field}: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("pattern for field {field} has no capture group: {pattern}")]
    PatternWithoutCapture { field: &'static str, pattern: String },

    #[error("profile '{profile}' has {found} fields; expected {expected}")]
    ProfileMismatch {
        profile: String,
        expected: &'static str,
        found: &'static str,
    },
}
