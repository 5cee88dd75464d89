use std::fmt;
use std::path::PathBuf;

use nichefinder_core::{CategoryRecord, ProductRecord, Record};
use serde::Serialize;

/// Why a target produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The readiness selector never became visible.
    NavigationTimeout,
    /// The rendering backend failed mid-navigation or mid-query.
    BackendError,
    /// The title was absent.
    MissingRequiredField,
    /// A required numeric field was present but unparsable.
    ParseError,
    /// The page looks like a robot check. Reported, never solved.
    CaptchaSuspected,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NavigationTimeout => "navigation_timeout",
            FailureKind::BackendError => "backend_error",
            FailureKind::MissingRequiredField => "missing_required_field",
            FailureKind::ParseError => "parse_error",
            FailureKind::CaptchaSuspected => "captcha_suspected",
        }
    }

    /// Transient kinds are worth another attempt; the rest would fail the
    /// same way against the same page.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::NavigationTimeout | FailureKind::BackendError)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable detail plus the snapshot captured at failure time, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub snapshot: Option<PathBuf>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            snapshot: None,
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Option<PathBuf>) -> Self {
        self.snapshot = snapshot;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.snapshot {
            Some(path) => write!(f, "{} (snapshot: {})", self.message, path.display()),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of driving the backend to a target and waiting for readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Ready,
    Timeout,
    CaptchaSuspected(Diagnostic),
    Error(Diagnostic),
}

/// A failed extraction: the kind plus its diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub diagnostic: Diagnostic,
}

impl ExtractionFailure {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            diagnostic: Diagnostic::new(message),
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.diagnostic)
    }
}

/// What one page yielded: a single product, or every valid link on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRecords {
    Product(ProductRecord),
    Categories(Vec<CategoryRecord>),
}

impl PageRecords {
    /// Flattens into the batch's record sequence, preserving link order.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            PageRecords::Product(p) => vec![Record::Product(p)],
            PageRecords::Categories(links) => links.into_iter().map(Record::Category).collect(),
        }
    }
}

pub type ExtractionResult = Result<PageRecords, ExtractionFailure>;

/// Per-target progress inside a batch. Terminal states are
/// `Succeeded`, `Failed`, `TimedOut` and `NavError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Navigating,
    Extracting,
    Succeeded,
    Failed,
    TimedOut,
    NavError,
}

impl TargetState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TargetState::Succeeded | TargetState::Failed | TargetState::TimedOut | TargetState::NavError
        )
    }
}
