pub mod backend;
pub mod batch;
pub mod chromium;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod navigator;
mod parse;
pub mod rate_limit;
pub mod session;
pub mod types;

pub use backend::{ElementHandle, RenderBackend, WaitCondition};
pub use batch::{BatchReport, BatchRunner, TargetFailure};
pub use chromium::{ChromiumBackend, ChromiumElement, ChromiumOptions};
pub use diagnostics::DiagnosticSink;
pub use error::{BackendError, ScraperError};
pub use extract::Extractor;
pub use navigator::{NavigationTimings, Navigator};
pub use rate_limit::{IntervalPacer, NoPacing, Pacer, RetryPolicy};
pub use session::with_session;
pub use types::{
    Diagnostic, ExtractionFailure, ExtractionResult, FailureKind, NavigationOutcome, PageRecords,
    TargetState,
};
