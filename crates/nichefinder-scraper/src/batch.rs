//! Batch aggregation: navigate and extract each target in order, collecting
//! records and recording per-target failures.

use nichefinder_core::{CategoryRecord, PageProfile, ProductRecord, Record};

use crate::backend::RenderBackend;
use crate::diagnostics::DiagnosticSink;
use crate::error::ScraperError;
use crate::extract::Extractor;
use crate::navigator::{NavigationTimings, Navigator};
use crate::rate_limit::{retry_with_backoff, NoPacing, Pacer, RetryPolicy};
use crate::types::{
    Diagnostic, ExtractionFailure, FailureKind, NavigationOutcome, PageRecords, TargetState,
};

/// One target that produced no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    /// Position of the target in the input sequence.
    pub index: usize,
    pub url: String,
    pub kind: FailureKind,
    pub diagnostic: Diagnostic,
}

/// Everything a batch produced.
///
/// `records` and `failures` are both in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub records: Vec<Record>,
    pub failures: Vec<TargetFailure>,
    pub attempted: usize,
}

impl BatchReport {
    /// Targets that yielded a page result. A directory page with zero valid
    /// links still counts as a success.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.attempted.saturating_sub(self.failures.len())
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter().filter_map(Record::as_product)
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryRecord> {
        self.records.iter().filter_map(Record::as_category)
    }

    #[must_use]
    pub fn into_products(self) -> Vec<ProductRecord> {
        self.records
            .into_iter()
            .filter_map(|r| match r {
                Record::Product(p) => Some(p),
                Record::Category(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn into_categories(self) -> Vec<CategoryRecord> {
        self.records
            .into_iter()
            .filter_map(|r| match r {
                Record::Category(c) => Some(c),
                Record::Product(_) => None,
            })
            .collect()
    }
}

/// Runs navigator and extractor over a target list against one backend
/// session, strictly one target at a time.
pub struct BatchRunner<'a, B, P = NoPacing> {
    backend: &'a B,
    timings: NavigationTimings,
    diagnostics: DiagnosticSink,
    retry: RetryPolicy,
    pacer: P,
}

impl<'a, B: RenderBackend> BatchRunner<'a, B, NoPacing> {
    /// Default timings, no pacing, no retries and no snapshots.
    #[must_use]
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            timings: NavigationTimings::default(),
            diagnostics: DiagnosticSink::disabled(),
            retry: RetryPolicy::none(),
            pacer: NoPacing,
        }
    }
}

impl<'a, B: RenderBackend, P: Pacer> BatchRunner<'a, B, P> {
    #[must_use]
    pub fn with_timings(mut self, timings: NavigationTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticSink) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_pacer<Q: Pacer>(self, pacer: Q) -> BatchRunner<'a, B, Q> {
        BatchRunner {
            backend: self.backend,
            timings: self.timings,
            diagnostics: self.diagnostics,
            retry: self.retry,
            pacer,
        }
    }

    /// Processes `targets` in input order with `profile`.
    ///
    /// A failing target is recorded in [`BatchReport::failures`] and never
    /// stops the batch. A batch with zero successes is an empty report, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] only when `profile` cannot be compiled, before
    /// any target is visited.
    pub async fn run_batch<S: AsRef<str>>(
        &mut self,
        targets: &[S],
        profile: &PageProfile,
    ) -> Result<BatchReport, ScraperError> {
        let extractor = Extractor::new(profile)?;
        let navigator = Navigator::new(self.backend, profile, self.timings, &self.diagnostics);
        let mut report = BatchReport {
            attempted: targets.len(),
            ..BatchReport::default()
        };

        tracing::info!(
            profile = %profile.name,
            targets = targets.len(),
            "starting batch"
        );

        for (index, target) in targets.iter().enumerate() {
            let url = target.as_ref();
            log_state(index, url, TargetState::Pending);
            self.pacer.wait_turn().await;

            let navigator = &navigator;
            let extractor = &extractor;
            let backend = self.backend;
            let diagnostics = &self.diagnostics;
            let outcome = retry_with_backoff(self.retry, move |attempt| {
                attempt_target(navigator, extractor, backend, diagnostics, index, url, attempt)
            })
            .await;

            match outcome {
                Ok(page) => {
                    let records = page.into_records();
                    tracing::info!(index, url, records = records.len(), "target succeeded");
                    report.records.extend(records);
                }
                Err(failure) => {
                    tracing::warn!(
                        index,
                        url,
                        kind = %failure.kind,
                        diagnostic = %failure.diagnostic,
                        "target failed"
                    );
                    report.failures.push(TargetFailure {
                        index,
                        url: url.to_owned(),
                        kind: failure.kind,
                        diagnostic: failure.diagnostic,
                    });
                }
            }
        }

        tracing::info!(
            profile = %profile.name,
            attempted = report.attempted,
            succeeded = report.succeeded(),
            failed = report.failed(),
            records = report.records.len(),
            "batch complete"
        );
        Ok(report)
    }
}

/// One attempt at one target: navigate, then extract on `Ready`.
async fn attempt_target<B: RenderBackend>(
    navigator: &Navigator<'_, B>,
    extractor: &Extractor,
    backend: &B,
    diagnostics: &DiagnosticSink,
    index: usize,
    url: &str,
    attempt: u32,
) -> Result<PageRecords, ExtractionFailure> {
    if attempt > 0 {
        tracing::debug!(index, url, attempt, "retrying target");
    }
    log_state(index, url, TargetState::Navigating);

    let failure = match navigator.navigate(url).await {
        NavigationOutcome::Ready => None,
        NavigationOutcome::Timeout => Some((
            TargetState::TimedOut,
            ExtractionFailure::new(
                FailureKind::NavigationTimeout,
                "page readiness selector not visible before timeout",
            ),
        )),
        NavigationOutcome::CaptchaSuspected(diagnostic) => Some((
            TargetState::Failed,
            ExtractionFailure {
                kind: FailureKind::CaptchaSuspected,
                diagnostic,
            },
        )),
        NavigationOutcome::Error(diagnostic) => Some((
            TargetState::NavError,
            ExtractionFailure {
                kind: FailureKind::BackendError,
                diagnostic,
            },
        )),
    };
    if let Some((state, failure)) = failure {
        log_state(index, url, state);
        return Err(failure);
    }

    log_state(index, url, TargetState::Extracting);
    let result = extractor.extract(backend, url, diagnostics).await;
    log_state(
        index,
        url,
        if result.is_ok() {
            TargetState::Succeeded
        } else {
            TargetState::Failed
        },
    );
    result
}

fn log_state(index: usize, url: &str, state: TargetState) {
    tracing::trace!(
        index,
        url,
        state = ?state,
        terminal = state.is_terminal(),
        "target state"
    );
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(title: &str) -> Record {
        Record::Product(
            ProductRecord::new(title, Decimal::new(350, 0), 10, Some(5), "https://x.test/dp/1")
                .unwrap(),
        )
    }

    fn category(name: &str) -> Record {
        Record::Category(CategoryRecord::new(name, "https://x.test/b?node=1").unwrap())
    }

    #[test]
    fn counts_derive_from_attempted_and_failures() {
        let report = BatchReport {
            records: vec![product("A")],
            failures: vec![TargetFailure {
                index: 1,
                url: "https://x.test/dp/2".to_owned(),
                kind: FailureKind::NavigationTimeout,
                diagnostic: Diagnostic::new("timeout"),
            }],
            attempted: 2,
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn typed_accessors_split_records() {
        let report = BatchReport {
            records: vec![product("A"), category("Books"), product("B")],
            failures: vec![],
            attempted: 3,
        };
        let titles: Vec<&str> = report.products().map(ProductRecord::title).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(report.categories().count(), 1);

        let products = report.clone().into_products();
        assert_eq!(products.len(), 2);
        let categories = report.into_categories();
        assert_eq!(categories[0].name(), "Books");
    }

    #[test]
    fn empty_report_is_empty() {
        let report = BatchReport::default();
        assert!(report.is_empty());
        assert_eq!(report.succeeded(), 0);
    }
}
