//! Page navigation: load, dismiss the consent banner, wait for readiness.

use std::time::Duration;

use nichefinder_core::{AppConfig, PageProfile};

use crate::backend::{ElementHandle, RenderBackend, WaitCondition};
use crate::diagnostics::DiagnosticSink;
use crate::types::{Diagnostic, FailureKind, NavigationOutcome};

/// The two independent wait bounds plus the post-dismissal pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTimings {
    pub consent_timeout: Duration,
    pub consent_settle: Duration,
    pub readiness_timeout: Duration,
}

impl Default for NavigationTimings {
    fn default() -> Self {
        Self {
            consent_timeout: Duration::from_secs(5),
            consent_settle: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(10),
        }
    }
}

impl NavigationTimings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            consent_timeout: config.consent_timeout(),
            consent_settle: config.consent_settle(),
            readiness_timeout: config.readiness_timeout(),
        }
    }
}

/// Drives one backend session to a target and reports whether the page is
/// ready for extraction.
pub struct Navigator<'a, B> {
    backend: &'a B,
    profile: &'a PageProfile,
    timings: NavigationTimings,
    diagnostics: &'a DiagnosticSink,
}

impl<'a, B: RenderBackend> Navigator<'a, B> {
    #[must_use]
    pub fn new(
        backend: &'a B,
        profile: &'a PageProfile,
        timings: NavigationTimings,
        diagnostics: &'a DiagnosticSink,
    ) -> Self {
        Self {
            backend,
            profile,
            timings,
            diagnostics,
        }
    }

    /// Loads `target` and waits for the profile's readiness selector.
    ///
    /// A missing consent banner is not a failure. A readiness wait that
    /// elapses yields [`NavigationOutcome::Timeout`], or
    /// [`NavigationOutcome::CaptchaSuspected`] when a robot-check marker is on
    /// the page. Backend errors yield [`NavigationOutcome::Error`] with a
    /// snapshot of whatever the page shows.
    pub async fn navigate(&self, target: &str) -> NavigationOutcome {
        tracing::debug!(url = target, profile = %self.profile.name, "navigating");

        if let Err(e) = self.backend.load(target).await {
            let diagnostic = self
                .diagnose(target, FailureKind::BackendError, e.to_string())
                .await;
            return NavigationOutcome::Error(diagnostic);
        }

        self.dismiss_consent(target).await;

        let readiness = WaitCondition::Visible(self.profile.readiness.selector.clone());
        let timeout = self
            .profile
            .readiness
            .timeout_secs
            .map_or(self.timings.readiness_timeout, Duration::from_secs);

        match self.backend.wait_until(&readiness, timeout).await {
            Ok(true) => NavigationOutcome::Ready,
            Ok(false) => self.classify_timeout(target, timeout).await,
            Err(e) => {
                let diagnostic = self
                    .diagnose(
                        target,
                        FailureKind::BackendError,
                        format!("waiting for {readiness}: {e}"),
                    )
                    .await;
                NavigationOutcome::Error(diagnostic)
            }
        }
    }

    /// Clicks the consent control if it becomes clickable within the consent
    /// bound. Every path through here continues navigation.
    async fn dismiss_consent(&self, target: &str) {
        let Some(consent) = &self.profile.consent else {
            return;
        };
        let timeout = consent
            .timeout_secs
            .map_or(self.timings.consent_timeout, Duration::from_secs);
        if timeout.is_zero() {
            return;
        }

        let condition = WaitCondition::Clickable(consent.dismiss_selector.clone());
        match self.backend.wait_until(&condition, timeout).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(url = target, "no consent banner");
                return;
            }
            Err(e) => {
                tracing::warn!(url = target, error = %e, "consent banner check failed; continuing");
                return;
            }
        }

        let element = match self.backend.find_element(&consent.dismiss_selector).await {
            Ok(Some(element)) => element,
            Ok(None) => {
                tracing::debug!(url = target, "consent control vanished before click");
                return;
            }
            Err(e) => {
                tracing::warn!(url = target, error = %e, "consent control lookup failed; continuing");
                return;
            }
        };

        match element.click().await {
            Ok(()) => {
                tracing::debug!(url = target, "dismissed consent banner");
                if !self.timings.consent_settle.is_zero() {
                    tokio::time::sleep(self.timings.consent_settle).await;
                }
            }
            Err(e) => {
                tracing::warn!(url = target, error = %e, "consent click failed; continuing");
            }
        }
    }

    /// Distinguishes a slow page from a robot check after readiness elapsed.
    async fn classify_timeout(&self, target: &str, waited: Duration) -> NavigationOutcome {
        for marker in &self.profile.captcha_markers {
            match self.backend.find_element(marker).await {
                Ok(Some(_)) => {
                    let diagnostic = self
                        .diagnose(
                            target,
                            FailureKind::CaptchaSuspected,
                            format!("robot-check marker \"{marker}\" present"),
                        )
                        .await;
                    return NavigationOutcome::CaptchaSuspected(diagnostic);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(url = target, marker = %marker, error = %e, "captcha marker check failed");
                }
            }
        }

        tracing::debug!(
            url = target,
            waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            selector = %self.profile.readiness.selector,
            "readiness selector never became visible"
        );
        NavigationOutcome::Timeout
    }

    async fn diagnose(&self, target: &str, kind: FailureKind, message: String) -> Diagnostic {
        let snapshot = self.diagnostics.capture(self.backend, target, kind).await;
        Diagnostic::new(message).with_snapshot(snapshot)
    }
}
