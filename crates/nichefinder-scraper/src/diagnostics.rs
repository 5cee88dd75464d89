//! Diagnostic snapshots of pages that failed unexpectedly.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::RenderBackend;
use crate::types::FailureKind;

const MAX_SLUG_LEN: usize = 60;

/// Decides where snapshots go and captures them through the backend.
///
/// Capture is best-effort: a failed capture is logged and yields `None`, it
/// never changes the outcome being diagnosed.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    dir: Option<PathBuf>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A sink that never captures.
    #[must_use]
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// `<dir>/<kind>-<url-slug>-<unix-millis>.png`, or `None` when disabled.
    #[must_use]
    pub fn snapshot_path(&self, target: &str, kind: FailureKind) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Some(dir.join(format!("{kind}-{}-{millis}.png", url_slug(target))))
    }

    /// Captures the backend's current page for `target`.
    pub async fn capture<B: RenderBackend>(
        &self,
        backend: &B,
        target: &str,
        kind: FailureKind,
    ) -> Option<PathBuf> {
        let path = self.snapshot_path(target, kind)?;

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(dir = %parent.display(), error = %e, "cannot create diagnostics directory");
                return None;
            }
        }

        match backend.capture_snapshot(&path).await {
            Ok(()) => {
                tracing::info!(url = target, snapshot = %path.display(), "saved diagnostic snapshot");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(url = target, error = %e, "diagnostic snapshot failed");
                None
            }
        }
    }
}

/// Host and path of `target` reduced to `[a-z0-9-]`, capped in length.
fn url_slug(target: &str) -> String {
    let without_scheme = target.split_once("://").map_or(target, |(_, rest)| rest);
    let without_query = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);

    let mut slug = String::with_capacity(without_query.len());
    let mut last_dash = true;
    for c in without_query.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    if slug.is_empty() {
        "page".to_owned()
    } else {
        slug
    }
}
