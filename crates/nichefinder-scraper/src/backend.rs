//! Rendering backend abstraction.
//!
//! The navigator and extractor only talk to a live page through these
//! traits. [`crate::chromium`] provides the production implementation; tests
//! script pages in memory.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

/// A condition to wait for on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// The first match is rendered with a non-empty box and not hidden.
    Visible(String),
    /// The first match is visible and not disabled.
    Clickable(String),
}

impl WaitCondition {
    #[must_use]
    pub fn selector(&self) -> &str {
        match self {
            WaitCondition::Visible(s) | WaitCondition::Clickable(s) => s,
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Visible(s) => write!(f, "visible({s})"),
            WaitCondition::Clickable(s) => write!(f, "clickable({s})"),
        }
    }
}

/// A live element on the rendered page.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Visible text of the element.
    async fn text(&self) -> Result<String, BackendError>;
    /// Value of the named attribute, `None` when the attribute is not set.
    async fn attribute(&self, name: &str) -> Result<Option<String>, BackendError>;
    async fn click(&self) -> Result<(), BackendError>;
}

/// One exclusively-owned page-rendering session.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    type Element: ElementHandle;

    /// Navigate the session to `url`.
    async fn load(&self, url: &str) -> Result<(), BackendError>;

    /// First element matching `selector`, `None` when nothing matches.
    async fn find_element(&self, selector: &str) -> Result<Option<Self::Element>, BackendError>;

    /// Every element matching `selector`, in document order.
    async fn find_all_elements(&self, selector: &str) -> Result<Vec<Self::Element>, BackendError>;

    /// Waits up to `timeout` for `condition`. `Ok(false)` means the wait
    /// elapsed without the condition holding.
    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<bool, BackendError>;

    /// Writes a visual snapshot of the current page to `path`.
    async fn capture_snapshot(&self, path: &Path) -> Result<(), BackendError>;

    /// Releases the session. Called exactly once by [`crate::session::with_session`].
    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
