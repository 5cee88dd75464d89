//! Headless Chromium rendering backend on `chromiumoxide`.
//!
//! One browser, one page: the session is exclusively owned by one batch and
//! services one target at a time. No anti-detection measures are applied.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use nichefinder_core::AppConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{ElementHandle, RenderBackend, WaitCondition};
use crate::error::BackendError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser launch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromiumOptions {
    pub headless: bool,
    /// Browser executable; `None` lets `chromiumoxide` search the usual places.
    pub chrome_path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_size: (1366, 900),
        }
    }
}

impl ChromiumOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            ..Self::default()
        }
    }
}

/// A launched Chromium with a single page.
pub struct ChromiumBackend {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumBackend {
    /// Launches the browser and opens a blank page.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Launch`] if the browser cannot be started or
    /// the first page cannot be opened.
    pub async fn launch(options: &ChromiumOptions) -> Result<Self, BackendError> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window_size.0, options.window_size.1)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| BackendError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BackendError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "browser handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BackendError::Launch(format!("failed to open page: {e}")));
            }
        };

        tracing::info!(headless = options.headless, "launched chromium");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    async fn evaluate_bool(&self, script: String) -> Result<bool, String> {
        let result = self.page.evaluate(script).await.map_err(|e| e.to_string())?;
        result.into_value::<bool>().map_err(|e| e.to_string())
    }
}

/// JS expression that is `true` when `condition` holds on the current page.
fn condition_script(condition: &WaitCondition) -> String {
    // A JSON string literal is a valid JS string literal.
    let selector = serde_json::Value::String(condition.selector().to_owned()).to_string();
    let check = match condition {
        WaitCondition::Visible(_) => "visible(el)",
        WaitCondition::Clickable(_) => "visible(el) && !el.disabled",
    };
    format!(
        "(() => {{\
            const visible = (e) => {{\
                const r = e.getBoundingClientRect();\
                const s = window.getComputedStyle(e);\
                return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';\
            }};\
            const el = document.querySelector({selector});\
            if (!el) return false;\
            return {check};\
        }})()"
    )
}

/// Runs `check` every `interval` until it reports `true` or `timeout` elapses.
///
/// Check errors are tolerated while the deadline is open: the
/// execution context is torn down while a page navigates. If the last check
/// before the deadline still failed, the browser is treated as broken and
/// the error is returned instead of `Ok(false)`.
async fn poll_condition<F, Fut>(
    condition: &WaitCondition,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<bool, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, String>>,
{
    let deadline = Instant::now() + timeout;
    let mut last_error = None;

    loop {
        match check().await {
            Ok(true) => return Ok(true),
            Ok(false) => last_error = None,
            Err(e) => {
                tracing::trace!(condition = %condition, error = %e, "wait check failed");
                last_error = Some(e);
            }
        }
        if Instant::now() >= deadline {
            return match last_error {
                Some(reason) => Err(BackendError::Query {
                    selector: condition.selector().to_owned(),
                    reason,
                }),
                None => Ok(false),
            };
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(interval.min(remaining)).await;
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    type Element = ChromiumElement;

    async fn load(&self, url: &str) -> Result<(), BackendError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Navigation {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn find_element(&self, selector: &str) -> Result<Option<Self::Element>, BackendError> {
        Ok(self.find_all_elements(selector).await?.into_iter().next())
    }

    async fn find_all_elements(&self, selector: &str) -> Result<Vec<Self::Element>, BackendError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BackendError::Query {
                selector: selector.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(elements.into_iter().map(ChromiumElement).collect())
    }

    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<bool, BackendError> {
        let script = condition_script(condition);
        poll_condition(condition, timeout, POLL_INTERVAL, || {
            self.evaluate_bool(script.clone())
        })
        .await
    }

    async fn capture_snapshot(&self, path: &Path) -> Result<(), BackendError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Snapshot {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "waiting for browser exit failed");
        }
        self.handler.abort();
        closed.map(|_| ()).map_err(|e| BackendError::Close(e.to_string()))
    }
}

/// A DOM element on the Chromium page.
pub struct ChromiumElement(Element);

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn text(&self) -> Result<String, BackendError> {
        self.0
            .inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| BackendError::Element(format!("reading text: {e}")))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, BackendError> {
        self.0
            .attribute(name)
            .await
            .map_err(|e| BackendError::Element(format!("reading attribute {name}: {e}")))
    }

    async fn click(&self) -> Result<(), BackendError> {
        self.0
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Element(format!("click: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_script_quotes_selector() {
        let script = condition_script(&WaitCondition::Visible("a[title=\"x\"]".to_owned()));
        assert!(script.contains(r#"document.querySelector("a[title=\"x\"]")"#));
        assert!(script.contains("return visible(el);"));
    }

    #[test]
    fn clickable_script_checks_disabled() {
        let script = condition_script(&WaitCondition::Clickable("#sp-cc-accept".to_owned()));
        assert!(script.contains("!el.disabled"));
    }

    // -----------------------------------------------------------------------
    // poll_condition
    // -----------------------------------------------------------------------

    const TICK: Duration = Duration::from_millis(5);

    fn title_visible() -> WaitCondition {
        WaitCondition::Visible("#productTitle".to_owned())
    }

    /// A check that replays `answers` in order and repeats the last one.
    fn scripted(
        answers: Vec<Result<bool, String>>,
    ) -> impl FnMut() -> std::future::Ready<Result<bool, String>> {
        let mut answers = answers.into_iter();
        let mut last = Ok(false);
        move || {
            if let Some(answer) = answers.next() {
                last = answer;
            }
            std::future::ready(last.clone())
        }
    }

    #[tokio::test]
    async fn check_that_always_fails_is_a_backend_error() {
        let result = poll_condition(
            &title_visible(),
            Duration::from_millis(30),
            TICK,
            scripted(vec![Err("target closed".to_owned())]),
        )
        .await;

        let Err(BackendError::Query { selector, reason }) = result else {
            panic!("expected Query error, got {result:?}");
        };
        assert_eq!(selector, "#productTitle");
        assert_eq!(reason, "target closed");
    }

    #[tokio::test]
    async fn errors_during_navigation_then_false_is_a_timeout() {
        let result = poll_condition(
            &title_visible(),
            Duration::from_millis(30),
            TICK,
            scripted(vec![Err("context destroyed".to_owned()), Ok(false)]),
        )
        .await;
        assert!(matches!(result, Ok(false)), "{result:?}");
    }

    #[tokio::test]
    async fn errors_then_true_is_ready() {
        let result = poll_condition(
            &title_visible(),
            Duration::from_secs(5),
            TICK,
            scripted(vec![Err("context destroyed".to_owned()), Ok(false), Ok(true)]),
        )
        .await;
        assert!(matches!(result, Ok(true)), "{result:?}");
    }

    #[tokio::test]
    async fn zero_timeout_checks_once() {
        let mut calls = 0;
        let result = poll_condition(&title_visible(), Duration::ZERO, TICK, || {
            calls += 1;
            std::future::ready(Ok(false))
        })
        .await;
        assert!(matches!(result, Ok(false)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn options_follow_app_config() {
        let config = AppConfig {
            log_level: "info".to_owned(),
            profiles_path: None,
            diagnostics_dir: PathBuf::from("./diagnostics"),
            consent_timeout_secs: 5,
            consent_settle_ms: 1000,
            readiness_timeout_secs: 10,
            inter_target_delay_ms: 1000,
            max_retries: 0,
            retry_backoff_base_ms: 2000,
            headless: false,
            chrome_path: Some(PathBuf::from("/opt/chrome")),
        };
        let options = ChromiumOptions::from_app_config(&config);
        assert!(!options.headless);
        assert_eq!(options.chrome_path.as_deref(), Some(Path::new("/opt/chrome")));
        assert_eq!(options.window_size, ChromiumOptions::default().window_size);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn chromium_loads_and_extracts_data_url() {
        let backend = ChromiumBackend::launch(&ChromiumOptions::default())
            .await
            .expect("failed to launch chromium");

        backend
            .load("data:text/html,<h1 id='t'>Hello</h1><a class='l' href='/x'>X</a>")
            .await
            .expect("navigation failed");

        let ready = backend
            .wait_until(&WaitCondition::Visible("#t".to_owned()), Duration::from_secs(5))
            .await
            .expect("wait failed");
        assert!(ready);

        let title = backend.find_element("#t").await.unwrap().unwrap();
        assert_eq!(title.text().await.unwrap(), "Hello");
        assert!(backend.find_element("#missing").await.unwrap().is_none());

        let missing = backend
            .wait_until(
                &WaitCondition::Visible("#missing".to_owned()),
                Duration::from_millis(300),
            )
            .await
            .unwrap();
        assert!(!missing);

        backend.close().await.expect("close failed");
    }
}
