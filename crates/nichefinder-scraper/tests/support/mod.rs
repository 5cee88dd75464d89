//! In-memory rendering backend for driving the navigator, extractor and
//! batch runner without a browser.
//!
//! Each URL maps to one or more scripted pages; the n-th load of a URL shows
//! the n-th page (the last one repeats). Waits resolve immediately; each
//! wait's condition and bound are journaled.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nichefinder_core::{FieldSelectorConfig, PageProfile, Profiles};
use nichefinder_scraper::{
    BackendError, ElementHandle, NavigationTimings, RenderBackend, WaitCondition,
};

pub const TITLE: &str = "#productTitle";
pub const PRICE: &str = "span.a-price-whole";
pub const REVIEWS: &str = "#acrCustomerReviewText";
pub const CONSENT: &str = "#sp-cc-accept";
pub const DIRECTORY_LINK: &str = "div.fsdDeptCol a";
pub const CAPTCHA: &str = "#captchacharacters";

/// Rank candidate selector of the built-in product profile.
pub fn rank_candidates() -> String {
    match Profiles::default().product.fields {
        FieldSelectorConfig::Product { rank: Some(rank), .. } => rank.candidates,
        _ => unreachable!("default product profile has a rank selector"),
    }
}

pub fn product_profile() -> PageProfile {
    Profiles::default().product
}

pub fn directory_profile() -> PageProfile {
    Profiles::default().category_directory
}

/// No settle pause; the scripted waits never block anyway.
pub fn fast_timings() -> NavigationTimings {
    NavigationTimings {
        consent_timeout: Duration::from_secs(5),
        consent_settle: Duration::ZERO,
        readiness_timeout: Duration::from_secs(10),
    }
}

// ---------------------------------------------------------------------------
// Scripted pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    text: Option<String>,
    attributes: HashMap<String, String>,
    click_fails: bool,
}

impl FakeElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_owned()),
            ..Self::default()
        }
    }

    pub fn link(text: &str, href: &str) -> Self {
        Self::text(text).with_attribute("href", href)
    }

    /// An element whose text cannot be read.
    pub fn broken() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
    visible: HashSet<String>,
    clickable: HashSet<String>,
    failing_queries: HashSet<String>,
    failing_waits: HashSet<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element under `selector` and marks the selector visible.
    pub fn with(mut self, selector: &str, element: FakeElement) -> Self {
        self.elements
            .entry(selector.to_owned())
            .or_default()
            .push(element);
        self.visible.insert(selector.to_owned());
        self
    }

    /// Adds an element that is in the DOM but never becomes visible.
    pub fn with_hidden(mut self, selector: &str, element: FakeElement) -> Self {
        self.elements
            .entry(selector.to_owned())
            .or_default()
            .push(element);
        self
    }

    /// A clickable consent banner.
    pub fn with_consent(mut self) -> Self {
        self = self.with(CONSENT, FakeElement::text("Accept"));
        self.clickable.insert(CONSENT.to_owned());
        self
    }

    pub fn with_failing_consent_click(mut self) -> Self {
        self = self.with(CONSENT, FakeElement::text("Accept").failing_click());
        self.clickable.insert(CONSENT.to_owned());
        self
    }

    pub fn failing_query(mut self, selector: &str) -> Self {
        self.failing_queries.insert(selector.to_owned());
        self
    }

    pub fn failing_wait(mut self, selector: &str) -> Self {
        self.failing_waits.insert(selector.to_owned());
        self
    }

    /// A product page with the built-in profile's selectors.
    pub fn product(title: &str, price: Option<&str>, reviews: Option<&str>) -> Self {
        let mut page = Self::new().with(TITLE, FakeElement::text(title));
        if let Some(price) = price {
            page = page.with(PRICE, FakeElement::text(price));
        }
        if let Some(reviews) = reviews {
            page = page.with(REVIEWS, FakeElement::text(reviews));
        }
        page
    }

    /// Adds a detail bullet to the rank candidates.
    pub fn with_bullet(self, text: &str) -> Self {
        self.with(&rank_candidates(), FakeElement::text(text))
    }

    /// A page whose product title exists but never becomes visible.
    pub fn never_ready() -> Self {
        Self::new().with_hidden(TITLE, FakeElement::text("slow"))
    }

    /// A robot-check page.
    pub fn captcha() -> Self {
        Self::new().with(CAPTCHA, FakeElement::text(""))
    }

    /// A directory page listing `links` as `(text, href)`.
    pub fn directory(links: &[(&str, &str)]) -> Self {
        links.iter().fold(Self::new(), |page, (text, href)| {
            page.with(DIRECTORY_LINK, FakeElement::link(text, href))
        })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Journal {
    pub loads: Vec<String>,
    pub clicks: Vec<String>,
    pub snapshots: Vec<PathBuf>,
    pub waits: Vec<(WaitCondition, Duration)>,
    pub closes: usize,
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, Vec<FakePage>>,
    load_counts: HashMap<String, usize>,
    failing_loads: HashSet<String>,
    current: Option<FakePage>,
    snapshot_fails: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `page` for every load of `url`.
    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.pages(url, vec![page])
    }

    /// Serves `pages` for successive loads of `url`.
    pub fn pages(self, url: &str, pages: Vec<FakePage>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_owned(), pages);
        self
    }

    /// Loading `url` fails with a navigation error.
    pub fn failing_load(self, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_loads
            .insert(url.to_owned());
        self
    }

    pub fn failing_snapshots(self) -> Self {
        self.state.lock().unwrap().snapshot_fails = true;
        self
    }

    pub fn loads(&self) -> Vec<String> {
        self.journal.lock().unwrap().loads.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.journal.lock().unwrap().clicks.clone()
    }

    pub fn snapshots(&self) -> Vec<PathBuf> {
        self.journal.lock().unwrap().snapshots.clone()
    }

    /// Every wait issued, with the bound it was given.
    pub fn waits(&self) -> Vec<(WaitCondition, Duration)> {
        self.journal.lock().unwrap().waits.clone()
    }

    pub fn closes(&self) -> usize {
        self.journal.lock().unwrap().closes
    }

    fn current(&self) -> FakePage {
        self.state
            .lock()
            .unwrap()
            .current
            .clone()
            .unwrap_or_default()
    }
}

pub struct ScriptedElement {
    selector: String,
    element: FakeElement,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl ElementHandle for ScriptedElement {
    async fn text(&self) -> Result<String, BackendError> {
        self.element
            .text
            .clone()
            .ok_or_else(|| BackendError::Element(format!("stale element {}", self.selector)))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, BackendError> {
        Ok(self.element.attributes.get(name).cloned())
    }

    async fn click(&self) -> Result<(), BackendError> {
        if self.element.click_fails {
            return Err(BackendError::Element("element not interactable".to_owned()));
        }
        self.journal
            .lock()
            .unwrap()
            .clicks
            .push(self.selector.clone());
        Ok(())
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    type Element = ScriptedElement;

    async fn load(&self, url: &str) -> Result<(), BackendError> {
        self.journal.lock().unwrap().loads.push(url.to_owned());
        let mut state = self.state.lock().unwrap();

        if state.failing_loads.contains(url) {
            state.current = None;
            return Err(BackendError::Navigation {
                url: url.to_owned(),
                reason: "net::ERR_CONNECTION_RESET".to_owned(),
            });
        }

        let count = state.load_counts.entry(url.to_owned()).or_default();
        let nth = *count;
        *count += 1;

        let page = state
            .pages
            .get(url)
            .and_then(|pages| pages.get(nth).or_else(|| pages.last()))
            .cloned();
        match page {
            Some(page) => {
                state.current = Some(page);
                Ok(())
            }
            None => {
                state.current = None;
                Err(BackendError::Navigation {
                    url: url.to_owned(),
                    reason: "no scripted page".to_owned(),
                })
            }
        }
    }

    async fn find_element(&self, selector: &str) -> Result<Option<Self::Element>, BackendError> {
        Ok(self.find_all_elements(selector).await?.into_iter().next())
    }

    async fn find_all_elements(&self, selector: &str) -> Result<Vec<Self::Element>, BackendError> {
        let page = self.current();
        if page.failing_queries.contains(selector) {
            return Err(BackendError::Query {
                selector: selector.to_owned(),
                reason: "target closed".to_owned(),
            });
        }
        Ok(page
            .elements
            .get(selector)
            .map(|elements| {
                elements
                    .iter()
                    .map(|element| ScriptedElement {
                        selector: selector.to_owned(),
                        element: element.clone(),
                        journal: Arc::clone(&self.journal),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<bool, BackendError> {
        self.journal
            .lock()
            .unwrap()
            .waits
            .push((condition.clone(), timeout));
        let page = self.current();
        let selector = condition.selector();
        if page.failing_waits.contains(selector) {
            return Err(BackendError::Query {
                selector: selector.to_owned(),
                reason: "execution context destroyed".to_owned(),
            });
        }
        Ok(match condition {
            WaitCondition::Visible(s) => page.visible.contains(s),
            WaitCondition::Clickable(s) => page.clickable.contains(s),
        })
    }

    async fn capture_snapshot(&self, path: &Path) -> Result<(), BackendError> {
        if self.state.lock().unwrap().snapshot_fails {
            return Err(BackendError::Snapshot {
                path: path.display().to_string(),
                reason: "page crashed".to_owned(),
            });
        }
        std::fs::write(path, b"png").map_err(|e| BackendError::Snapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.journal
            .lock()
            .unwrap()
            .snapshots
            .push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.journal.lock().unwrap().closes += 1;
        Ok(())
    }
}
