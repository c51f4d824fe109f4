//! Shared stub driver for integration tests.
//!
//! [`StubPage`] is a scripted page: tests declare which selectors are
//! present, which URL the page reports on each read, and which calls
//! should fail. Every driver call is recorded so tests can assert on
//! exactly what the orchestration core did.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use streamcart::driver::{Driver, Page};
use streamcart::{Config, Cookie, Error, Result};

// ============================================================================
// StubPage
// ============================================================================

/// A scripted page context.
#[derive(Default)]
pub struct StubPage {
    calls: Mutex<Vec<String>>,
    last_nav: Mutex<String>,
    url_sequence: Mutex<VecDeque<String>>,
    present: Mutex<HashSet<String>>,
    texts: Mutex<HashMap<String, String>>,
    cookies: Mutex<Vec<Cookie>>,
    nav_failures: AtomicU32,
    wait_visible_failures: AtomicU32,
    failing_clicks: Mutex<HashSet<String>>,
}

impl StubPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Queues a URL for the next `current_url` read. When the queue is
    /// empty, `current_url` reports the last navigated URL.
    pub fn push_url(&self, url: &str) {
        self.url_sequence.lock().push_back(url.to_string());
    }

    /// Queues the same URL for `n` consecutive `current_url` reads.
    pub fn push_url_times(&self, url: &str, n: usize) {
        for _ in 0..n {
            self.push_url(url);
        }
    }

    /// Marks a selector as present on the page.
    pub fn set_present(&self, selector: &str) {
        self.present.lock().insert(selector.to_string());
    }

    /// Removes a selector from the page.
    pub fn remove_present(&self, selector: &str) {
        self.present.lock().remove(selector);
    }

    /// Sets the text content behind a selector (also marks it present).
    pub fn set_text(&self, selector: &str, text: &str) {
        self.texts.lock().insert(selector.to_string(), text.to_string());
        self.set_present(selector);
    }

    /// Seeds the browser cookie jar.
    pub fn seed_cookies(&self, cookies: Vec<Cookie>) {
        *self.cookies.lock() = cookies;
    }

    /// Makes the next `n` navigations fail with a timeout.
    pub fn fail_navigations(&self, n: u32) {
        self.nav_failures.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` `wait_visible` calls fail with a timeout.
    pub fn fail_wait_visible(&self, n: u32) {
        self.wait_visible_failures.store(n, Ordering::SeqCst);
    }

    /// Makes clicks on a selector fail.
    pub fn fail_click(&self, selector: &str) {
        self.failing_clicks.lock().insert(selector.to_string());
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Current cookie jar contents.
    pub fn cookie_jar(&self) -> Vec<Cookie> {
        self.cookies.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Extracts every JSON-quoted `querySelector` argument from a script.
fn selectors_in(script: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = script;
    while let Some(idx) = rest.find("querySelector(") {
        rest = &rest[idx + "querySelector(".len()..];
        if let Some(end) = rest.find(')') {
            if let Ok(selector) = serde_json::from_str::<String>(&rest[..end]) {
                out.push(selector);
            }
            rest = &rest[end..];
        } else {
            break;
        }
    }
    out
}

/// Extracts the JSON-quoted argument of `document.cookie.includes(..)`.
fn cookie_includes_arg(script: &str) -> Option<String> {
    let idx = script.find("document.cookie.includes(")?;
    let rest = &script[idx + "document.cookie.includes(".len()..];
    let end = rest.find(')')?;
    serde_json::from_str::<String>(&rest[..end]).ok()
}

#[async_trait]
impl Page for StubPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("navigate {url}"));
        if Self::take_failure(&self.nav_failures) {
            return Err(Error::timeout("navigate", 30_000));
        }
        *self.last_nav.lock() = url.to_string();
        Ok(())
    }

    async fn wait_visible(&self, selector: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("wait_visible {selector}"));
        if Self::take_failure(&self.wait_visible_failures) {
            return Err(Error::timeout("wait_visible", 5_000));
        }
        if self.present.lock().contains(selector) {
            Ok(())
        } else {
            Err(Error::timeout("wait_visible", 5_000))
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"));
        if self.failing_clicks.lock().contains(selector) {
            return Err(Error::element_not_found(selector));
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, _text: &str) -> Result<()> {
        self.record(format!("type {selector}"));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.record("evaluate".to_string());
        let selectors = selectors_in(script);

        if script.starts_with("parseInt") {
            let texts = self.texts.lock();
            let n = selectors
                .first()
                .and_then(|s| texts.get(s))
                .and_then(|t| t.parse::<u64>().ok())
                .unwrap_or(0);
            return Ok(json!(n));
        }

        if script.contains("?.innerText") {
            let texts = self.texts.lock();
            let text = selectors
                .first()
                .and_then(|s| texts.get(s))
                .cloned()
                .unwrap_or_default();
            return Ok(Value::String(text));
        }

        let present = self.present.lock();
        let mut found = selectors.iter().any(|s| present.contains(s));
        if !found && let Some(prefix) = cookie_includes_arg(script) {
            found = self
                .cookies
                .lock()
                .iter()
                .any(|c| c.name.starts_with(&prefix));
        }
        Ok(Value::Bool(found))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        self.record("cookies".to_string());
        Ok(self.cookies.lock().clone())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.record(format!("set_cookies {}", cookies.len()));
        *self.cookies.lock() = cookies.to_vec();
        Ok(())
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.record("clear_cookies".to_string());
        self.cookies.lock().clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.record("current_url".to_string());
        if let Some(url) = self.url_sequence.lock().pop_front() {
            return Ok(url);
        }
        Ok(self.last_nav.lock().clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record("screenshot".to_string());
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

// ============================================================================
// StubDriver
// ============================================================================

/// Hands out pre-built pages in order.
#[derive(Default)]
pub struct StubDriver {
    pages: Mutex<VecDeque<Arc<StubPage>>>,
}

impl StubDriver {
    /// Driver that serves the given pages, one per `open_page` call.
    pub fn with_pages(pages: Vec<Arc<StubPage>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
        })
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn open_page(&self) -> Result<Arc<dyn Page>> {
        self.pages
            .lock()
            .pop_front()
            .map(|p| p as Arc<dyn Page>)
            .ok_or_else(|| Error::driver("stub driver has no more pages"))
    }
}

// ============================================================================
// Config Helpers
// ============================================================================

pub const BASE_URL: &str = "https://shop.example.com";

/// Installs a test log subscriber, honoring `RUST_LOG`. Safe to call
/// from every test; only the first call in a process wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal valid config with `streams` livestream URLs and the session
/// file placed under `session_dir`.
pub fn test_config(streams: usize, session_dir: &std::path::Path) -> Config {
    let urls: Vec<String> = (1..=streams)
        .map(|i| format!("    \"{BASE_URL}/live/{i}\","))
        .collect();
    let raw = format!(
        r#"
            [storefront]
            base_url = "{BASE_URL}"
            livestream_urls = [
            {}
            ]
        "#,
        urls.join("\n")
    );

    let mut config = Config::from_toml(&raw).expect("valid test config");
    config.session.file = session_dir.join("session.json");
    config
}

/// Adds credentials so the automated login strategy is selected.
pub fn with_credentials(mut config: Config) -> Config {
    config.storefront.credentials.username = "buyer".to_string();
    config.storefront.credentials.password = "hunter2".to_string();
    config
}

/// A cookie jar that looks like an established storefront session.
pub fn session_cookies() -> Vec<Cookie> {
    vec![
        Cookie::new("SPC_SESSION", "tok-123")
            .with_domain(".example.com")
            .with_path("/")
            .with_http_only(true)
            .with_secure(true),
        Cookie::new("locale", "th"),
    ]
}
