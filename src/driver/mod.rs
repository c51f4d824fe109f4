//! Browser driver capability contract.
//!
//! The orchestrator does not talk to a browser directly; it is written
//! against the [`Driver`] and [`Page`] traits defined here. A production
//! implementation backs them with a real automation stack, tests back them
//! with scripted stubs.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Factory for isolated page contexts |
//! | [`Page`] | One browsing context: navigation, interaction, cookies |
//! | [`Cookie`] | Serializable cookie record |
//!
//! # Concurrency model
//!
//! Each stream task and the session manager hold their own [`Page`], so
//! driver calls from different tasks never contend on a shared browsing
//! context. [`Driver::open_page`] is the only shared entry point.
//!
//! Every trait method may block and may fail; these calls are the
//! suspension points where timeouts and cancellation take effect.

// ============================================================================
// Submodules
// ============================================================================

/// Bounded-retry navigation and best-effort page probes.
pub mod retry;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use retry::{element_exists, element_text, navigate_with_retry};

// ============================================================================
// Cookie
// ============================================================================

/// A browser cookie.
///
/// Field names serialize in camelCase so persisted session files match
/// the wire shape most automation stacks emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// HttpOnly flag.
    #[serde(rename = "httpOnly", skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// Secure flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

impl Cookie {
    /// Creates a new cookie with name and value.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            http_only: None,
            secure: None,
        }
    }

    /// Sets the domain.
    #[inline]
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the HttpOnly flag.
    #[inline]
    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    /// Sets the Secure flag.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }
}

// ============================================================================
// Page
// ============================================================================

/// A handle to one browsing context.
///
/// All methods are blocking from the caller's perspective: they return
/// when the browser has acted (or failed, or timed out). Implementations
/// must be safe to call from the task that owns the page only; the crate
/// never shares one page between tasks.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigates to a URL and waits for the document to be ready.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Waits until the selector matches a visible element.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Timeout`] if nothing becomes visible in time.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Clicks the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Clears and types text into the first element matching the selector.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Evaluates a script in the page and returns its value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Returns all cookies visible to this page.
    async fn cookies(&self) -> Result<Vec<Cookie>>;

    /// Installs cookies into the browsing context.
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// Removes all cookies from the browsing context.
    async fn clear_cookies(&self) -> Result<()>;

    /// Returns the current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Captures a screenshot of the current page as encoded image bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

// ============================================================================
// Driver
// ============================================================================

/// Factory for isolated [`Page`] contexts.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a fresh page context.
    ///
    /// Pages share the browser's cookie jar but not an active tab, so
    /// concurrent interaction on different pages does not interleave.
    async fn open_page(&self) -> Result<Arc<dyn Page>>;
}

// ============================================================================
// Script Helpers
// ============================================================================

/// Builds a `!!document.querySelector(..)` existence probe.
///
/// The selector is JSON-quoted so arbitrary attribute selectors survive
/// embedding in the script.
#[must_use]
pub(crate) fn exists_script(selector: &str) -> String {
    format!("!!document.querySelector({})", json_string(selector))
}

/// Quotes a string for embedding in a page script.
#[must_use]
pub(crate) fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

// ============================================================================
// Tests
// ============================================================================
