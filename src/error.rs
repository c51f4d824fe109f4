//! Error types for the orchestrator.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use streamcart::{Result, Error};
//!
//! async fn example(page: &dyn Page) -> Result<()> {
//!     page.wait_visible("#reserve", Duration::from_secs(5)).await?;
//!     page.click("#reserve").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Driver | [`Error::Timeout`], [`Error::ElementNotFound`], [`Error::ScriptError`], [`Error::Driver`] |
//! | Navigation | [`Error::Navigation`] |
//! | Session | [`Error::LoginTimeout`], [`Error::LoginFailed`] |
//! | Purchase | [`Error::PurchaseExhausted`] |
//! | Lifecycle | [`Error::Cancelled`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Toml`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the configuration file is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// Operation timeout.
    ///
    /// Returned when a driver operation exceeds its timeout duration.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Element not found by selector.
    ///
    /// Returned when a selector matches no interactable element.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// CSS selector used.
        selector: String,
    },

    /// Script evaluation error.
    ///
    /// Returned when page script evaluation fails.
    #[error("Script error: {message}")]
    ScriptError {
        /// Error message from script evaluation.
        message: String,
    },

    /// Generic driver failure.
    ///
    /// Returned for driver faults that have no more specific variant,
    /// e.g. a crashed page context.
    #[error("Driver error: {message}")]
    Driver {
        /// Description of the driver failure.
        message: String,
    },

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// Navigation failed after bounded retries.
    #[error("Failed to navigate to {url} after {attempts} attempts")]
    Navigation {
        /// Target URL.
        url: String,
        /// Attempts performed before giving up.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Box<Error>,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Manual login wait exceeded its ceiling.
    #[error("Login timeout after {waited_secs}s - no login detected")]
    LoginTimeout {
        /// Seconds waited before giving up.
        waited_secs: u64,
    },

    /// Login flow completed without producing an authenticated session.
    #[error("Login failed: {message}")]
    LoginFailed {
        /// Description of the login failure.
        message: String,
    },

    // ========================================================================
    // Purchase Errors
    // ========================================================================
    /// All purchase attempts failed.
    #[error("All {attempts} purchase attempts failed")]
    PurchaseExhausted {
        /// Total attempts performed.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Box<Error>,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation aborted by the shared cancellation signal.
    ///
    /// Cancellation is a normal termination, not an operational failure;
    /// supervisors treat it as a clean exit.
    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a generic driver error.
    #[inline]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Creates a navigation error wrapping the final attempt's failure.
    #[inline]
    pub fn navigation(url: impl Into<String>, attempts: u32, source: Error) -> Self {
        Self::Navigation {
            url: url.into(),
            attempts,
            source: Box::new(source),
        }
    }

    /// Creates a login timeout error.
    #[inline]
    pub fn login_timeout(waited_secs: u64) -> Self {
        Self::LoginTimeout { waited_secs }
    }

    /// Creates a login failed error.
    #[inline]
    pub fn login_failed(message: impl Into<String>) -> Self {
        Self::LoginFailed {
            message: message.into(),
        }
    }

    /// Creates a purchase exhaustion error wrapping the final attempt's failure.
    #[inline]
    pub fn purchase_exhausted(attempts: u32, source: Error) -> Self {
        Self::PurchaseExhausted {
            attempts,
            source: Box::new(source),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::LoginTimeout { .. })
    }

    /// Returns `true` if this is the shared cancellation signal.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ElementNotFound { .. } | Self::Driver { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::login_failed("still on login page");
        assert_eq!(err.to_string(), "Login failed: still on login page");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("base_url is required");
        assert_eq!(err.to_string(), "Configuration error: base_url is required");
    }

    #[test]
    fn test_navigation_chains_source() {
        let err = Error::navigation(
            "https://example.com/live/1",
            3,
            Error::timeout("navigate", 30_000),
        );
        assert_eq!(
            err.to_string(),
            "Failed to navigate to https://example.com/live/1 after 3 attempts"
        );
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "Timeout after 30000ms: navigate");
    }

    #[test]
    fn test_script_error_display() {
        let err = Error::script_error("ReferenceError: document is not defined");
        assert_eq!(
            err.to_string(),
            "Script error: ReferenceError: document is not defined"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::timeout("wait_visible", 5000);
        let login_err = Error::login_timeout(300);
        let other_err = Error::config("test");

        assert!(timeout_err.is_timeout());
        assert!(login_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::config("test").is_cancelled());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::timeout("click", 1000).is_recoverable());
        assert!(Error::element_not_found("#reserve").is_recoverable());
        assert!(!Error::config("test").is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
