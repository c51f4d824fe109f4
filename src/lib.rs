//! Streamcart - livestream storefront purchase orchestrator.
//!
//! This library automates interaction with a web storefront's
//! livestream-shopping surface: it authenticates a session (reusing a
//! persisted one when still valid), concurrently watches several
//! livestream pages for a transient purchasable state, and drives the
//! reservation action with bounded retries before the window closes.
//!
//! # Architecture
//!
//! The crate is written against an abstract browser capability, not a
//! concrete browser:
//!
//! - [`driver::Driver`] / [`driver::Page`] - the external automation
//!   seam. Each stream task and the session manager own an isolated
//!   page context, so concurrent driver calls never contend.
//! - [`session::SessionManager`] - authentication state machine with
//!   persisted-session reuse, manual-login detection and an automated
//!   credential path.
//! - [`monitor::StreamMonitor`] - one cancellable polling task per
//!   stream target, supervised as a group ("first error wins, drain the
//!   rest").
//! - [`purchase::PurchaseExecutor`] - bounded-retry purchase execution
//!   with linear backoff.
//! - [`orchestrator::Orchestrator`] - thin wiring and process lifetime.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamcart::{Config, Orchestrator, Result, driver::Driver};
//!
//! async fn run(driver: Arc<dyn Driver>) -> Result<()> {
//!     let config = Config::load("streamcart.toml")?;
//!     let bot = Orchestrator::new(driver, config);
//!     bot.run().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | TOML configuration, env overrides, detection policy |
//! | [`driver`] | Browser driver capability traits and [`Cookie`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Structured status events |
//! | [`monitor`] | Concurrent stream monitoring |
//! | [`orchestrator`] | Component wiring and lifetime |
//! | [`purchase`] | Purchase execution and cart operations |
//! | [`session`] | Authentication and persisted sessions |

// ============================================================================
// Modules
// ============================================================================

/// TOML configuration, environment overrides and detection policy.
pub mod config;

/// Browser driver capability contract.
///
/// The orchestration core consumes these traits; production code backs
/// them with a real automation stack, tests with scripted stubs.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Structured status events for operators.
pub mod events;

/// Concurrent stream monitoring and group supervision.
pub mod monitor;

/// Component wiring and process lifetime.
pub mod orchestrator;

/// Purchase execution with bounded retry.
pub mod purchase;

/// Authentication state machine and persisted sessions.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::Config;

// Driver types
pub use driver::{Cookie, Driver, Page};

// Error types
pub use error::{Error, Result};

// Events
pub use events::{EventBus, LoginMode, PurchaseOutcome, StatusEvent};

// Monitoring
pub use monitor::{StreamId, StreamMonitor, StreamTarget};

// Orchestration
pub use orchestrator::Orchestrator;

// Purchasing
pub use purchase::PurchaseExecutor;

// Sessions
pub use session::{LoginStrategy, SessionManager, SessionState};
