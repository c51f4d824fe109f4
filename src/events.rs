//! Structured status events.
//!
//! Every observable state transition (navigation attempt, login waiting,
//! detection, purchase attempt, outcome) is published as a
//! [`StatusEvent`] so an operator can reconstruct what happened without
//! reading internals. Events ride a broadcast channel: emission never
//! blocks, and with no subscribers the event is simply dropped. Each
//! emission is mirrored as a `tracing` record at the call site.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use tokio::sync::broadcast;

use crate::monitor::StreamId;

// ============================================================================
// Constants
// ============================================================================

/// Broadcast channel capacity. Slow subscribers lag rather than block
/// the state machines.
const EVENT_CAPACITY: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Which login path produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    /// Session restored from the persisted store.
    Restored,
    /// User completed the login in the browser themselves.
    Manual,
    /// Credential-driven form submission.
    Automated,
}

/// Outcome of one purchase window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// The purchase control was activated.
    Success,
    /// All attempts failed.
    Failed,
}

/// A status event, one per observable state transition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Persisted cookies were pushed into the driver.
    SessionLoaded {
        /// Cookies restored.
        cookie_count: usize,
    },
    /// Live cookies were captured and persisted.
    SessionSaved {
        /// Cookies persisted.
        cookie_count: usize,
    },
    /// A restored session failed validation.
    SessionInvalid,
    /// Manual login wait is in progress.
    LoginWaiting {
        /// Seconds elapsed since the wait started.
        elapsed_secs: u64,
    },
    /// A login path produced an authenticated session.
    LoginSucceeded {
        /// Which path succeeded.
        mode: LoginMode,
    },
    /// The manual login wait hit its ceiling.
    LoginTimedOut {
        /// Seconds waited.
        waited_secs: u64,
    },
    /// A stream task is navigating to its target.
    StreamNavigating {
        /// Stream identity.
        stream_id: StreamId,
        /// Target URL.
        url: String,
    },
    /// A stream task entered its polling loop.
    StreamPolling {
        /// Stream identity.
        stream_id: StreamId,
    },
    /// A purchase-enabling control was detected.
    ProductDetected {
        /// Stream identity.
        stream_id: StreamId,
        /// Winning selector candidate.
        selector: String,
    },
    /// One purchase attempt is starting.
    PurchaseAttempt {
        /// Stream identity.
        stream_id: StreamId,
        /// Selector being driven.
        selector: String,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A purchase window was consumed.
    PurchaseResult {
        /// Stream identity.
        stream_id: StreamId,
        /// Selector that was driven.
        selector: String,
        /// Final outcome.
        outcome: PurchaseOutcome,
    },
    /// A stream task terminated.
    StreamStopped {
        /// Stream identity.
        stream_id: StreamId,
        /// Error description, absent on clean (cancelled) exit.
        error: Option<String>,
    },
}

// ============================================================================
// EventBus
// ============================================================================

/// Broadcast fan-out for [`StatusEvent`]s.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    /// Creates a new bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Never blocks; without subscribers the event
    /// is dropped.
    pub fn emit(&self, event: StatusEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribes to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
