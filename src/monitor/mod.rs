//! Stream monitor: one independent polling task per livestream target.
//!
//! Each task owns its own page context, navigates with bounded retries,
//! then polls at a fixed tick for a purchase-enabling control. On
//! detection it hands the winning selector to the purchase executor and
//! resumes polling regardless of outcome - a stream may offer multiple
//! purchase windows.
//!
//! # Supervision
//!
//! Tasks are spawned together into a [`JoinSet`] and supervised as a
//! group: the first non-cancellation error is recorded and triggers the
//! shared child cancellation token, the remaining tasks drain until they
//! observe it (within one tick), and [`StreamMonitor::start`] returns
//! that first error. Cancellation itself is a clean exit, never a
//! failure.

// ============================================================================
// Submodules
// ============================================================================

/// Flash-sale countdown and product metadata reads.
pub mod inspect;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::driver::{Driver, Page, element_exists, navigate_with_retry};
use crate::error::{Error, Result};
use crate::events::{EventBus, StatusEvent};
use crate::purchase::PurchaseExecutor;

pub use inspect::{FlashSale, ProductInfo, check_flash_sale, product_info};

// ============================================================================
// Constants
// ============================================================================

/// Navigation attempts per stream target.
const NAV_ATTEMPTS: u32 = 3;

// ============================================================================
// StreamId
// ============================================================================

/// Stable 1-based stream identity, assigned from configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StreamId(u32);

impl StreamId {
    /// Creates a stream ID.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// StreamTarget
// ============================================================================

/// One livestream under observation. Immutable once the monitor set is
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    /// Stream page URL.
    pub url: String,
    /// Stable identity for logs and events.
    pub stream_id: StreamId,
}

impl StreamTarget {
    /// Builds the target set from configured URLs, assigning 1-based IDs
    /// in order.
    #[must_use]
    pub fn from_urls(urls: &[String]) -> Vec<Self> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| Self {
                url: url.clone(),
                stream_id: StreamId::new(i as u32 + 1),
            })
            .collect()
    }
}

// ============================================================================
// Task Status & Stats
// ============================================================================

/// Runtime status of one stream task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Loading the stream page.
    Navigating,
    /// Waiting on the poll tick.
    Polling,
    /// Driving the purchase executor.
    PurchaseAttempt,
    /// Exited (cancelled or failed).
    Stopped,
}

impl TaskStatus {
    fn as_u8(self) -> u8 {
        match self {
            Self::Navigating => 0,
            Self::Polling => 1,
            Self::PurchaseAttempt => 2,
            Self::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Navigating,
            1 => Self::Polling,
            2 => Self::PurchaseAttempt,
            _ => Self::Stopped,
        }
    }
}

/// Shared counters for one stream task.
///
/// Written by the owning task, readable from anywhere; this is how the
/// supervisor's behavior stays observable without touching task state.
#[derive(Debug, Default)]
pub struct StreamStats {
    ticks: AtomicU64,
    attempts: AtomicU64,
    status: AtomicU8,
}

impl StreamStats {
    /// Poll ticks completed.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Purchase windows handed to the executor.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Current task status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn set_status(&self, status: TaskStatus) {
        self.status.store(status.as_u8(), Ordering::Relaxed);
    }
}

// ============================================================================
// StreamMonitor
// ============================================================================

/// Supervises one polling task per configured stream target.
pub struct StreamMonitor {
    driver: Arc<dyn Driver>,
    config: Arc<Config>,
    executor: PurchaseExecutor,
    events: EventBus,
    targets: Vec<StreamTarget>,
    stats: Vec<Arc<StreamStats>>,
}

impl StreamMonitor {
    /// Creates a monitor over the configured stream targets.
    #[must_use]
    pub fn new(
        driver: Arc<dyn Driver>,
        config: Arc<Config>,
        executor: PurchaseExecutor,
        events: EventBus,
    ) -> Self {
        let targets = StreamTarget::from_urls(&config.storefront.livestream_urls);
        let stats = targets
            .iter()
            .map(|_| Arc::new(StreamStats::default()))
            .collect();

        Self {
            driver,
            config,
            executor,
            events,
            targets,
            stats,
        }
    }

    /// Configured targets, in stream-ID order.
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[StreamTarget] {
        &self.targets
    }

    /// Per-stream counters, index-aligned with [`targets`](Self::targets).
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &[Arc<StreamStats>] {
        &self.stats
    }

    /// Starts all stream tasks and supervises them to completion.
    ///
    /// Returns the first non-cancellation task error after every task
    /// has drained, or `Ok(())` when all tasks exit cleanly (including
    /// via `cancel`).
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        info!(streams = self.targets.len(), "Starting livestream monitoring");

        let child = cancel.child_token();
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for (target, stats) in self.targets.iter().zip(&self.stats) {
            let driver = Arc::clone(&self.driver);
            let config = Arc::clone(&self.config);
            let executor = self.executor.clone();
            let events = self.events.clone();
            let target = target.clone();
            let stats = Arc::clone(stats);
            let cancel = child.clone();

            tasks.spawn(async move {
                let page = driver.open_page().await?;
                monitor_stream(page.as_ref(), &target, &config, &executor, &events, &stats, &cancel)
                    .await
            });
        }

        // First error wins, but drain the rest.
        let mut first_err: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => Err(Error::driver(format!("stream task panicked: {join_err}"))),
            };

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    if first_err.is_none() {
                        error!(error = %err, "Stream task failed, cancelling siblings");
                        child.cancel();
                        first_err = Some(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StreamMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamMonitor")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Per-Stream Task
// ============================================================================

/// One stream's polling loop: navigate, then tick until cancelled.
async fn monitor_stream(
    page: &dyn Page,
    target: &StreamTarget,
    config: &Config,
    executor: &PurchaseExecutor,
    events: &EventBus,
    stats: &StreamStats,
    cancel: &CancellationToken,
) -> Result<()> {
    let stream_id = target.stream_id;

    stats.set_status(TaskStatus::Navigating);
    events.emit(StatusEvent::StreamNavigating {
        stream_id,
        url: target.url.clone(),
    });
    info!(stream_id = %stream_id, url = %target.url, "Starting stream monitor");

    if let Err(err) = navigate_with_retry(
        page,
        &target.url,
        NAV_ATTEMPTS,
        config.timeouts.navigation(),
    )
    .await
    {
        stats.set_status(TaskStatus::Stopped);
        events.emit(StatusEvent::StreamStopped {
            stream_id,
            error: Some(err.to_string()),
        });
        return Err(err);
    }

    stats.set_status(TaskStatus::Polling);
    events.emit(StatusEvent::StreamPolling { stream_id });
    info!(stream_id = %stream_id, "Stream loaded, polling for purchase windows");

    let period = config.monitoring.check_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!(stream_id = %stream_id, "Stopping stream monitor");
                stats.set_status(TaskStatus::Stopped);
                events.emit(StatusEvent::StreamStopped { stream_id, error: None });
                return Err(Error::Cancelled);
            }
            _ = ticker.tick() => {
                stats.record_tick();

                if let Some(selector) = detect_purchase_control(page, config).await {
                    stats.set_status(TaskStatus::PurchaseAttempt);
                    stats.record_attempt();
                    events.emit(StatusEvent::ProductDetected {
                        stream_id,
                        selector: selector.clone(),
                    });
                    info!(stream_id = %stream_id, selector = %selector, "Purchase window detected");

                    // Auxiliary context for the operator; never steers the loop.
                    if let Some(sale) = check_flash_sale(page, &config.detection).await {
                        info!(stream_id = %stream_id, countdown = %sale.countdown, "Flash sale countdown visible");
                    }
                    let info = product_info(page, &config.detection).await;
                    if info.name.is_some() || info.price.is_some() {
                        debug!(stream_id = %stream_id, name = ?info.name, price = ?info.price, stock = ?info.stock, "Product metadata");
                    }

                    match executor.retry_purchase(page, stream_id, &selector).await {
                        Ok(()) => info!(stream_id = %stream_id, "Purchase window consumed"),
                        Err(err) => warn!(stream_id = %stream_id, error = %err, "Purchase window lost"),
                    }

                    // One window never ends the loop; the stream may offer more.
                    stats.set_status(TaskStatus::Polling);
                }
            }
        }
    }
}

/// Probes the ordered selector candidates; the first match wins.
async fn detect_purchase_control(page: &dyn Page, config: &Config) -> Option<String> {
    for selector in &config.detection.purchase_selectors {
        if element_exists(page, selector).await {
            return Some(selector.clone());
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
