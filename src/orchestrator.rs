//! Thin wiring layer: configuration in, components constructed, monitor
//! supervised until shutdown.
//!
//! The orchestrator owns process lifetime policy: a failed login is
//! fatal and propagates to the caller (who exits non-zero); monitoring
//! errors after startup are logged and the run ends cleanly. A shutdown
//! signal triggers the root cancellation token and the monitor drains
//! before the run returns.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::driver::Driver;
use crate::error::Result;
use crate::events::EventBus;
use crate::monitor::StreamMonitor;
use crate::purchase::PurchaseExecutor;
use crate::session::SessionManager;

// ============================================================================
// Orchestrator
// ============================================================================

/// Wires the session manager, purchase executor and stream monitor over
/// one driver and runs them to completion.
pub struct Orchestrator {
    driver: Arc<dyn Driver>,
    config: Arc<Config>,
    events: EventBus,
}

impl Orchestrator {
    /// Creates an orchestrator over a driver and validated configuration.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: Config) -> Self {
        Self {
            driver,
            config: Arc::new(config),
            events: EventBus::new(),
        }
    }

    /// Event bus shared by all components; subscribe before
    /// [`run`](Self::run) to observe startup transitions.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Runs until the monitor finishes or Ctrl-C arrives.
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Runs until the monitor finishes or `shutdown` resolves.
    ///
    /// The shutdown signal is honored from the first moment on: arriving
    /// during the login phase it cancels the root token and the login
    /// wait unblocks at its next poll boundary.
    ///
    /// # Errors
    ///
    /// Only session acquisition failures propagate; they are fatal for
    /// startup. Monitoring errors are logged and swallowed.
    pub async fn run_with_shutdown(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let cancel = CancellationToken::new();
        tokio::pin!(shutdown);

        info!("Authenticating with storefront");
        let session_page = self.driver.open_page().await?;
        let session = SessionManager::new(
            session_page,
            Arc::clone(&self.config),
            self.events.clone(),
        );

        let login = session.login(&cancel);
        tokio::pin!(login);
        tokio::select! {
            outcome = &mut login => match outcome {
                Ok(()) => info!("Authentication successful"),
                Err(err) if err.is_cancelled() => {
                    info!("Orchestrator stopped");
                    return Ok(());
                }
                Err(err) => return Err(err),
            },
            () = &mut shutdown => {
                info!("Shutdown signal received during login, aborting");
                cancel.cancel();
                // Let the login wait observe the token before returning.
                let _ = login.await;
                info!("Orchestrator stopped");
                return Ok(());
            }
        }

        let executor = PurchaseExecutor::new(Arc::clone(&self.config), self.events.clone());
        let monitor = StreamMonitor::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.config),
            executor,
            self.events.clone(),
        );

        let monitor_run = monitor.start(&cancel);
        tokio::pin!(monitor_run);

        let outcome = tokio::select! {
            outcome = &mut monitor_run => outcome,
            () = shutdown => {
                info!("Shutdown signal received, draining stream tasks");
                cancel.cancel();
                monitor_run.await
            }
        };

        if let Err(err) = outcome {
            error!(error = %err, "Monitoring stopped with error");
        }

        info!("Orchestrator stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
