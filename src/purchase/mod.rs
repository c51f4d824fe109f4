//! Purchase executor: drives the reservation action for a detected
//! purchase window, with bounded linear-backoff retry.
//!
//! The executor is stateless between windows; it acts on whatever
//! [`Page`] the calling stream task owns. One detected window maps to
//! one [`retry_purchase`](PurchaseExecutor::retry_purchase) call, which
//! reports its outcome through the event bus and is not retained
//! afterwards.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::driver::{Page, element_exists, json_string, navigate_with_retry};
use crate::error::{Error, Result};
use crate::events::{EventBus, PurchaseOutcome, StatusEvent};
use crate::monitor::StreamId;

// ============================================================================
// Constants
// ============================================================================

/// Navigation attempts for cart flows.
const NAV_ATTEMPTS: u32 = 3;

/// Pause after a checkout-stage click before the next stage.
const CHECKOUT_SETTLE: Duration = Duration::from_secs(2);

/// Pause between cart manipulation clicks.
const CART_STEP_DELAY: Duration = Duration::from_millis(500);

/// Select-all control on the cart page.
const CART_SELECT_ALL: &str = "input[type='checkbox'][class*='select-all']";

/// Delete control on the cart page.
const CART_DELETE: &str = "button[class*='delete']";

/// Delete confirmation control on the cart page.
const CART_CONFIRM: &str = "button[class*='confirm']";

// ============================================================================
// PurchaseExecutor
// ============================================================================

/// Executes purchase attempts against a detected purchase control.
#[derive(Debug, Clone)]
pub struct PurchaseExecutor {
    config: Arc<Config>,
    events: EventBus,
}

impl PurchaseExecutor {
    /// Creates an executor over the purchase policy in `config`.
    #[inline]
    #[must_use]
    pub fn new(config: Arc<Config>, events: EventBus) -> Self {
        Self { config, events }
    }

    // ========================================================================
    // Purchase
    // ========================================================================

    /// One purchase attempt: wait for the control to be interactable,
    /// activate it, let the remote UI settle.
    ///
    /// The storefront auto-confirms once the control fires, so no
    /// separate confirmation step follows unless `auto_checkout` is
    /// configured, in which case the checkout and place-order stages run
    /// too.
    pub async fn execute_purchase(&self, page: &dyn Page, selector: &str) -> Result<()> {
        debug!(selector = %selector, "Activating purchase control");

        page.wait_visible(selector, self.config.timeouts.element())
            .await?;
        page.click(selector).await?;
        sleep(self.config.purchase.settle_delay()).await;

        if !self.config.purchase.auto_checkout {
            return Ok(());
        }

        self.proceed_to_checkout(page).await?;
        self.place_order(page).await
    }

    /// Calls [`execute_purchase`](Self::execute_purchase) up to
    /// `max_retries` times with linear backoff (`retry_delay × attempt
    /// index` before attempts after the first).
    ///
    /// # Errors
    ///
    /// [`Error::PurchaseExhausted`] wrapping the final attempt's error
    /// when every attempt fails.
    pub async fn retry_purchase(
        &self,
        page: &dyn Page,
        stream_id: StreamId,
        selector: &str,
    ) -> Result<()> {
        let max_retries = self.config.purchase.max_retries;
        let retry_delay = self.config.purchase.retry_delay();
        let mut last_err = Error::driver("no purchase attempt performed");

        for attempt in 1..=max_retries {
            if attempt > 1 {
                let backoff = retry_delay * (attempt - 1);
                debug!(stream_id = %stream_id, attempt, max_retries, backoff_secs = backoff.as_secs(), "Backing off before retry");
                sleep(backoff).await;
            }

            self.events.emit(StatusEvent::PurchaseAttempt {
                stream_id,
                selector: selector.to_string(),
                attempt,
            });

            match self.execute_purchase(page, selector).await {
                Ok(()) => {
                    info!(stream_id = %stream_id, selector = %selector, attempt, "Purchase succeeded");
                    self.events.emit(StatusEvent::PurchaseResult {
                        stream_id,
                        selector: selector.to_string(),
                        outcome: PurchaseOutcome::Success,
                    });
                    return Ok(());
                }
                Err(err) => {
                    warn!(stream_id = %stream_id, attempt, max_retries, error = %err, "Purchase attempt failed");
                    last_err = err;
                }
            }
        }

        self.events.emit(StatusEvent::PurchaseResult {
            stream_id,
            selector: selector.to_string(),
            outcome: PurchaseOutcome::Failed,
        });
        Err(Error::purchase_exhausted(max_retries, last_err))
    }

    /// Fastest possible click-through: purchase control, checkout,
    /// place order, with only short settles in between. Assumes payment
    /// and address are pre-configured.
    pub async fn quick_purchase(&self, page: &dyn Page, selector: &str) -> Result<()> {
        let started = std::time::Instant::now();

        page.click(selector).await?;
        sleep(Duration::from_millis(300)).await;

        let checkout = self.first_candidate(&self.config.detection.checkout_selectors)?;
        page.click(checkout).await?;
        sleep(CART_STEP_DELAY).await;

        let place_order = self.first_candidate(&self.config.detection.place_order_selectors)?;
        page.click(place_order).await?;

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Quick purchase completed");
        Ok(())
    }

    // ========================================================================
    // Checkout Stages
    // ========================================================================

    /// Clicks the first matching checkout control candidate.
    async fn proceed_to_checkout(&self, page: &dyn Page) -> Result<()> {
        for selector in &self.config.detection.checkout_selectors {
            let ready = page
                .wait_visible(selector, self.config.timeouts.element())
                .await;
            if ready.is_ok() && page.click(selector).await.is_ok() {
                debug!(selector = %selector, "Proceeded to checkout");
                sleep(CHECKOUT_SETTLE).await;
                return Ok(());
            }
        }

        Err(Error::element_not_found("checkout control"))
    }

    /// Clicks the first matching place-order candidate and verifies the
    /// order landed.
    async fn place_order(&self, page: &dyn Page) -> Result<()> {
        for selector in &self.config.detection.place_order_selectors {
            let ready = page
                .wait_visible(selector, self.config.timeouts.element())
                .await;
            if ready.is_ok() && page.click(selector).await.is_ok() {
                sleep(CHECKOUT_SETTLE).await;

                if self.verify_order_success(page).await {
                    info!("Order placed");
                    return Ok(());
                }
                return Err(Error::driver("order placement not confirmed"));
            }
        }

        Err(Error::element_not_found("place-order control"))
    }

    /// Probes success markers and the URL for an order confirmation.
    async fn verify_order_success(&self, page: &dyn Page) -> bool {
        for selector in &self.config.detection.order_success_selectors {
            if element_exists(page, selector).await {
                return true;
            }
        }

        match page.current_url().await {
            Ok(url) => url.contains("success") || url.contains("complete"),
            Err(_) => false,
        }
    }

    // ========================================================================
    // Cart
    // ========================================================================

    /// Best-effort read of the cart-count indicator. Absence reads as 0.
    pub async fn cart_item_count(&self, page: &dyn Page) -> u32 {
        let script = format!(
            "parseInt(document.querySelector({})?.innerText || '0')",
            json_string(&self.config.detection.cart_count_selector)
        );

        match page.evaluate(&script).await {
            Ok(value) => value.as_u64().unwrap_or(0) as u32,
            Err(_) => 0,
        }
    }

    /// Empties the cart: select all, delete, confirm. Any step failure
    /// aborts the whole operation.
    pub async fn clear_cart(&self, page: &dyn Page) -> Result<()> {
        navigate_with_retry(
            page,
            &self.config.cart_url(),
            NAV_ATTEMPTS,
            self.config.timeouts.navigation(),
        )
        .await?;

        page.click(CART_SELECT_ALL).await?;
        sleep(CART_STEP_DELAY).await;
        page.click(CART_DELETE).await?;
        sleep(CART_STEP_DELAY).await;
        page.click(CART_CONFIRM).await?;

        info!("Cart cleared");
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn first_candidate<'a>(&self, candidates: &'a [String]) -> Result<&'a str> {
        candidates
            .first()
            .map(String::as_str)
            .ok_or_else(|| Error::config("no selector candidates configured"))
    }
}
