//! Purchase executor properties: retry bound, linear backoff, cart
//! operations and the auto-checkout flow.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use streamcart::events::{PurchaseOutcome, StatusEvent};
use streamcart::monitor::StreamId;
use streamcart::{Error, EventBus, PurchaseExecutor};

use common::{StubPage, init_tracing, test_config};

const RESERVE: &str = "button[class*='add-to-cart']";

fn executor(config: streamcart::Config) -> (PurchaseExecutor, EventBus) {
    init_tracing();
    let events = EventBus::new();
    let exec = PurchaseExecutor::new(Arc::new(config), events.clone());
    (exec, events)
}

// ============================================================================
// Retry Bound & Backoff
// ============================================================================

#[tokio::test(start_paused = true)]
async fn retry_purchase_performs_exactly_max_retries_with_linear_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());
    let retry_delay = config.purchase.retry_delay();

    // Control never becomes interactable: every attempt fails.
    let page = StubPage::new();
    let (exec, events) = executor(config);
    let mut rx = events.subscribe();

    let started = Instant::now();
    let err = exec
        .retry_purchase(page.as_ref(), StreamId::new(1), RESERVE)
        .await
        .unwrap_err();

    // Exactly 3 attempts, inter-attempt waits of delay×1 then delay×2.
    assert_eq!(page.calls_matching("wait_visible"), 3);
    assert_eq!(started.elapsed(), retry_delay * 1 + retry_delay * 2);
    assert!(matches!(err, Error::PurchaseExhausted { attempts: 3, .. }));

    let mut attempts = Vec::new();
    let mut outcome = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            StatusEvent::PurchaseAttempt { attempt, .. } => attempts.push(attempt),
            StatusEvent::PurchaseResult { outcome: o, .. } => outcome = Some(o),
            _ => {}
        }
    }
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(outcome, Some(PurchaseOutcome::Failed));
}

#[tokio::test(start_paused = true)]
async fn retry_purchase_stops_on_first_success() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());
    let retry_delay = config.purchase.retry_delay();
    let settle = config.purchase.settle_delay();

    let page = StubPage::new();
    page.set_present(RESERVE);
    page.fail_wait_visible(1); // first attempt fails, second succeeds

    let (exec, events) = executor(config);
    let mut rx = events.subscribe();

    let started = Instant::now();
    exec.retry_purchase(page.as_ref(), StreamId::new(1), RESERVE)
        .await
        .unwrap();

    assert_eq!(page.calls_matching("wait_visible"), 2);
    assert_eq!(page.calls_matching("click"), 1);
    // One backoff of delay×1, then the post-click settle.
    assert_eq!(started.elapsed(), retry_delay + settle);

    let mut outcome = None;
    while let Ok(event) = rx.try_recv() {
        if let StatusEvent::PurchaseResult { outcome: o, .. } = event {
            outcome = Some(o);
        }
    }
    assert_eq!(outcome, Some(PurchaseOutcome::Success));
}

// ============================================================================
// Execute & Auto-Checkout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn execute_purchase_stops_after_activation_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());

    let page = StubPage::new();
    page.set_present(RESERVE);

    let (exec, _events) = executor(config);
    exec.execute_purchase(page.as_ref(), RESERVE).await.unwrap();

    // No checkout stage without auto_checkout.
    assert_eq!(page.calls_matching("click"), 1);
    assert_eq!(page.calls(), vec![
        format!("wait_visible {RESERVE}"),
        format!("click {RESERVE}"),
    ]);
}

#[tokio::test(start_paused = true)]
async fn execute_purchase_runs_checkout_stages_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, dir.path());
    config.purchase.auto_checkout = true;

    let page = StubPage::new();
    page.set_present(RESERVE);
    page.set_present("button[class*='checkout']");
    page.set_present("button[class*='place-order']");
    page.set_present("[class*='order-success']");

    let (exec, _events) = executor(config);
    exec.execute_purchase(page.as_ref(), RESERVE).await.unwrap();

    assert_eq!(page.calls_matching("click button[class*='checkout']"), 1);
    assert_eq!(page.calls_matching("click button[class*='place-order']"), 1);
}

#[tokio::test(start_paused = true)]
async fn execute_purchase_fails_without_order_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, dir.path());
    config.purchase.auto_checkout = true;

    let page = StubPage::new();
    page.set_present(RESERVE);
    page.set_present("button[class*='checkout']");
    page.set_present("button[class*='place-order']");
    // No success marker, and the URL stays on the stream page.

    let (exec, _events) = executor(config);
    let err = exec
        .execute_purchase(page.as_ref(), RESERVE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Driver { .. }));
}

#[tokio::test(start_paused = true)]
async fn quick_purchase_clicks_straight_through() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());

    let page = StubPage::new();
    let (exec, _events) = executor(config);

    exec.quick_purchase(page.as_ref(), RESERVE).await.unwrap();

    assert_eq!(page.calls(), vec![
        format!("click {RESERVE}"),
        "click button[class*='checkout']".to_string(),
        "click button[class*='place-order']".to_string(),
    ]);
}

// ============================================================================
// Cart Operations
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cart_item_count_reads_indicator() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());

    let page = StubPage::new();
    page.set_text("[class*=\"cart-count\"]", "5");

    let (exec, _events) = executor(config);
    assert_eq!(exec.cart_item_count(page.as_ref()).await, 5);
}

#[tokio::test(start_paused = true)]
async fn cart_item_count_is_zero_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());

    let page = StubPage::new();
    let (exec, _events) = executor(config);
    assert_eq!(exec.cart_item_count(page.as_ref()).await, 0);
}

#[tokio::test(start_paused = true)]
async fn clear_cart_drives_the_full_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());
    let cart_url = config.cart_url();

    let page = StubPage::new();
    let (exec, _events) = executor(config);

    exec.clear_cart(page.as_ref()).await.unwrap();

    assert_eq!(page.calls_matching(&format!("navigate {cart_url}")), 1);
    let clicks: Vec<String> = page
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("click"))
        .collect();
    assert_eq!(clicks, vec![
        "click input[type='checkbox'][class*='select-all']".to_string(),
        "click button[class*='delete']".to_string(),
        "click button[class*='confirm']".to_string(),
    ]);
}

#[tokio::test(start_paused = true)]
async fn clear_cart_aborts_on_step_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(1, dir.path());

    let page = StubPage::new();
    page.fail_click("button[class*='delete']");

    let (exec, _events) = executor(config);
    let err = exec.clear_cart(page.as_ref()).await.unwrap_err();

    assert!(matches!(err, Error::ElementNotFound { .. }));
    // The confirm step never ran.
    assert_eq!(page.calls_matching("click button[class*='confirm']"), 0);
}
