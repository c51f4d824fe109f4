//! Auxiliary page reads: flash-sale countdown and product metadata.
//!
//! These are independent, read-only queries against whatever the page
//! currently shows. Absence is expected, not exceptional: every reader
//! returns "not present" instead of an error, and none of them feed the
//! poll loop's state transitions.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use crate::config::DetectionConfig;
use crate::driver::{Page, element_exists, element_text};

// ============================================================================
// Types
// ============================================================================

/// A detected flash-sale countdown.
#[derive(Debug, Clone)]
pub struct FlashSale {
    /// Countdown text as shown on the page.
    pub countdown: String,
    /// When the countdown was observed.
    pub detected_at: Instant,
}

/// Best-effort product metadata scraped from the stream page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInfo {
    /// Product name, when present.
    pub name: Option<String>,
    /// Displayed price, when present.
    pub price: Option<String>,
    /// Displayed stock, when present.
    pub stock: Option<String>,
}

// ============================================================================
// Readers
// ============================================================================

/// Looks for a flash-sale countdown on the current page.
pub async fn check_flash_sale(page: &dyn Page, detection: &DetectionConfig) -> Option<FlashSale> {
    if !element_exists(page, &detection.countdown_selector).await {
        return None;
    }

    let countdown = element_text(page, &[detection.countdown_selector.as_str()]).await?;
    Some(FlashSale {
        countdown,
        detected_at: Instant::now(),
    })
}

/// Extracts product metadata from the current page. Every field is
/// independent and optional.
pub async fn product_info(page: &dyn Page, detection: &DetectionConfig) -> ProductInfo {
    let name_selectors: Vec<&str> = detection
        .product_name_selectors
        .iter()
        .map(String::as_str)
        .collect();
    let price_selectors: Vec<&str> = detection
        .price_selectors
        .iter()
        .map(String::as_str)
        .collect();
    let stock_selectors: Vec<&str> = detection
        .stock_selectors
        .iter()
        .map(String::as_str)
        .collect();

    ProductInfo {
        name: element_text(page, &name_selectors).await,
        price: element_text(page, &price_selectors).await,
        stock: element_text(page, &stock_selectors).await,
    }
}
