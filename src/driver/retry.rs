//! Bounded-retry navigation and best-effort page probes.
//!
//! Navigation against a live storefront fails routinely (slow loads,
//! transient network errors), so it always goes through
//! [`navigate_with_retry`]. The probe helpers treat absence and
//! evaluation failure alike as "not present" - absence is an expected
//! condition for every caller in this crate.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::{Page, exists_script, json_string};

// ============================================================================
// Constants
// ============================================================================

/// Backoff step between navigation attempts (attempt index × this).
const NAV_BACKOFF_STEP: Duration = Duration::from_secs(1);

// ============================================================================
// Navigation
// ============================================================================

/// Navigates to a URL with bounded retries and linear backoff.
///
/// Attempt `n` (1-based) is followed, on failure, by a sleep of
/// `n × 1s` before the next attempt. The error from the final attempt is
/// wrapped in [`Error::Navigation`] reporting the total attempt count.
pub async fn navigate_with_retry(
    page: &dyn Page,
    url: &str,
    max_attempts: u32,
    timeout: Duration,
) -> Result<()> {
    let mut last_err = Error::driver("no navigation attempt performed");

    for attempt in 1..=max_attempts {
        match page.navigate(url, timeout).await {
            Ok(()) => {
                debug!(url = %url, attempt, "Navigation succeeded");
                return Ok(());
            }
            Err(err) => {
                warn!(url = %url, attempt, max_attempts, error = %err, "Navigation attempt failed");
                last_err = err;
            }
        }

        if attempt < max_attempts {
            sleep(NAV_BACKOFF_STEP * attempt).await;
        }
    }

    Err(Error::navigation(url, max_attempts, last_err))
}

// ============================================================================
// Page Probes
// ============================================================================

/// Returns `true` if the selector currently matches an element.
///
/// Evaluation errors read as "absent".
pub async fn element_exists(page: &dyn Page, selector: &str) -> bool {
    match page.evaluate(&exists_script(selector)).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(_) => false,
    }
}

/// Returns the trimmed text of the first matching, non-empty candidate.
///
/// Candidates are tried in order; selector misses and evaluation errors
/// are skipped silently.
pub async fn element_text(page: &dyn Page, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        let script = format!(
            "document.querySelector({})?.innerText ?? ''",
            json_string(selector)
        );

        if let Ok(value) = page.evaluate(&script).await {
            let text = value.as_str().unwrap_or("").trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    None
}
