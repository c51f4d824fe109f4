//! Configuration surface.
//!
//! Configuration is a TOML file deserialized into [`Config`], with
//! credential overrides from the environment (`STREAMCART_USERNAME`,
//! `STREAMCART_PASSWORD`). Empty credentials select manual login mode.
//!
//! Detection predicates (login path, logged-in markers, purchase control
//! candidates) live here as policy, not in code, so they can track a
//! moving storefront UI without touching the state machines.
//!
//! # Example
//!
//! ```no_run
//! use streamcart::Config;
//!
//! # fn example() -> streamcart::Result<()> {
//! let config = Config::load("streamcart.toml")?;
//! assert!(!config.storefront.livestream_urls.is_empty());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Config
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Target storefront: base URL, stream URLs, credentials.
    pub storefront: StorefrontConfig,
    /// Persisted session store.
    #[serde(default)]
    pub session: SessionConfig,
    /// Stream monitoring cadence.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Purchase retry policy.
    #[serde(default)]
    pub purchase: PurchaseConfig,
    /// Per-action timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Proxy settings (configuration only; no rotation logic).
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// UI detection predicates.
    #[serde(default)]
    pub detection: DetectionConfig,
}

// ============================================================================
// Storefront
// ============================================================================

/// Storefront targets and credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorefrontConfig {
    /// Base URL of the storefront (required).
    #[serde(default)]
    pub base_url: String,
    /// Livestream pages to watch (at least one required). Order assigns
    /// stable 1-based stream IDs.
    #[serde(default)]
    pub livestream_urls: Vec<String>,
    /// Account credentials. Empty fields select manual login mode.
    #[serde(default)]
    pub credentials: Credentials,
}

/// Account credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    /// Username or email.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Returns `true` when both fields are non-empty.
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Persisted session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Path of the serialized cookie file.
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    PathBuf::from("data/cookies/session.json")
}

// ============================================================================
// Monitoring
// ============================================================================

/// Stream monitoring cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    /// Poll tick interval in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

impl MonitoringConfig {
    /// Poll tick interval.
    #[inline]
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

fn default_check_interval() -> u64 {
    1
}

// ============================================================================
// Purchase
// ============================================================================

/// Purchase retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurchaseConfig {
    /// Maximum purchase attempts per detected window.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry delay in seconds (linear backoff: delay × attempt index).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Settle delay after activating the purchase control, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Continue through checkout after adding to the reservation.
    #[serde(default)]
    pub auto_checkout: bool,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            settle_delay_ms: default_settle_delay(),
            auto_checkout: false,
        }
    }
}

impl PurchaseConfig {
    /// Base retry delay.
    #[inline]
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Post-activation settle delay.
    #[inline]
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_settle_delay() -> u64 {
    1000
}

// ============================================================================
// Timeouts
// ============================================================================

/// Per-action timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_secs: u64,
    /// Element-interactable wait timeout in seconds.
    #[serde(default = "default_element_timeout")]
    pub element_secs: u64,
    /// Manual-login poll interval in seconds.
    #[serde(default = "default_login_poll")]
    pub login_poll_secs: u64,
    /// Manual-login wait ceiling in seconds.
    #[serde(default = "default_login_ceiling")]
    pub login_ceiling_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_secs: default_navigation_timeout(),
            element_secs: default_element_timeout(),
            login_poll_secs: default_login_poll(),
            login_ceiling_secs: default_login_ceiling(),
        }
    }
}

impl TimeoutConfig {
    /// Navigation timeout.
    #[inline]
    #[must_use]
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    /// Element-interactable wait timeout.
    #[inline]
    #[must_use]
    pub fn element(&self) -> Duration {
        Duration::from_secs(self.element_secs)
    }

    /// Manual-login poll interval.
    #[inline]
    #[must_use]
    pub fn login_poll(&self) -> Duration {
        Duration::from_secs(self.login_poll_secs)
    }

    /// Manual-login wait ceiling.
    #[inline]
    #[must_use]
    pub fn login_ceiling(&self) -> Duration {
        Duration::from_secs(self.login_ceiling_secs)
    }
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_element_timeout() -> u64 {
    5
}

fn default_login_poll() -> u64 {
    2
}

fn default_login_ceiling() -> u64 {
    300
}

// ============================================================================
// Proxy
// ============================================================================

/// Proxy settings.
///
/// Carried as configuration only; rotation is not implemented.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Whether a proxy list should be used.
    #[serde(default)]
    pub enabled: bool,
    /// Whether to rotate through the proxy list.
    #[serde(default)]
    pub rotate: bool,
    /// Path to a newline-separated proxy list.
    #[serde(default)]
    pub list_file: Option<PathBuf>,
}

// ============================================================================
// Detection
// ============================================================================

/// UI detection predicates.
///
/// These encode which URLs and elements mean "logged in", "purchasable"
/// and so on. They are data, not logic: the state machines only consume
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    /// URL substring identifying the login page.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Selectors whose presence marks an authenticated page. Any match
    /// counts.
    #[serde(default = "default_logged_in_selectors")]
    pub logged_in_selectors: Vec<String>,
    /// Cookie name prefix present once a session is established.
    #[serde(default = "default_session_cookie_prefix")]
    pub session_cookie_prefix: String,
    /// Purchase control candidates, highest priority first. The first
    /// match wins.
    #[serde(default = "default_purchase_selectors")]
    pub purchase_selectors: Vec<String>,
    /// Checkout control candidates (auto-checkout flow).
    #[serde(default = "default_checkout_selectors")]
    pub checkout_selectors: Vec<String>,
    /// Place-order control candidates (auto-checkout flow).
    #[serde(default = "default_place_order_selectors")]
    pub place_order_selectors: Vec<String>,
    /// Order-success markers (auto-checkout flow).
    #[serde(default = "default_order_success_selectors")]
    pub order_success_selectors: Vec<String>,
    /// Flash-sale countdown element.
    #[serde(default = "default_countdown_selector")]
    pub countdown_selector: String,
    /// Product name candidates.
    #[serde(default = "default_product_name_selectors")]
    pub product_name_selectors: Vec<String>,
    /// Product price candidates.
    #[serde(default = "default_price_selectors")]
    pub price_selectors: Vec<String>,
    /// Product stock candidates.
    #[serde(default = "default_stock_selectors")]
    pub stock_selectors: Vec<String>,
    /// Cart item-count indicator.
    #[serde(default = "default_cart_count_selector")]
    pub cart_count_selector: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            logged_in_selectors: default_logged_in_selectors(),
            session_cookie_prefix: default_session_cookie_prefix(),
            purchase_selectors: default_purchase_selectors(),
            checkout_selectors: default_checkout_selectors(),
            place_order_selectors: default_place_order_selectors(),
            order_success_selectors: default_order_success_selectors(),
            countdown_selector: default_countdown_selector(),
            product_name_selectors: default_product_name_selectors(),
            price_selectors: default_price_selectors(),
            stock_selectors: default_stock_selectors(),
            cart_count_selector: default_cart_count_selector(),
        }
    }
}

fn default_login_path() -> String {
    "/buyer/login".to_string()
}

fn default_logged_in_selectors() -> Vec<String> {
    vec![
        "[data-testid=\"account-menu\"]".to_string(),
        ".navbar__username".to_string(),
        "a[href*=\"/user/account\"]".to_string(),
    ]
}

fn default_session_cookie_prefix() -> String {
    "SPC_".to_string()
}

fn default_purchase_selectors() -> Vec<String> {
    vec![
        "button[class*='add-to-cart']".to_string(),
        "button[class*='buy-now']".to_string(),
        "button[class*='add-cart']".to_string(),
        "div[class*='shop-bag'] button".to_string(),
    ]
}

fn default_checkout_selectors() -> Vec<String> {
    vec![
        "button[class*='checkout']".to_string(),
        "a[href*='checkout']".to_string(),
    ]
}

fn default_place_order_selectors() -> Vec<String> {
    vec![
        "button[class*='place-order']".to_string(),
        "button[class*='submit-order']".to_string(),
    ]
}

fn default_order_success_selectors() -> Vec<String> {
    vec![
        "[class*='order-success']".to_string(),
        "[class*='payment-success']".to_string(),
        ".success-icon".to_string(),
    ]
}

fn default_countdown_selector() -> String {
    "[class*=\"countdown\"]".to_string()
}

fn default_product_name_selectors() -> Vec<String> {
    vec![
        "[class*=\"product-name\"]".to_string(),
        "[class*=\"product-title\"]".to_string(),
    ]
}

fn default_price_selectors() -> Vec<String> {
    vec![
        "[class*=\"price\"]".to_string(),
        "[class*=\"amount\"]".to_string(),
    ]
}

fn default_stock_selectors() -> Vec<String> {
    vec![
        "[class*=\"stock\"]".to_string(),
        "[class*=\"quantity\"]".to_string(),
    ]
}

fn default_cart_count_selector() -> String {
    "[class*=\"cart-count\"]".to_string()
}

// ============================================================================
// Loading & Validation
// ============================================================================

/// Environment variable overriding the configured username.
pub const ENV_USERNAME: &str = "STREAMCART_USERNAME";

/// Environment variable overriding the configured password.
pub const ENV_PASSWORD: &str = "STREAMCART_PASSWORD";

impl Config {
    /// Loads configuration from a TOML file, applies environment
    /// overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string without env overrides.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces credentials with environment values when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var(ENV_USERNAME)
            && !username.is_empty()
        {
            self.storefront.credentials.username = username;
        }
        if let Ok(password) = std::env::var(ENV_PASSWORD)
            && !password.is_empty()
        {
            self.storefront.credentials.password = password;
        }
    }

    /// Validates required fields and clamps non-positive numbers back to
    /// their defaults. Credentials are optional; their absence selects
    /// manual login mode.
    pub fn validate(&mut self) -> Result<()> {
        if self.storefront.base_url.is_empty() {
            return Err(Error::config("storefront.base_url is required"));
        }
        Url::parse(&self.storefront.base_url)
            .map_err(|e| Error::config(format!("storefront.base_url is not a valid URL: {e}")))?;

        if self.storefront.livestream_urls.is_empty() {
            return Err(Error::config("at least one livestream URL is required"));
        }
        for url in &self.storefront.livestream_urls {
            Url::parse(url)
                .map_err(|e| Error::config(format!("livestream URL {url:?} is invalid: {e}")))?;
        }

        if self.detection.purchase_selectors.is_empty() {
            return Err(Error::config(
                "at least one purchase selector candidate is required",
            ));
        }

        if self.purchase.max_retries == 0 {
            self.purchase.max_retries = default_max_retries();
        }
        if self.monitoring.check_interval_secs == 0 {
            self.monitoring.check_interval_secs = default_check_interval();
        }
        if self.timeouts.navigation_secs == 0 {
            self.timeouts.navigation_secs = default_navigation_timeout();
        }
        if self.timeouts.login_poll_secs == 0 {
            self.timeouts.login_poll_secs = default_login_poll();
        }

        Ok(())
    }

    /// Login page URL derived from the base URL and the login path.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!(
            "{}{}",
            self.storefront.base_url.trim_end_matches('/'),
            self.detection.login_path
        )
    }

    /// Cart page URL.
    #[must_use]
    pub fn cart_url(&self) -> String {
        format!("{}/cart", self.storefront.base_url.trim_end_matches('/'))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [storefront]
            base_url = "https://shop.example.com"
            livestream_urls = ["https://shop.example.com/live/1"]
        "#
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = Config::from_toml(minimal_toml()).unwrap();

        assert_eq!(config.purchase.max_retries, 3);
        assert_eq!(config.purchase.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.monitoring.check_interval(), Duration::from_secs(1));
        assert_eq!(config.timeouts.navigation(), Duration::from_secs(30));
        assert_eq!(config.timeouts.login_ceiling(), Duration::from_secs(300));
        assert_eq!(config.session.file, PathBuf::from("data/cookies/session.json"));
        assert!(!config.storefront.credentials.is_configured());
        assert!(!config.detection.purchase_selectors.is_empty());
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let err = Config::from_toml(
            r#"
                [storefront]
                livestream_urls = ["https://shop.example.com/live/1"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_no_streams_rejected() {
        let err = Config::from_toml(
            r#"
                [storefront]
                base_url = "https://shop.example.com"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("livestream"));
    }

    #[test]
    fn test_invalid_stream_url_rejected() {
        let err = Config::from_toml(
            r#"
                [storefront]
                base_url = "https://shop.example.com"
                livestream_urls = ["not a url"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_zero_values_clamped_to_defaults() {
        let config = Config::from_toml(
            r#"
                [storefront]
                base_url = "https://shop.example.com"
                livestream_urls = ["https://shop.example.com/live/1"]

                [purchase]
                max_retries = 0

                [monitoring]
                check_interval_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.purchase.max_retries, 3);
        assert_eq!(config.monitoring.check_interval_secs, 1);
    }

    #[test]
    fn test_credentials_configured() {
        let config = Config::from_toml(
            r#"
                [storefront]
                base_url = "https://shop.example.com"
                livestream_urls = ["https://shop.example.com/live/1"]

                [storefront.credentials]
                username = "buyer"
                password = "hunter2"
            "#,
        )
        .unwrap();
        assert!(config.storefront.credentials.is_configured());
    }

    #[test]
    fn test_login_and_cart_urls() {
        let config = Config::from_toml(minimal_toml()).unwrap();
        assert_eq!(config.login_url(), "https://shop.example.com/buyer/login");
        assert_eq!(config.cart_url(), "https://shop.example.com/cart");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml(
            r#"
                [storefront]
                base_url = "https://shop.example.com"
                livestream_urls = ["https://shop.example.com/live/1"]
                surprise = true
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
