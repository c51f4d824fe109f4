//! Session manager: authentication state machine and persisted-session
//! reuse.
//!
//! # State machine
//!
//! ```text
//! Unauthenticated -> SessionLoaded -> Validating -> Authenticated
//!        |                                |
//!        |                                v
//!        |                         Unauthenticated
//!        +-> ManualLoginWaiting    (no credentials)
//!        +-> AutomatedLoginAttempt (credentials configured)
//! ```
//!
//! [`SessionManager::login`] first tries to restore and validate a
//! persisted session; only when that fails does it run one of the two
//! login strategies. The strategy is picked once at construction from
//! credential presence ([`LoginStrategy`]), not re-decided per call.
//!
//! The manual path opens the login page and waits for the user to finish
//! logging in by any method, polling for success signals at a fixed
//! interval under a hard ceiling. The wait is cancellable at every poll
//! boundary.

// ============================================================================
// Submodules
// ============================================================================

/// Persisted cookie store (atomic file I/O).
pub mod store;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, Credentials};
use crate::driver::{Page, exists_script, json_string, navigate_with_retry};
use crate::error::{Error, Result};
use crate::events::{EventBus, LoginMode, StatusEvent};

pub use store::SessionStore;

// ============================================================================
// Constants
// ============================================================================

/// Navigation attempts for session flows.
const NAV_ATTEMPTS: u32 = 3;

/// Settle delay after navigation before inspecting the page.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Wait for the login form to appear on the automated path.
const FORM_WAIT: Duration = Duration::from_secs(10);

/// Pause between form field interactions.
const FIELD_DELAY: Duration = Duration::from_millis(500);

/// Wait after submitting the login form before re-checking the URL.
const SUBMIT_WAIT: Duration = Duration::from_secs(5);

/// Username/email field on the login form.
const USERNAME_SELECTOR: &str = "input[type='text']";

/// Password field on the login form.
const PASSWORD_SELECTOR: &str = "input[type='password']";

/// Login form submit control.
const SUBMIT_SELECTOR: &str = "button[type='submit']";

// ============================================================================
// Types
// ============================================================================

/// Authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session established.
    Unauthenticated,
    /// Persisted cookies pushed into the driver, not yet validated.
    SessionLoaded,
    /// Probing a reference page to confirm the session.
    Validating,
    /// Waiting for the user to complete a manual login.
    ManualLoginWaiting,
    /// Driving the credential login form.
    AutomatedLoginAttempt,
    /// Session confirmed against the live target.
    Authenticated,
}

/// Which login path to run when no persisted session survives.
///
/// Selected once at startup from credential presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStrategy {
    /// Open the login page and wait for the user.
    Manual,
    /// Fill and submit the login form.
    Automated {
        /// Username or email.
        username: String,
        /// Password.
        password: String,
    },
}

impl LoginStrategy {
    /// Picks the strategy from configured credentials.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials) -> Self {
        if credentials.is_configured() {
            Self::Automated {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            }
        } else {
            Self::Manual
        }
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Owns authentication state and the persisted-session lifecycle.
///
/// Holds its own [`Page`]; nothing else drives that page.
pub struct SessionManager {
    page: Arc<dyn Page>,
    config: Arc<Config>,
    store: SessionStore,
    strategy: LoginStrategy,
    events: EventBus,
    state: Mutex<SessionState>,
}

impl SessionManager {
    /// Creates a manager over a page, picking the login strategy from
    /// the configured credentials.
    #[must_use]
    pub fn new(page: Arc<dyn Page>, config: Arc<Config>, events: EventBus) -> Self {
        let store = SessionStore::new(config.session.file.clone());
        let strategy = LoginStrategy::from_credentials(&config.storefront.credentials);

        Self {
            page,
            config,
            store,
            strategy,
            events,
            state: Mutex::new(SessionState::Unauthenticated),
        }
    }

    /// Current authentication state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Returns `true` once a session has been confirmed or captured.
    #[inline]
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Selected login strategy.
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> &LoginStrategy {
        &self.strategy
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "Session state transition");
        *state = next;
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Establishes an authenticated session.
    ///
    /// Tries persisted-session reuse first; on failure runs the selected
    /// login strategy. This is the one session operation the caller may
    /// escalate into a fatal startup abort.
    pub async fn login(&self, cancel: &CancellationToken) -> Result<()> {
        if self.load_session().await {
            info!("Found existing session, validating");
            if self.validate_session().await {
                info!("Persisted session is valid");
                self.events.emit(StatusEvent::LoginSucceeded {
                    mode: LoginMode::Restored,
                });
                return Ok(());
            }
            warn!("Persisted session expired");
            self.events.emit(StatusEvent::SessionInvalid);
        }

        match &self.strategy {
            LoginStrategy::Manual => {
                info!("No credentials configured, waiting for manual login");
                self.manual_login(cancel).await
            }
            LoginStrategy::Automated { .. } => {
                info!("Credentials configured, running automated login");
                self.perform_login().await
            }
        }
    }

    /// Waits for the user to complete a login in the browser.
    ///
    /// Polls at the configured interval up to the configured ceiling for
    /// the success signals: URL off the login path AND (a logged-in
    /// marker element OR a session cookie). Cancellable at every poll
    /// boundary.
    pub async fn manual_login(&self, cancel: &CancellationToken) -> Result<()> {
        self.set_state(SessionState::ManualLoginWaiting);

        let login_url = self.config.login_url();
        navigate_with_retry(
            self.page.as_ref(),
            &login_url,
            NAV_ATTEMPTS,
            self.config.timeouts.navigation(),
        )
        .await?;

        info!(url = %login_url, "Login page open, waiting for user to log in");

        let poll = self.config.timeouts.login_poll();
        let ceiling = self.config.timeouts.login_ceiling();
        let started = Instant::now();

        loop {
            if started.elapsed() >= ceiling {
                let waited_secs = ceiling.as_secs();
                self.events.emit(StatusEvent::LoginTimedOut { waited_secs });
                return Err(Error::login_timeout(waited_secs));
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = sleep(poll) => {}
            }

            self.events.emit(StatusEvent::LoginWaiting {
                elapsed_secs: started.elapsed().as_secs(),
            });

            let url = match self.page.current_url().await {
                Ok(url) => url,
                Err(err) => {
                    warn!(error = %err, "Could not read current URL, retrying");
                    continue;
                }
            };

            if url.contains(&self.config.detection.login_path) {
                continue;
            }

            debug!(url = %url, "Off the login page, probing for login markers");
            if self.login_signals_present().await {
                info!("Login detected, capturing session");
                self.save_session().await?;
                self.events.emit(StatusEvent::LoginSucceeded {
                    mode: LoginMode::Manual,
                });
                return Ok(());
            }

            debug!("Login not confirmed yet");
        }
    }

    /// Drives the credential login form.
    ///
    /// Short-circuits to a session save when the login page already
    /// redirects to an authenticated page.
    pub async fn perform_login(&self) -> Result<()> {
        let LoginStrategy::Automated { username, password } = &self.strategy else {
            return Err(Error::login_failed(
                "no credentials configured for automated login",
            ));
        };

        self.set_state(SessionState::AutomatedLoginAttempt);

        let login_url = self.config.login_url();
        navigate_with_retry(
            self.page.as_ref(),
            &login_url,
            NAV_ATTEMPTS,
            self.config.timeouts.navigation(),
        )
        .await?;

        sleep(SETTLE_DELAY).await;

        // Already logged in from browser state.
        let url = self.page.current_url().await?;
        if !url.contains(&self.config.detection.login_path) {
            debug!(url = %url, "Login page redirected, session already active");
            self.save_session().await?;
            self.events.emit(StatusEvent::LoginSucceeded {
                mode: LoginMode::Automated,
            });
            return Ok(());
        }

        self.page.wait_visible(USERNAME_SELECTOR, FORM_WAIT).await?;

        self.page.type_text(USERNAME_SELECTOR, username).await?;
        sleep(FIELD_DELAY).await;
        self.page.type_text(PASSWORD_SELECTOR, password).await?;
        sleep(FIELD_DELAY).await;
        self.page.click(SUBMIT_SELECTOR).await?;
        sleep(SUBMIT_WAIT).await;

        let url = self.page.current_url().await?;
        if url.contains(&self.config.detection.login_path) {
            return Err(Error::login_failed("still on login page after submit"));
        }

        self.save_session().await?;
        self.events.emit(StatusEvent::LoginSucceeded {
            mode: LoginMode::Automated,
        });
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Captures live driver cookies into the persisted store and marks
    /// the session authenticated.
    pub async fn save_session(&self) -> Result<()> {
        let cookies = self.page.cookies().await?;
        if cookies.is_empty() {
            return Err(Error::login_failed("no cookies captured after login"));
        }

        self.store.write(&cookies)?;
        self.set_state(SessionState::Authenticated);
        self.events.emit(StatusEvent::SessionSaved {
            cookie_count: cookies.len(),
        });
        Ok(())
    }

    /// Pushes persisted cookies into the driver.
    ///
    /// Returns `false` - never an error - on a missing, malformed or
    /// unloadable session; the caller falls through to a fresh login.
    pub async fn load_session(&self) -> bool {
        let Some(cookies) = self.store.read() else {
            return false;
        };

        if let Err(err) = self.page.set_cookies(&cookies).await {
            warn!(error = %err, "Failed to install persisted cookies");
            return false;
        }

        self.set_state(SessionState::SessionLoaded);
        self.events.emit(StatusEvent::SessionLoaded {
            cookie_count: cookies.len(),
        });
        true
    }

    /// Checks the session against the live target.
    ///
    /// Navigates to the base URL and requires both an off-login-path URL
    /// and a logged-in marker element. Settles the state either way:
    /// `Authenticated` on success, `Unauthenticated` on failure.
    pub async fn validate_session(&self) -> bool {
        self.set_state(SessionState::Validating);

        let base_url = &self.config.storefront.base_url;
        if navigate_with_retry(
            self.page.as_ref(),
            base_url,
            NAV_ATTEMPTS,
            self.config.timeouts.navigation(),
        )
        .await
        .is_err()
        {
            self.set_state(SessionState::Unauthenticated);
            return false;
        }

        sleep(SETTLE_DELAY).await;

        let url = match self.page.current_url().await {
            Ok(url) => url,
            Err(_) => {
                self.set_state(SessionState::Unauthenticated);
                return false;
            }
        };

        if url.contains(&self.config.detection.login_path) {
            self.set_state(SessionState::Unauthenticated);
            return false;
        }

        let valid = self.marker_element_present().await;
        if valid {
            self.set_state(SessionState::Authenticated);
        } else {
            self.set_state(SessionState::Unauthenticated);
        }
        valid
    }

    /// Clears driver cookies, deletes the persisted session and resets
    /// in-memory state.
    pub async fn logout(&self) -> Result<()> {
        self.page.clear_cookies().await?;
        self.store.delete()?;
        self.set_state(SessionState::Unauthenticated);
        info!("Logged out, session cleared");
        Ok(())
    }

    /// Re-validates the session and re-runs the automated login when it
    /// no longer holds. No-op on a valid session.
    pub async fn refresh_session(&self) -> Result<()> {
        if self.validate_session().await {
            return Ok(());
        }

        warn!("Session no longer valid, re-running login");
        self.events.emit(StatusEvent::SessionInvalid);
        self.perform_login().await
    }

    // ========================================================================
    // Detection Predicates
    // ========================================================================

    /// Manual-login success probe: any logged-in marker element, or a
    /// cookie carrying the session prefix.
    async fn login_signals_present(&self) -> bool {
        let detection = &self.config.detection;
        let mut clauses: Vec<String> = detection
            .logged_in_selectors
            .iter()
            .map(|s| exists_script(s))
            .collect();
        clauses.push(format!(
            "document.cookie.includes({})",
            json_string(&detection.session_cookie_prefix)
        ));

        match self.page.evaluate(&clauses.join(" || ")).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(err) => {
                debug!(error = %err, "Login signal probe failed");
                false
            }
        }
    }

    /// Validation probe: a logged-in marker element only.
    async fn marker_element_present(&self) -> bool {
        let clauses: Vec<String> = self
            .config
            .detection
            .logged_in_selectors
            .iter()
            .map(|s| exists_script(s))
            .collect();

        match self.page.evaluate(&clauses.join(" || ")).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("strategy", &self.strategy)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_manual_without_credentials() {
        let creds = Credentials::default();
        assert_eq!(LoginStrategy::from_credentials(&creds), LoginStrategy::Manual);
    }

    #[test]
    fn test_strategy_manual_with_partial_credentials() {
        let creds = Credentials {
            username: "buyer".to_string(),
            password: String::new(),
        };
        assert_eq!(LoginStrategy::from_credentials(&creds), LoginStrategy::Manual);
    }

    #[test]
    fn test_strategy_automated_with_credentials() {
        let creds = Credentials {
            username: "buyer".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(
            LoginStrategy::from_credentials(&creds),
            LoginStrategy::Automated {
                username: "buyer".to_string(),
                password: "hunter2".to_string(),
            }
        );
    }
}
