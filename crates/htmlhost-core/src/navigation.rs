//! Navigation state machine for one hosted control.
//!
//! The engine drives every transition through its events; the machine only
//! records where a view is and decides which events the host gets to see.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info, trace, warn};
use url::Url;

use crate::engine::HistoryCommand;
use crate::error::NavigationError;

/// Unique identifier for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavigationId(u64);

impl NavigationId {
    /// Create a new unique NavigationId.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NavigationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the view is in its current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// Nothing in flight. `current_url` holds the last completed URL.
    Idle,
    /// The engine announced a navigation and the host is deciding.
    NavigatePending,
    /// The navigation was allowed and the engine is fetching.
    Loading,
    /// The last navigation reached document completion.
    Complete,
}

/// A navigation the engine has announced.
#[derive(Debug, Clone)]
pub struct PendingNavigation {
    pub id: NavigationId,
    pub url: String,
    /// The internal placeholder load issued at creation.
    pub bootstrap: bool,
    pub started_at: Instant,
}

/// Whether a completion should reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Surfaced,
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bootstrap {
    NotStarted,
    /// The placeholder was requested; the next announced navigation is it.
    Armed(String),
    /// The engine announced the placeholder under this URL.
    Loading(String),
    /// A host navigation finished first. A late placeholder event for this
    /// URL is still swallowed.
    Abandoned(String),
    Done,
}

/// Same document, tolerating spelling differences the engine may apply
/// (e.g. a trailing slash on an origin).
fn same_url(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Navigation state machine for a single view.
#[derive(Debug)]
pub struct NavigationStateMachine {
    state: NavigationState,
    pending: Option<PendingNavigation>,
    current_url: Option<String>,
    can_go_back: bool,
    can_go_forward: bool,
    bootstrap: Bootstrap,
}

impl Default for NavigationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationStateMachine {
    pub fn new() -> Self {
        Self {
            state: NavigationState::Idle,
            pending: None,
            current_url: None,
            can_go_back: false,
            can_go_forward: false,
            bootstrap: Bootstrap::NotStarted,
        }
    }

    /// The placeholder load for `url` is about to be issued. The next
    /// navigation the engine announces is treated as that load, and none of
    /// its events reach the host.
    pub fn start_bootstrap(&mut self, url: &str) {
        debug!(%url, "Bootstrap navigation armed");
        self.bootstrap = Bootstrap::Armed(url.to_string());
    }

    /// The placeholder load was never issued.
    pub fn cancel_bootstrap(&mut self) {
        if matches!(self.bootstrap, Bootstrap::Armed(_)) {
            debug!("Bootstrap navigation cancelled");
            self.bootstrap = Bootstrap::Done;
        }
    }

    /// Whether the placeholder load is still outstanding.
    pub fn bootstrap_pending(&self) -> bool {
        matches!(self.bootstrap, Bootstrap::Armed(_) | Bootstrap::Loading(_))
    }

    fn is_bootstrap_url(&self, url: &str) -> bool {
        match &self.bootstrap {
            Bootstrap::Armed(blank) | Bootstrap::Loading(blank) | Bootstrap::Abandoned(blank) => {
                same_url(blank, url)
            }
            Bootstrap::NotStarted | Bootstrap::Done => false,
        }
    }

    fn pending_matches(&self, url: &str) -> bool {
        self.pending
            .as_ref()
            .map(|nav| same_url(&nav.url, url))
            .unwrap_or(false)
    }

    /// The engine announced a navigation to `url`. Returns `true` when it is
    /// the bootstrap load, which needs no host decision.
    ///
    /// A new navigation supersedes whatever was in flight.
    pub fn begin(&mut self, url: &str) -> bool {
        if let Some(previous) = &self.pending {
            debug!(navigation_id = ?previous.id, url = %previous.url, "Navigation superseded");
        }

        let bootstrap = match &self.bootstrap {
            Bootstrap::Armed(blank) => {
                if !same_url(blank, url) {
                    debug!(expected = %blank, %url, "Bootstrap announced under another URL");
                }
                self.bootstrap = Bootstrap::Loading(url.to_string());
                true
            }
            Bootstrap::Abandoned(blank) if same_url(blank, url) => {
                // The host asked for the placeholder's URL itself.
                self.bootstrap = Bootstrap::Done;
                false
            }
            _ => false,
        };

        let nav = PendingNavigation {
            id: NavigationId::new(),
            url: url.to_string(),
            bootstrap,
            started_at: Instant::now(),
        };
        trace!(navigation_id = ?nav.id, %url, bootstrap, "Navigation pending");

        self.pending = Some(nav);
        self.state = NavigationState::NavigatePending;
        bootstrap
    }

    /// The host (or the bootstrap rule) let the pending navigation proceed.
    pub fn allow(&mut self) -> Result<NavigationId, NavigationError> {
        let id = self.pending_id("allow")?;
        self.state = NavigationState::Loading;
        debug!(navigation_id = ?id, "Navigation allowed");
        Ok(id)
    }

    /// The host vetoed the pending navigation. Nothing was fetched.
    pub fn veto(&mut self) -> Result<NavigationId, NavigationError> {
        let id = self.pending_id("veto")?;
        let nav = self.pending.take();
        self.state = NavigationState::Idle;
        debug!(navigation_id = ?id, url = ?nav.map(|n| n.url), "Navigation vetoed");
        Ok(id)
    }

    fn pending_id(&self, event: &'static str) -> Result<NavigationId, NavigationError> {
        match (&self.pending, self.state) {
            (Some(nav), NavigationState::NavigatePending) => Ok(nav.id),
            (_, state) => Err(NavigationError::InvalidTransition { from: state, event }),
        }
    }

    /// The engine finished loading `url`.
    ///
    /// Only a completion of the pending navigation moves the machine. With
    /// nothing pending the engine navigated on its own and the completion is
    /// accepted as is. Placeholder completions and completions of superseded
    /// loads are suppressed and leave the pending navigation alone.
    pub fn complete(&mut self, url: &str, can_go_back: bool, can_go_forward: bool) -> Completion {
        self.can_go_back = can_go_back;
        self.can_go_forward = can_go_forward;

        match self.pending.as_ref().map(|nav| nav.bootstrap) {
            Some(false) if self.pending_matches(url) => self.surface(url),
            _ if self.is_bootstrap_url(url) => {
                self.bootstrap = Bootstrap::Done;
                if self.pending.as_ref().map(|nav| nav.bootstrap).unwrap_or(false) {
                    self.pending = None;
                    self.state = NavigationState::Complete;
                }
                debug!(%url, state = ?self.state, "Bootstrap navigation complete");
                Completion::Suppressed
            }
            // Nothing announced: the engine navigated on its own.
            None => self.surface(url),
            _ => {
                debug!(
                    expected = ?self.pending.as_ref().map(|nav| &nav.url),
                    %url,
                    "Ignoring completion of a superseded load"
                );
                Completion::Suppressed
            }
        }
    }

    fn surface(&mut self, url: &str) -> Completion {
        let nav = self.pending.take();
        self.state = NavigationState::Complete;

        match &self.bootstrap {
            Bootstrap::Armed(blank) | Bootstrap::Loading(blank) => {
                self.bootstrap = if same_url(blank, url) {
                    Bootstrap::Done
                } else {
                    Bootstrap::Abandoned(blank.clone())
                };
            }
            Bootstrap::Abandoned(blank) if same_url(blank, url) => {
                self.bootstrap = Bootstrap::Done;
            }
            _ => {}
        }

        match nav {
            Some(nav) => {
                info!(navigation_id = ?nav.id, %url, elapsed_ms = ?nav.started_at.elapsed().as_millis(), "Navigation complete")
            }
            None => info!(%url, "Navigation complete"),
        }
        self.current_url = Some(url.to_string());
        Completion::Surfaced
    }

    /// The engine could not load `url` after it was allowed.
    ///
    /// Failing the pending navigation returns to `Idle`. A failed
    /// placeholder finishes the bootstrap without touching a host load.
    pub fn fail(&mut self, url: &str, status: i32) -> Result<(), NavigationError> {
        if self.is_loading() && self.pending_matches(url) {
            warn!(%url, status, "Navigation failed");
            let bootstrap = self.pending.take().map(|nav| nav.bootstrap).unwrap_or(false);
            if bootstrap {
                self.bootstrap = Bootstrap::Done;
            }
            self.state = NavigationState::Idle;
            return Ok(());
        }

        if self.is_bootstrap_url(url) {
            debug!(%url, status, "Bootstrap navigation failed");
            self.bootstrap = Bootstrap::Done;
            return Ok(());
        }

        Err(NavigationError::InvalidTransition {
            from: self.state,
            event: "fail",
        })
    }

    /// The engine reported a change in history command availability.
    pub fn set_command_state(&mut self, command: HistoryCommand, enabled: bool) {
        trace!(?command, enabled, "Command state changed");
        match command {
            HistoryCommand::Back => self.can_go_back = enabled,
            HistoryCommand::Forward => self.can_go_forward = enabled,
        }
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// Check if navigation is in progress.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            NavigationState::NavigatePending | NavigationState::Loading
        )
    }

    pub fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn can_go_back(&self) -> bool {
        self.can_go_back
    }

    pub fn can_go_forward(&self) -> bool {
        self.can_go_forward
    }
}
