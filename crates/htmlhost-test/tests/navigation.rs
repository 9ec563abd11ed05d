//! Navigation state machine tests driven through the scripted engine.

use std::rc::Rc;

use htmlhost_core::{BrowserHost, HostCallback, NavigationDecision, NavigationState};
use htmlhost_test::{
    init_tracing, test_parent, EngineCall, Fixture, HostEvent, RecordingCallback,
    ScriptedProvider,
};

const PAGE_A: &str = "https://example.com/a";
const PAGE_B: &str = "https://example.com/b";

/// The placeholder load never reaches the host.
#[test]
fn test_bootstrap_not_surfaced() {
    let fx = Fixture::new().unwrap();

    assert!(fx.host.blank_shown());
    assert_eq!(fx.engine.navigations(), vec!["about:blank".to_string()]);
    assert_eq!(fx.engine.fetched(), vec!["about:blank".to_string()]);
    assert!(fx.callback.events().is_empty());
    assert_eq!(fx.host.current_url(), None);
}

/// Exactly one before-navigate precedes the matching document-complete.
#[test]
fn test_navigation_reports_before_then_complete() {
    let fx = Fixture::new().unwrap();

    fx.host.navigate_to_url(PAGE_A);
    assert_eq!(fx.callback.before_navigate_urls(), vec![PAGE_A.to_string()]);
    assert_eq!(fx.host.navigation_state(), NavigationState::Loading);
    assert!(fx.host.is_loading());
    assert!(fx.callback.completed_urls().is_empty());

    fx.engine.pump();
    assert_eq!(
        fx.callback.events(),
        vec![
            HostEvent::BeforeNavigate {
                url: PAGE_A.to_string(),
                new_window: false
            },
            HostEvent::DocumentComplete(PAGE_A.to_string()),
        ]
    );
    assert_eq!(fx.host.navigation_state(), NavigationState::Complete);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
}

/// A vetoed navigation fetches nothing and leaves the current URL alone.
#[test]
fn test_veto_stops_before_fetch() {
    let fx = Fixture::new().unwrap();
    fx.host.navigate_to_url(PAGE_A);
    fx.engine.pump();

    fx.callback.veto(PAGE_B);
    fx.host.navigate_to_url(PAGE_B);
    assert_eq!(fx.host.navigation_state(), NavigationState::Idle);
    assert_eq!(fx.engine.pump(), 0);

    assert!(!fx.engine.fetched().contains(&PAGE_B.to_string()));
    assert_eq!(fx.callback.completed_urls(), vec![PAGE_A.to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
}

/// A failed load returns to idle without a host-visible completion.
#[test]
fn test_navigate_error_returns_to_idle() {
    let fx = Fixture::new().unwrap();
    fx.host.navigate_to_url(PAGE_A);
    fx.engine.pump();

    fx.engine.fail_url(PAGE_B, 404);
    fx.host.navigate_to_url(PAGE_B);
    fx.engine.pump();

    assert_eq!(fx.host.navigation_state(), NavigationState::Idle);
    assert_eq!(fx.callback.completed_urls(), vec![PAGE_A.to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
}

/// History flags follow the engine and drive back/forward.
#[test]
fn test_history_navigation() {
    let fx = Fixture::new().unwrap();
    assert!(!fx.host.can_go_back());
    assert!(!fx.host.can_go_forward());

    fx.host.navigate_to_url(PAGE_A);
    fx.engine.pump();
    fx.host.navigate_to_url(PAGE_B);
    fx.engine.pump();
    assert!(fx.host.can_go_back());
    assert!(!fx.host.can_go_forward());

    fx.host.go_back();
    fx.engine.pump();
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
    assert!(fx.host.can_go_forward());

    fx.host.go_forward();
    fx.engine.pump();
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_B));
    assert!(!fx.host.can_go_forward());

    // History moves are announced like any other navigation.
    assert_eq!(
        fx.callback.before_navigate_urls(),
        vec![
            PAGE_A.to_string(),
            PAGE_B.to_string(),
            PAGE_A.to_string(),
            PAGE_B.to_string()
        ]
    );
}

/// Back and forward do nothing while the flags are false.
#[test]
fn test_history_noop_without_entries() {
    let fx = Fixture::new().unwrap();

    fx.host.go_back();
    fx.host.go_forward();

    let calls = fx.engine.calls();
    assert!(!calls.contains(&EngineCall::GoBack));
    assert!(!calls.contains(&EngineCall::GoForward));
    assert!(fx.callback.events().is_empty());
}

/// New-window requests ask the host but do not move this view.
#[test]
fn test_new_window_request() {
    let fx = Fixture::new().unwrap();
    fx.host.navigate_to_url(PAGE_A);
    fx.engine.pump();

    let popup = "https://example.com/popup";
    assert_eq!(fx.engine.request_new_window(popup), NavigationDecision::Allow);
    assert_eq!(
        fx.callback.events().last(),
        Some(&HostEvent::BeforeNavigate {
            url: popup.to_string(),
            new_window: true
        })
    );
    assert_eq!(fx.host.navigation_state(), NavigationState::Complete);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));

    fx.callback.veto(popup);
    assert_eq!(fx.engine.request_new_window(popup), NavigationDecision::Cancel);
    assert_eq!(fx.engine.pending_loads(), 0);
}

/// A callback may navigate the host that is calling it.
#[test]
fn test_navigate_from_document_complete() {
    init_tracing();
    let provider = ScriptedProvider::new();
    let engine = provider.engine();
    let callback = RecordingCallback::new();
    let host = Rc::new(
        BrowserHost::create(
            &provider,
            test_parent(),
            Rc::clone(&callback) as Rc<dyn HostCallback>,
        )
        .unwrap(),
    );
    engine.pump();

    let weak = Rc::downgrade(&host);
    callback.on_complete(move |url| {
        if url == PAGE_A {
            if let Some(host) = weak.upgrade() {
                host.navigate_to_url(PAGE_B);
            }
        }
    });

    host.navigate_to_url(PAGE_A);
    assert_eq!(engine.pump(), 2);

    assert_eq!(
        callback.completed_urls(),
        vec![PAGE_A.to_string(), PAGE_B.to_string()]
    );
    assert_eq!(host.current_url().as_deref(), Some(PAGE_B));
}

/// Starting a new navigation while one loads supersedes it; only the
/// newer one completes.
#[test]
fn test_navigation_supersedes_pending_load() {
    let fx = Fixture::new().unwrap();

    fx.host.navigate_to_url(PAGE_A);
    fx.host.navigate_to_url(PAGE_B);
    assert_eq!(fx.host.navigation_state(), NavigationState::Loading);
    assert_eq!(fx.engine.pending_loads(), 1);

    assert_eq!(fx.engine.pump(), 1);
    assert_eq!(fx.callback.completed_urls(), vec![PAGE_B.to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_B));
    assert!(!fx.engine.fetched().contains(&PAGE_A.to_string()));
    assert_eq!(
        fx.callback.before_navigate_urls(),
        vec![PAGE_A.to_string(), PAGE_B.to_string()]
    );
}

/// Navigating straight after creation replaces the placeholder load.
#[test]
fn test_navigate_before_placeholder_loads() {
    let fx = Fixture::before_placeholder().unwrap();

    fx.host.navigate_to_url(PAGE_A);
    assert_eq!(fx.engine.pump(), 1);

    assert_eq!(
        fx.callback.events(),
        vec![
            HostEvent::BeforeNavigate {
                url: PAGE_A.to_string(),
                new_window: false
            },
            HostEvent::DocumentComplete(PAGE_A.to_string()),
        ]
    );
    assert_eq!(fx.engine.fetched(), vec![PAGE_A.to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
}

/// A placeholder completion arriving while the host's own load is in
/// flight leaves that load pending, so its failure still returns to idle.
#[test]
fn test_placeholder_completion_during_host_load() {
    let fx = Fixture::before_placeholder().unwrap();
    fx.engine.fail_url(PAGE_B, 404);

    fx.host.navigate_to_url(PAGE_B);
    fx.engine.complete_document("about:blank");
    assert_eq!(fx.host.navigation_state(), NavigationState::Loading);
    assert!(fx.host.is_loading());

    fx.engine.pump();
    assert_eq!(fx.host.navigation_state(), NavigationState::Idle);
    assert!(fx.callback.completed_urls().is_empty());
    assert_eq!(fx.host.current_url(), None);
}

/// A placeholder completion arriving after the host's load finished is
/// still swallowed.
#[test]
fn test_late_placeholder_completion_not_surfaced() {
    let fx = Fixture::before_placeholder().unwrap();
    fx.host.navigate_to_url(PAGE_A);
    fx.engine.pump();

    fx.engine.complete_document("about:blank");

    assert_eq!(fx.callback.completed_urls(), vec![PAGE_A.to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some(PAGE_A));
    assert_eq!(fx.host.navigation_state(), NavigationState::Complete);
}

/// The host's own blank navigation is asked about and reported, even while
/// the placeholder is still loading.
#[test]
fn test_explicit_blank_navigation_reaches_host() {
    let fx = Fixture::before_placeholder().unwrap();

    fx.host.navigate_to_url("about:blank");
    assert_eq!(fx.callback.before_navigate_urls(), vec!["about:blank".to_string()]);

    fx.engine.pump();
    assert_eq!(fx.callback.completed_urls(), vec!["about:blank".to_string()]);
    assert_eq!(fx.host.current_url().as_deref(), Some("about:blank"));
}
