//! Construction and teardown ordering.

use std::rc::Rc;

use htmlhost_core::{BrowserHost, HostCallback, HostConfig, HostError, ZoomConfig};
use htmlhost_test::{init_tracing, test_parent, EngineCall, Fixture, RecordingCallback, ScriptedProvider};

fn create(provider: &ScriptedProvider, callback: &Rc<RecordingCallback>) -> Result<BrowserHost, HostError> {
    init_tracing();
    BrowserHost::create(
        provider,
        test_parent(),
        Rc::clone(callback) as Rc<dyn HostCallback>,
    )
}

/// Site, scheme, activation, subscription, then the placeholder load.
#[test]
fn test_create_sequence() {
    let fx = Fixture::new().unwrap();
    let calls = fx.engine.calls();

    assert!(matches!(
        &calls[..5],
        [
            EngineCall::SetClientSite(true),
            EngineCall::RegisterScheme(scheme),
            EngineCall::ActivateInPlace(parent),
            EngineCall::Advise(_),
            EngineCall::Navigate(blank),
        ] if *parent == test_parent() && scheme == "htmlhost" && blank == "about:blank"
    ));
    assert_eq!(fx.engine.sink_count(), 1);
    assert_eq!(fx.host.engine_window(), Some(fx.engine.window()));
    assert_eq!(fx.host.parent_window(), Some(test_parent()));
}

/// The subscription is released before the client site is cleared and the
/// engine is closed.
#[test]
fn test_teardown_order() {
    let Fixture {
        engine, host, ..
    } = Fixture::new().unwrap();
    drop(host);

    let unadvise = engine
        .call_index(|c| matches!(c, EngineCall::Unadvise(_)))
        .unwrap();
    let clear_site = engine
        .call_index(|c| *c == EngineCall::SetClientSite(false))
        .unwrap();
    let close = engine.call_index(|c| *c == EngineCall::Close).unwrap();

    assert!(unadvise < clear_site);
    assert!(clear_site < close);
    assert_eq!(engine.sink_count(), 0);
    assert!(!engine.has_client_site());
    assert!(engine.is_closed());
}

/// The cookie released is the cookie advised.
#[test]
fn test_unadvise_matches_advise() {
    let Fixture {
        engine, host, ..
    } = Fixture::new().unwrap();
    drop(host);

    let calls = engine.calls();
    let advised: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            EngineCall::Advise(cookie) => Some(*cookie),
            _ => None,
        })
        .collect();
    let unadvised: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            EngineCall::Unadvise(cookie) => Some(*cookie),
            _ => None,
        })
        .collect();
    assert_eq!(advised.len(), 1);
    assert_eq!(advised, unadvised);
}

/// Events raised on a released sink never reach the host.
#[test]
fn test_no_events_after_teardown() {
    let Fixture {
        engine,
        host,
        callback,
        ..
    } = Fixture::new().unwrap();
    drop(host);

    engine.fire_stale_document_complete("https://example.com/late");
    engine.click();

    assert!(callback.events().is_empty());
}

/// Loads still queued at teardown are abandoned.
#[test]
fn test_teardown_abandons_pending_load() {
    let Fixture {
        engine,
        host,
        callback,
        ..
    } = Fixture::new().unwrap();
    host.navigate_to_url("https://example.com/slow");
    assert_eq!(engine.pending_loads(), 1);

    drop(host);
    assert_eq!(engine.pump(), 0);
    assert_eq!(callback.completed_urls(), Vec::<String>::new());
}

#[test]
fn test_instantiation_failure() {
    let provider = ScriptedProvider::new();
    provider.fail_instantiation();
    let callback = RecordingCallback::new();

    let err = create(&provider, &callback).unwrap_err();
    assert!(matches!(err, HostError::Instantiate(_)));
    assert!(provider.engine().calls().is_empty());
}

/// A failed activation releases the engine and subscribes nothing.
#[test]
fn test_activation_failure_leaves_nothing_subscribed() {
    let provider = ScriptedProvider::new();
    let engine = provider.engine();
    engine.fail_activation();
    let callback = RecordingCallback::new();

    let err = create(&provider, &callback).unwrap_err();
    assert!(matches!(err, HostError::Activate(_)));

    let calls = engine.calls();
    assert!(!calls.iter().any(|c| matches!(c, EngineCall::Advise(_))));
    assert!(calls.contains(&EngineCall::SetClientSite(false)));
    assert_eq!(calls.last(), Some(&EngineCall::Close));
    assert_eq!(engine.sink_count(), 0);
    assert!(!engine.has_client_site());
}

#[test]
fn test_subscription_failure() {
    let provider = ScriptedProvider::new();
    let engine = provider.engine();
    engine.fail_advise();
    let callback = RecordingCallback::new();

    let err = create(&provider, &callback).unwrap_err();
    assert!(matches!(err, HostError::Subscribe(_)));
    assert!(engine.navigations().is_empty());
    assert!(engine.is_closed());
    assert!(callback.events().is_empty());
}

/// Bad configuration is rejected before an engine is created.
#[test]
fn test_invalid_config_rejected_early() {
    let provider = ScriptedProvider::new();
    let callback = RecordingCallback::new();
    let config = HostConfig {
        zoom: ZoomConfig {
            min: 400,
            max: 100,
            initial: 100,
        },
        ..HostConfig::default()
    };

    let err = BrowserHost::create_with_config(
        &provider,
        test_parent(),
        Rc::clone(&callback) as Rc<dyn HostCallback>,
        config,
    )
    .unwrap_err();
    assert!(matches!(err, HostError::Config(_)));
    assert!(provider.engine().calls().is_empty());
}

#[test]
fn test_host_ids_are_unique() {
    let a = Fixture::new().unwrap();
    let b = Fixture::new().unwrap();
    assert_ne!(a.host.host_id(), b.host.host_id());
}
