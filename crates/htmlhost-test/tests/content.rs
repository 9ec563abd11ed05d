//! Synthetic content tests: set_html, host-supplied data URLs and links
//! between synthetic pages.

use htmlhost_core::{HostConfig, NavigationState};
use htmlhost_test::{Fixture, HostEvent};

/// `set_html` bytes reach the engine unchanged and nothing is fetched.
#[test]
fn test_set_html_serves_bytes_without_fetch() {
    let fx = Fixture::new().unwrap();
    let html = b"<html><body><h1>Hello</h1></body></html>";

    fx.host.set_html(html);
    fx.engine.pump();

    let url = format!("htmlhost://w{}/index.html", fx.host.host_id());
    assert_eq!(fx.engine.document().as_deref(), Some(&html[..]));
    assert_eq!(fx.engine.fetched(), vec!["about:blank".to_string()]);
    assert_eq!(fx.callback.completed_urls(), vec![url.clone()]);
    assert_eq!(fx.host.current_url(), Some(url));
    assert!(fx.callback.data_requests().is_empty());
}

/// Data URLs ask the host for their bytes, once, under the host's own URL.
#[test]
fn test_data_url_asks_host() {
    let fx = Fixture::new().unwrap();
    fx.callback.serve("book/ch1.html", b"<p>Chapter 1</p>");

    fx.host.navigate_to_data_url("book/ch1.html");
    fx.engine.pump();

    let url = format!("htmlhost://w{}/book/ch1.html", fx.host.host_id());
    assert_eq!(fx.callback.data_requests(), vec!["book/ch1.html".to_string()]);
    assert_eq!(fx.engine.document().as_deref(), Some(&b"<p>Chapter 1</p>"[..]));
    assert_eq!(
        fx.callback.events(),
        vec![
            HostEvent::BeforeNavigate {
                url: url.clone(),
                new_window: false
            },
            HostEvent::DataRequest("book/ch1.html".to_string()),
            HostEvent::DocumentComplete(url),
        ]
    );
}

/// Missing data fails the navigation through the engine; the host sees no
/// completion and no extra signal.
#[test]
fn test_data_url_without_data_fails() {
    let fx = Fixture::new().unwrap();

    fx.host.navigate_to_data_url("missing.html");
    fx.engine.pump();

    assert_eq!(fx.callback.data_requests(), vec!["missing.html".to_string()]);
    assert!(fx.callback.completed_urls().is_empty());
    assert_eq!(fx.host.navigation_state(), NavigationState::Idle);
    assert_eq!(fx.engine.document(), None);
}

/// Vetoing a synthetic navigation never asks for its data.
#[test]
fn test_vetoed_data_url_requests_nothing() {
    let fx = Fixture::new().unwrap();
    let url = format!("htmlhost://w{}/secret.html", fx.host.host_id());
    fx.callback.veto(&url);
    fx.callback.serve("secret.html", b"nope");

    fx.host.navigate_to_data_url("secret.html");
    fx.engine.pump();

    assert!(fx.callback.data_requests().is_empty());
    assert!(fx.callback.completed_urls().is_empty());
}

/// Links inside a synthetic page resolve back to the host.
#[test]
fn test_relative_link_resolves_through_host() {
    let fx = Fixture::new().unwrap();
    fx.callback.serve("ch2.html", b"<p>Chapter 2</p>");
    fx.host.set_html(b"<a href=\"ch2.html\">next</a>");
    fx.engine.pump();

    let link = format!("htmlhost://w{}/ch2.html", fx.host.host_id());
    fx.engine.click_link(&link);
    fx.engine.pump();

    assert_eq!(fx.callback.data_requests(), vec!["ch2.html".to_string()]);
    assert_eq!(fx.engine.document().as_deref(), Some(&b"<p>Chapter 2</p>"[..]));
    assert_eq!(fx.host.current_url(), Some(link));
}

/// WebView2 serves custom schemes over http; both forms resolve.
#[test]
fn test_webview_form_resolves() {
    let fx = Fixture::new().unwrap();
    fx.callback.serve("ch3.html", b"<p>Chapter 3</p>");

    let link = format!("http://htmlhost.w{}/ch3.html", fx.host.host_id());
    fx.engine.click_link(&link);
    fx.engine.pump();

    assert_eq!(fx.callback.data_requests(), vec!["ch3.html".to_string()]);
    assert_eq!(fx.callback.completed_urls(), vec![link]);
}

/// Synthetic URLs owned by another host are refused.
#[test]
fn test_foreign_host_id_refused() {
    let fx = Fixture::new().unwrap();
    fx.callback.serve("page.html", b"x");

    let link = format!("htmlhost://w{}/page.html", fx.host.host_id() + 1000);
    fx.engine.click_link(&link);
    fx.engine.pump();

    assert!(fx.callback.data_requests().is_empty());
    assert!(fx.callback.completed_urls().is_empty());
    assert_eq!(fx.host.navigation_state(), NavigationState::Idle);
}

/// The content scheme comes from configuration.
#[test]
fn test_custom_content_scheme() {
    use htmlhost_core::{BrowserHost, HostCallback};
    use htmlhost_test::{test_parent, RecordingCallback, ScriptedProvider};
    use std::rc::Rc;

    let provider = ScriptedProvider::new();
    let engine = provider.engine();
    let callback = RecordingCallback::new();
    let config = HostConfig::from_json_str(r#"{ "content_scheme": "its" }"#).unwrap();
    let host = BrowserHost::create_with_config(
        &provider,
        test_parent(),
        Rc::clone(&callback) as Rc<dyn HostCallback>,
        config,
    )
    .unwrap();
    engine.pump();

    assert_eq!(engine.registered_scheme().as_deref(), Some("its"));

    host.set_html(b"<p>its</p>");
    engine.pump();
    assert_eq!(
        host.current_url(),
        Some(format!("its://w{}/index.html", host.host_id()))
    );
    assert_eq!(engine.document().as_deref(), Some(&b"<p>its</p>"[..]));
}
