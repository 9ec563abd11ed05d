//! Synthetic content: in-memory pages served to the engine as if fetched.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Weak;

use tracing::{debug, trace};
use url::Url;

use crate::callback::HostCallback;
use crate::engine::ContentBinding;
use crate::error::BindError;

/// A URL in the content scheme, owned by one host.
///
/// Formatted as `<scheme>://w<host-id>/<path>`. WebView2 serves custom
/// schemes as `http://<scheme>.<host>/<path>`, which [`SyntheticUrl::parse`]
/// also accepts. Fragments are dropped; queries are kept as part of `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticUrl {
    scheme: String,
    host_id: u64,
    path: String,
}

impl SyntheticUrl {
    pub fn new(scheme: impl Into<String>, host_id: u64, path: &str) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            host_id,
            path: path.trim_start_matches('/').to_string(),
        }
    }

    /// Parse `url` as a synthetic URL in `scheme`. Returns `None` for
    /// anything else.
    pub fn parse(scheme: &str, url: &str) -> Option<Self> {
        let scheme = scheme.to_ascii_lowercase();
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;

        let label = if parsed.scheme() == scheme {
            host
        } else if matches!(parsed.scheme(), "http" | "https") {
            host.strip_prefix(scheme.as_str())?.strip_prefix('.')?
        } else {
            return None;
        };

        let host_id = label.strip_prefix('w')?.parse::<u64>().ok()?;

        let mut path = parsed.path().trim_start_matches('/').to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Some(Self {
            scheme,
            host_id,
            path,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host_id(&self) -> u64 {
        self.host_id
    }

    /// Host-facing part of the URL, without the synthetic origin.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for SyntheticUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://w{}/{}", self.scheme, self.host_id, self.path)
    }
}

enum Payload {
    /// Bytes registered up front by `set_html`; handed out once.
    Buffer(RefCell<Option<Vec<u8>>>),
    /// Bytes requested from the host when the engine binds.
    OnDemand {
        data_url: String,
        callback: Weak<dyn HostCallback>,
    },
}

/// Content binding for exactly one synthetic URL.
pub struct ContentSource {
    target: SyntheticUrl,
    url: String,
    payload: Payload,
    consumed: Cell<bool>,
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.payload {
            Payload::Buffer(_) => "buffer",
            Payload::OnDemand { .. } => "on-demand",
        };
        f.debug_struct("ContentSource")
            .field("url", &self.url)
            .field("kind", &kind)
            .field("consumed", &self.consumed.get())
            .finish()
    }
}

impl ContentSource {
    /// Serve `data` for `target`.
    pub fn with_buffer(target: SyntheticUrl, data: Vec<u8>) -> Self {
        let url = target.to_string();
        debug!(%url, len = data.len(), "Registered content buffer");
        Self {
            target,
            url,
            payload: Payload::Buffer(RefCell::new(Some(data))),
            consumed: Cell::new(false),
        }
    }

    /// Ask `callback` for the bytes of `data_url` when the engine binds.
    pub fn on_demand(
        target: SyntheticUrl,
        data_url: impl Into<String>,
        callback: Weak<dyn HostCallback>,
    ) -> Self {
        let url = target.to_string();
        Self {
            target,
            url,
            payload: Payload::OnDemand {
                data_url: data_url.into(),
                callback,
            },
            consumed: Cell::new(false),
        }
    }

    pub fn target(&self) -> &SyntheticUrl {
        &self.target
    }

    /// Whether `url` names the resource this source serves.
    pub fn serves(&self, url: &str) -> bool {
        SyntheticUrl::parse(self.target.scheme(), url).as_ref() == Some(&self.target)
    }

    /// Whether the engine has already received the bytes.
    pub fn is_consumed(&self) -> bool {
        self.consumed.get()
    }
}

impl ContentBinding for ContentSource {
    fn bind_to_storage(&self, url: &str) -> Result<Vec<u8>, BindError> {
        if !self.serves(url) {
            return Err(BindError::WrongUrl {
                requested: url.to_string(),
                served: self.url.clone(),
            });
        }

        let data = match &self.payload {
            Payload::Buffer(slot) => {
                let data = slot.borrow_mut().take();
                data.ok_or_else(|| BindError::Consumed(self.url.clone()))?
            }
            Payload::OnDemand { data_url, callback } => {
                let callback = callback.upgrade().ok_or(BindError::Detached)?;
                trace!(%data_url, "Requesting content from host");
                callback
                    .get_data_for_url(data_url)
                    .ok_or_else(|| BindError::NoData(data_url.clone()))?
            }
        };

        self.consumed.set(true);
        debug!(url = %self.url, len = data.len(), "Content bound to engine");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct MapCallback {
        pages: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl HostCallback for MapCallback {
        fn on_before_navigate(&self, _url: &str, _new_window: bool) -> bool {
            true
        }

        fn on_document_complete(&self, _url: &str) {}

        fn get_data_for_url(&self, url: &str) -> Option<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned()
        }

        fn on_lbutton_down(&self) {}
    }

    #[test]
    fn test_synthetic_url_format_and_parse() {
        let url = SyntheticUrl::new("htmlhost", 7, "/chapter1.html");
        assert_eq!(url.to_string(), "htmlhost://w7/chapter1.html");

        let parsed = SyntheticUrl::parse("htmlhost", "htmlhost://w7/chapter1.html").unwrap();
        assert_eq!(parsed, url);
        assert_eq!(parsed.host_id(), 7);
        assert_eq!(parsed.path(), "chapter1.html");
    }

    #[test]
    fn test_synthetic_url_parses_webview_form() {
        let parsed =
            SyntheticUrl::parse("htmlhost", "http://htmlhost.w12/OEBPS/ch2.xhtml?x=1#top").unwrap();
        assert_eq!(parsed.host_id(), 12);
        assert_eq!(parsed.path(), "OEBPS/ch2.xhtml?x=1");
    }

    #[test]
    fn test_synthetic_url_rejects_foreign_urls() {
        assert!(SyntheticUrl::parse("htmlhost", "https://example.com/").is_none());
        assert!(SyntheticUrl::parse("htmlhost", "other://w1/a.html").is_none());
        assert!(SyntheticUrl::parse("htmlhost", "htmlhost://x1/a.html").is_none());
        assert!(SyntheticUrl::parse("htmlhost", "about:blank").is_none());
    }

    #[test]
    fn test_buffer_handed_out_once() {
        let source = ContentSource::with_buffer(
            SyntheticUrl::new("htmlhost", 1, "index.html"),
            b"<p>hi</p>".to_vec(),
        );
        assert!(!source.is_consumed());

        let data = source.bind_to_storage("htmlhost://w1/index.html").unwrap();
        assert_eq!(data, b"<p>hi</p>");
        assert!(source.is_consumed());

        let err = source.bind_to_storage("htmlhost://w1/index.html").unwrap_err();
        assert!(matches!(err, BindError::Consumed(_)));
    }

    #[test]
    fn test_wrong_url_rejected() {
        let source =
            ContentSource::with_buffer(SyntheticUrl::new("htmlhost", 1, "index.html"), Vec::new());
        let err = source.bind_to_storage("htmlhost://w2/index.html").unwrap_err();
        assert!(matches!(err, BindError::WrongUrl { .. }));
        assert!(!source.is_consumed());
    }

    #[test]
    fn test_on_demand_asks_host() {
        let mut callback = MapCallback::default();
        callback
            .pages
            .insert("chapter1.html".to_string(), b"chapter".to_vec());
        let callback: Rc<MapCallback> = Rc::new(callback);
        let weak: Weak<dyn HostCallback> = Rc::downgrade(&callback) as Weak<dyn HostCallback>;

        let source = ContentSource::on_demand(
            SyntheticUrl::new("htmlhost", 3, "chapter1.html"),
            "chapter1.html",
            weak,
        );
        let data = source.bind_to_storage("htmlhost://w3/chapter1.html").unwrap();
        assert_eq!(data, b"chapter");
        assert_eq!(*callback.requests.borrow(), vec!["chapter1.html".to_string()]);
    }

    #[test]
    fn test_on_demand_without_data_fails() {
        let callback: Rc<dyn HostCallback> = Rc::new(MapCallback::default());
        let source = ContentSource::on_demand(
            SyntheticUrl::new("htmlhost", 3, "missing.html"),
            "missing.html",
            Rc::downgrade(&callback),
        );
        let err = source.bind_to_storage("htmlhost://w3/missing.html").unwrap_err();
        assert_eq!(err, BindError::NoData("missing.html".to_string()));
    }

    #[test]
    fn test_on_demand_detached_host() {
        let callback: Rc<dyn HostCallback> = Rc::new(MapCallback::default());
        let source = ContentSource::on_demand(
            SyntheticUrl::new("htmlhost", 3, "page.html"),
            "page.html",
            Rc::downgrade(&callback),
        );
        drop(callback);
        let err = source.bind_to_storage("htmlhost://w3/page.html").unwrap_err();
        assert_eq!(err, BindError::Detached);
    }
}
