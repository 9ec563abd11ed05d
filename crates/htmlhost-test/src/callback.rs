//! # Recording Callback
//!
//! A [`HostCallback`] that records every call and answers from
//! pre-registered vetoes and pages.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use htmlhost_core::HostCallback;

/// One call the host received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    BeforeNavigate { url: String, new_window: bool },
    DocumentComplete(String),
    DataRequest(String),
    LButtonDown,
    FilesDropped(Vec<PathBuf>),
}

type Hook = Box<dyn Fn(&str)>;

/// Records callbacks in order.
#[derive(Default)]
pub struct RecordingCallback {
    events: RefCell<Vec<HostEvent>>,
    vetoed: RefCell<HashSet<String>>,
    pages: RefCell<HashMap<String, Vec<u8>>>,
    on_complete: RefCell<Option<Hook>>,
}

impl RecordingCallback {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Refuse navigations to `url`.
    pub fn veto(&self, url: &str) {
        self.vetoed.borrow_mut().insert(url.to_string());
    }

    /// Answer `get_data_for_url(url)` with `data`.
    pub fn serve(&self, url: &str, data: &[u8]) {
        self.pages.borrow_mut().insert(url.to_string(), data.to_vec());
    }

    /// Run `hook` from inside every `on_document_complete`.
    pub fn on_complete(&self, hook: impl Fn(&str) + 'static) {
        *self.on_complete.borrow_mut() = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// URLs passed to `on_before_navigate` for this view.
    pub fn before_navigate_urls(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                HostEvent::BeforeNavigate {
                    url,
                    new_window: false,
                } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn completed_urls(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                HostEvent::DocumentComplete(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn data_requests(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                HostEvent::DataRequest(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl HostCallback for RecordingCallback {
    fn on_before_navigate(&self, url: &str, new_window: bool) -> bool {
        self.record(HostEvent::BeforeNavigate {
            url: url.to_string(),
            new_window,
        });
        !self.vetoed.borrow().contains(url)
    }

    fn on_document_complete(&self, url: &str) {
        self.record(HostEvent::DocumentComplete(url.to_string()));
        if let Some(hook) = self.on_complete.borrow().as_ref() {
            hook(url);
        }
    }

    fn get_data_for_url(&self, url: &str) -> Option<Vec<u8>> {
        self.record(HostEvent::DataRequest(url.to_string()));
        self.pages.borrow().get(url).cloned()
    }

    fn on_lbutton_down(&self) {
        self.record(HostEvent::LButtonDown);
    }

    fn on_files_dropped(&self, paths: Vec<PathBuf>) {
        self.record(HostEvent::FilesDropped(paths));
    }
}
