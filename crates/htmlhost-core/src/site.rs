//! The container-side object the engine talks to.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::engine::{
    AdviseCookie, BrowserEngine, ClientSite, ConnectionPoint, ContentBinding, DataObject,
    DropEffect, EngineEvents, HistoryCommand, InPlaceSite, NavigationDecision, NavigationEvent,
    UiHandler,
};
use crate::error::{DragDropError, EngineResult};
use crate::geometry::{Rect, WindowHandle};
use crate::host::HostInner;

/// An advised event sink. Unadvises exactly once, on drop.
#[derive(Debug)]
pub struct Subscription {
    source: Weak<dyn BrowserEngine>,
    cookie: AdviseCookie,
}

impl Subscription {
    /// Advise `sink` on `engine`.
    pub fn advise(engine: &Rc<dyn BrowserEngine>, sink: Rc<dyn EngineEvents>) -> EngineResult<Self> {
        let cookie = engine.advise(sink)?;
        debug!(cookie = cookie.raw(), "Event sink advised");
        Ok(Self {
            source: Rc::downgrade(engine),
            cookie,
        })
    }

    pub fn cookie(&self) -> AdviseCookie {
        self.cookie
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        match self.source.upgrade() {
            Some(engine) => match engine.unadvise(self.cookie) {
                Ok(()) => debug!(cookie = self.cookie.raw(), "Event sink unadvised"),
                Err(e) => warn!(cookie = self.cookie.raw(), error = %e, "Unadvise failed"),
            },
            None => debug!(cookie = self.cookie.raw(), "Engine already released; nothing to unadvise"),
        }
    }
}

/// Implements every capability the engine requires of its host and
/// forwards engine events to the owning [`BrowserHost`](crate::BrowserHost).
///
/// Holds only a weak reference to the host. Once disconnected, every
/// engine-raised event is dropped.
pub struct ContainerSite {
    host: Weak<HostInner>,
    subscription: RefCell<Option<Subscription>>,
    disconnected: Cell<bool>,
}

impl ContainerSite {
    pub(crate) fn new(host: Weak<HostInner>) -> Rc<Self> {
        Rc::new(Self {
            host,
            subscription: RefCell::new(None),
            disconnected: Cell::new(false),
        })
    }

    /// Take ownership of the event subscription.
    pub(crate) fn attach(&self, subscription: Subscription) {
        trace!(cookie = subscription.cookie().raw(), "Container site subscribed");
        let previous = self.subscription.borrow_mut().replace(subscription);
        if previous.is_some() {
            warn!("Container site re-subscribed; previous sink released");
        }
    }

    /// Release the subscription and stop forwarding events. Idempotent.
    pub fn disconnect(&self) {
        if self.disconnected.replace(true) {
            trace!("Container site already disconnected");
            return;
        }
        let subscription = self.subscription.borrow_mut().take();
        // Dropping unadvises; events raised meanwhile see `disconnected`.
        drop(subscription);
        debug!("Container site disconnected");
    }

    fn host(&self, event: &'static str) -> Option<Rc<HostInner>> {
        if self.disconnected.get() {
            debug!(event, "Dropping engine event after disconnect");
            return None;
        }
        let host = self.host.upgrade();
        if host.is_none() {
            debug!(event, "Dropping engine event; host is gone");
        }
        host
    }
}

impl ClientSite for ContainerSite {
    fn container_window(&self) -> Option<WindowHandle> {
        self.host("container_window")?.parent_window()
    }

    fn content_for(&self, url: &str) -> Option<Rc<dyn ContentBinding>> {
        let source = self.host("content_for")?.content_for(url)?;
        Some(source as Rc<dyn ContentBinding>)
    }
}

impl InPlaceSite for ContainerSite {
    fn window(&self) -> Option<WindowHandle> {
        self.host("window")?.parent_window()
    }

    fn can_in_place_activate(&self) -> bool {
        self.host("can_in_place_activate").is_some()
    }

    fn window_context(&self) -> Rect {
        self.host("window_context")
            .map(|host| host.viewport())
            .unwrap_or_default()
    }

    fn on_in_place_activate(&self) {
        trace!("In-place activated");
    }

    fn on_in_place_deactivate(&self) {
        trace!("In-place deactivated");
    }
}

impl UiHandler for ContainerSite {
    fn drag_enter(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        let host = self.host("drag_enter").ok_or(DragDropError::Detached)?;
        host.on_drag_enter(data)
    }

    fn drag_drop(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        let host = self.host("drag_drop").ok_or(DragDropError::Detached)?;
        host.on_drag_drop(data)
    }

    fn left_button_down(&self) {
        if let Some(host) = self.host("left_button_down") {
            host.on_lbutton_down();
        }
    }
}

impl EngineEvents for ContainerSite {
    fn before_navigate(&self, event: &NavigationEvent) -> NavigationDecision {
        match self.host("before_navigate") {
            Some(host) => NavigationDecision::from(host.on_before_navigate(event)),
            None => NavigationDecision::Cancel,
        }
    }

    fn document_complete(&self, url: &str) {
        if let Some(host) = self.host("document_complete") {
            host.on_document_complete(url);
        }
    }

    fn navigate_error(&self, url: &str, status: i32) {
        if let Some(host) = self.host("navigate_error") {
            host.on_navigate_error(url, status);
        }
    }

    fn command_state_change(&self, command: HistoryCommand, enabled: bool) {
        if let Some(host) = self.host("command_state_change") {
            host.on_command_state_change(command, enabled);
        }
    }
}
