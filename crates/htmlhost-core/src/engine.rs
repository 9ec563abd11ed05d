//! The fixed interface set between the core and an embedded engine.
//!
//! Backends implement the engine-side traits ([`OleObject`],
//! [`InPlaceObject`], [`ConnectionPoint`], [`WebBrowser`], [`ViewObject`]);
//! the core implements the host-side traits ([`ClientSite`],
//! [`InPlaceSite`], [`UiHandler`], [`EngineEvents`]) on its container site.
//!
//! Every method takes `&self`. Engines raise events synchronously from
//! inside these calls, so implementations must not hold interior borrows
//! while calling back into a site or sink.

use std::path::PathBuf;
use std::rc::Rc;

use crate::bitmap::Bitmap;
use crate::error::{BindError, DragDropError, EngineResult};
use crate::geometry::{Rect, WindowHandle, WindowMessage};

/// Token identifying an advised event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdviseCookie(u32);

impl AdviseCookie {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Decision for navigation events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Allow the navigation
    Allow,
    /// Cancel the navigation
    Cancel,
}

impl From<bool> for NavigationDecision {
    fn from(allow: bool) -> Self {
        if allow {
            Self::Allow
        } else {
            Self::Cancel
        }
    }
}

impl NavigationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// An "about to navigate" notification raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub url: String,
    /// The page asked for a new top-level window.
    pub new_window: bool,
}

impl NavigationEvent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            new_window: false,
        }
    }

    pub fn new_window(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            new_window: true,
        }
    }
}

/// History commands whose availability the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    Back,
    Forward,
}

/// Commands forwarded verbatim to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Print,
    Find,
    SelectAll,
    Copy,
}

/// Effect reported back to the drag source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    None,
    Copy,
}

/// Formats a dragged data object can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Files,
    Text,
}

/// Data being dragged over or dropped onto the control.
pub trait DataObject {
    fn formats(&self) -> Vec<DataFormat>;

    /// Dropped file paths, if the object carries any.
    fn files(&self) -> Result<Vec<PathBuf>, DragDropError>;
}

/// A data object carrying a list of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDrop {
    pub paths: Vec<PathBuf>,
}

impl FileDrop {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl DataObject for FileDrop {
    fn formats(&self) -> Vec<DataFormat> {
        if self.paths.is_empty() {
            Vec::new()
        } else {
            vec![DataFormat::Files]
        }
    }

    fn files(&self) -> Result<Vec<PathBuf>, DragDropError> {
        Ok(self.paths.clone())
    }
}

/// Resolves a synthetic URL to in-memory content instead of a fetch.
pub trait ContentBinding {
    /// Produce the bytes for `url`. Ownership of the buffer passes to the
    /// engine.
    fn bind_to_storage(&self, url: &str) -> Result<Vec<u8>, BindError>;
}

// ========== Host side ==========

/// Client-site capabilities the engine queries on its container.
pub trait ClientSite {
    /// Window the container lives in.
    fn container_window(&self) -> Option<WindowHandle>;

    /// Content binding for a URL in the registered content scheme, or
    /// `None` when the URL should fail.
    fn content_for(&self, url: &str) -> Option<Rc<dyn ContentBinding>>;
}

/// In-place site capabilities used while the engine embeds its surface.
pub trait InPlaceSite {
    /// Window the engine should parent its surface to.
    fn window(&self) -> Option<WindowHandle>;

    fn can_in_place_activate(&self) -> bool;

    /// Position of the engine surface inside the parent window.
    fn window_context(&self) -> Rect;

    fn on_in_place_activate(&self);

    fn on_in_place_deactivate(&self);
}

/// UI hooks: drag/drop and mouse notifications from the engine window.
pub trait UiHandler {
    fn drag_enter(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError>;

    fn drag_drop(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError>;

    fn left_button_down(&self);
}

/// Everything the engine requires of its container, as one object.
pub trait HostSite: ClientSite + InPlaceSite + UiHandler {}

impl<T: ClientSite + InPlaceSite + UiHandler> HostSite for T {}

/// Navigation and document events delivered through an advised sink.
pub trait EngineEvents {
    fn before_navigate(&self, event: &NavigationEvent) -> NavigationDecision;

    fn document_complete(&self, url: &str);

    /// A fetch failed after the navigation was allowed.
    fn navigate_error(&self, url: &str, status: i32);

    fn command_state_change(&self, command: HistoryCommand, enabled: bool);
}

// ========== Engine side ==========

/// Embedding lifecycle of the control.
pub trait OleObject {
    /// Attach or detach the container site.
    fn set_client_site(&self, site: Option<Rc<dyn HostSite>>) -> EngineResult<()>;

    /// Embed the control inside `parent` and return the engine's own window.
    fn activate_in_place(&self, parent: WindowHandle, rect: Rect) -> EngineResult<WindowHandle>;

    /// Deactivate and release the control's resources.
    fn close(&self);
}

pub trait InPlaceObject {
    fn set_object_rects(&self, rect: Rect) -> EngineResult<()>;
}

/// Event subscription point.
pub trait ConnectionPoint {
    fn advise(&self, sink: Rc<dyn EngineEvents>) -> EngineResult<AdviseCookie>;

    fn unadvise(&self, cookie: AdviseCookie) -> EngineResult<()>;
}

/// Browser-level operations.
pub trait WebBrowser {
    /// Route every URL with this scheme to the client site's
    /// [`ClientSite::content_for`].
    fn register_content_scheme(&self, scheme: &str) -> EngineResult<()>;

    /// Begin an asynchronous navigation.
    fn navigate(&self, url: &str) -> EngineResult<()>;

    fn go_back(&self) -> EngineResult<()>;

    fn go_forward(&self) -> EngineResult<()>;

    fn can_go_back(&self) -> bool;

    fn can_go_forward(&self) -> bool;

    fn set_visible(&self, visible: bool) -> EngineResult<()>;

    fn exec(&self, command: EngineCommand) -> EngineResult<()>;

    fn set_zoom_percent(&self, percent: u32) -> EngineResult<()>;

    fn zoom_percent(&self) -> EngineResult<u32>;
}

/// Rendering access.
pub trait ViewObject {
    /// Render `area` of the live page at its native size.
    fn draw(&self, area: Rect) -> EngineResult<Bitmap>;

    /// Forward a raw message to the engine window.
    fn send_message(&self, message: WindowMessage) -> isize;
}

/// The complete interface set a backend provides.
pub trait BrowserEngine: OleObject + InPlaceObject + ConnectionPoint + WebBrowser + ViewObject {}

impl<T: OleObject + InPlaceObject + ConnectionPoint + WebBrowser + ViewObject> BrowserEngine for T {}

/// Process-wide engine registration, injected into the host.
pub trait EngineProvider {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn instantiate(&self) -> EngineResult<Rc<dyn BrowserEngine>>;
}
