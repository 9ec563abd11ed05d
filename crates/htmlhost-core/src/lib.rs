//! # HtmlHost Core
//!
//! Hosts a third-party browser engine inside a window owned by the
//! embedding application.
//!
//! The host drives the engine through a fixed interface set
//! ([`BrowserEngine`]) and receives its events through a
//! [`ContainerSite`]. Navigation can be vetoed before anything is fetched,
//! and pages can be served from memory through synthetic URLs instead of
//! the network.
//!
//! ## Ownership
//!
//! 1. **BrowserHost** owns the engine, the site and at most one live
//!    content source
//! 2. **ContainerSite** holds only weak references back to the host
//! 3. **Subscription** releases the event sink before the engine goes away
//!
//! ## Usage
//!
//! ```rust,ignore
//! use htmlhost_core::{BrowserHost, Size};
//!
//! let host = BrowserHost::create(&provider, parent, callback)?;
//! host.on_size(Size::new(800, 600));
//! host.set_html(b"<h1>Hello</h1>");
//! ```

pub mod bitmap;
pub mod callback;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod host;
pub mod navigation;
pub mod site;

pub use bitmap::Bitmap;
pub use callback::HostCallback;
pub use config::{HostConfig, ZoomConfig};
pub use content::{ContentSource, SyntheticUrl};
pub use engine::{
    AdviseCookie, BrowserEngine, ClientSite, ConnectionPoint, ContentBinding, DataFormat,
    DataObject, DropEffect, EngineCommand, EngineEvents, EngineProvider, FileDrop, HistoryCommand,
    HostSite, InPlaceObject, InPlaceSite, NavigationDecision, NavigationEvent, OleObject,
    UiHandler, ViewObject, WebBrowser,
};
pub use error::{
    BindError, BitmapError, ConfigError, DragDropError, EngineError, EngineResult, HostError,
    HostResult, NavigationError,
};
pub use geometry::{Rect, Size, WindowHandle, WindowMessage};
pub use host::BrowserHost;
pub use navigation::{NavigationState, NavigationStateMachine};
pub use site::{ContainerSite, Subscription};
