//! WebView2 engine backend built on wry.
//!
//! wry owns the WebView2 controller and reports navigation, load, drag/drop
//! and IPC through closures. Those closures hold a weak reference to an
//! [`EventHub`] that translates them into the core's site and sink calls.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::Path;
use std::rc::{Rc, Weak};

use htmlhost_core::{
    AdviseCookie, Bitmap, BrowserEngine, ClientSite, ConnectionPoint, DropEffect, EngineCommand,
    EngineError, EngineEvents, EngineProvider, EngineResult, FileDrop, HistoryCommand, HostSite,
    InPlaceObject, InPlaceSite, NavigationEvent, OleObject, Rect, SyntheticUrl, UiHandler,
    ViewObject, WebBrowser, WindowHandle, WindowMessage,
};
use tracing::{debug, info, trace, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{FindWindowExW, GetWindow, SendMessageW, GW_CHILD};
use wry::dpi::{PhysicalPosition, PhysicalSize};
use wry::http::{header::CONTENT_TYPE, Request, Response, StatusCode};
use wry::{DragDropEvent, PageLoadEvent, WebView, WebViewBuilder};

use crate::capture::capture_window;
use crate::window::{from_hwnd, to_hwnd, ParentWindow};

/// Status reported to sinks when the host has no content for a URL.
pub const STATUS_NOT_FOUND: i32 = 404;

/// Relays primary-button presses in the page back to the host.
const MOUSE_BRIDGE: &str = r#"
window.addEventListener('mousedown', function (e) {
    if (e.button === 0) {
        window.ipc.postMessage('lbuttondown');
    }
}, true);
"#;

const LBUTTON_MESSAGE: &str = "lbuttondown";

fn bounds(rect: Rect) -> wry::Rect {
    wry::Rect {
        position: PhysicalPosition::new(rect.x, rect.y).into(),
        size: PhysicalSize::new(rect.width, rect.height).into(),
    }
}

fn mime_for(path: &str) -> &'static str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        Some("xhtml") => "application/xhtml+xml",
        _ => "text/html",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMove {
    Back,
    Forward,
}

/// Session history as observed from completed loads.
///
/// WebView2 exposes `CanGoBack`/`CanGoForward` only on the raw controller,
/// so the backend keeps its own list and moves its cursor on every commit.
#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    index: Option<usize>,
    pending: Option<HistoryMove>,
}

impl History {
    fn commit(&mut self, url: &str) {
        let len = self.entries.len();
        match (self.pending.take(), self.index) {
            (Some(HistoryMove::Back), Some(i)) if i > 0 => self.index = Some(i - 1),
            (Some(HistoryMove::Forward), Some(i)) if i + 1 < len => self.index = Some(i + 1),
            (_, index) => {
                if index.map(|i| self.entries[i] == url).unwrap_or(false) {
                    return;
                }
                let keep = index.map(|i| i + 1).unwrap_or(0);
                self.entries.truncate(keep);
                self.entries.push(url.to_string());
                self.index = Some(self.entries.len() - 1);
            }
        }
    }

    fn can_go_back(&self) -> bool {
        self.index.map(|i| i > 0).unwrap_or(false)
    }

    fn can_go_forward(&self) -> bool {
        self.index
            .map(|i| i + 1 < self.entries.len())
            .unwrap_or(false)
    }
}

/// State shared between the engine and wry's handler closures.
#[derive(Default)]
struct EventHub {
    site: RefCell<Option<Rc<dyn HostSite>>>,
    sinks: RefCell<Vec<(AdviseCookie, Rc<dyn EngineEvents>)>>,
    scheme: RefCell<Option<String>>,
    history: RefCell<History>,
    /// Top-level document currently being loaded.
    loading: RefCell<Option<String>>,
    /// Synthetic URLs whose content request failed; their page-load event
    /// is not reported as a completion.
    failed: RefCell<HashSet<String>>,
}

impl EventHub {
    fn site(&self) -> Option<Rc<dyn HostSite>> {
        self.site.borrow().clone()
    }

    fn sinks(&self) -> Vec<Rc<dyn EngineEvents>> {
        self.sinks
            .borrow()
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect()
    }

    fn synthetic(&self, url: &str) -> Option<SyntheticUrl> {
        let scheme = self.scheme.borrow().clone()?;
        SyntheticUrl::parse(&scheme, url)
    }

    /// Report synthetic URLs in their native form regardless of how
    /// WebView2 spelled them.
    fn normalize(&self, url: &str) -> String {
        self.synthetic(url)
            .map(|s| s.to_string())
            .unwrap_or_else(|| url.to_string())
    }

    fn decide(&self, event: &NavigationEvent) -> bool {
        // Every sink must allow.
        self.sinks()
            .iter()
            .all(|sink| sink.before_navigate(event).is_allowed())
    }

    fn before_navigate(&self, url: &str) -> bool {
        let url = self.normalize(url);
        trace!(url = %url, "NavigationStarting");
        let allowed = self.decide(&NavigationEvent::new(url.clone()));
        if allowed {
            *self.loading.borrow_mut() = Some(url);
        }
        allowed
    }

    fn new_window(&self, url: &str) -> bool {
        let url = self.normalize(url);
        debug!(url = %url, "NewWindowRequested");
        self.decide(&NavigationEvent::new_window(url))
    }

    fn page_loaded(&self, url: &str) {
        let url = self.normalize(url);
        if self.failed.borrow_mut().remove(&url) {
            trace!(url = %url, "Suppressing completion of failed load");
            return;
        }
        self.loading.borrow_mut().take();

        let (back, forward) = {
            let mut history = self.history.borrow_mut();
            history.commit(&url);
            (history.can_go_back(), history.can_go_forward())
        };

        for sink in self.sinks() {
            sink.command_state_change(HistoryCommand::Back, back);
            sink.command_state_change(HistoryCommand::Forward, forward);
        }
        for sink in self.sinks() {
            sink.document_complete(&url);
        }
    }

    fn serve(&self, request: &Request<Vec<u8>>) -> Response<Cow<'static, [u8]>> {
        let url = self.normalize(&request.uri().to_string());
        let content = self
            .site()
            .and_then(|site| site.content_for(&url))
            .ok_or_else(|| "no content source".to_string())
            .and_then(|binding| binding.bind_to_storage(&url).map_err(|e| e.to_string()));

        let response = match content {
            Ok(bytes) => {
                debug!(url = %url, bytes = bytes.len(), "Serving synthetic content");
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, mime_for(&url))
                    .body(Cow::Owned(bytes))
            }
            Err(reason) => {
                warn!(url = %url, reason = %reason, "Synthetic content unavailable");
                let is_document = self.loading.borrow().as_deref() == Some(url.as_str());
                if is_document {
                    self.loading.borrow_mut().take();
                    self.failed.borrow_mut().insert(url.clone());
                    for sink in self.sinks() {
                        sink.navigate_error(&url, STATUS_NOT_FOUND);
                    }
                }
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Cow::Borrowed(&[][..]))
            }
        };

        response.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build protocol response");
            Response::new(Cow::Borrowed(&[][..]))
        })
    }

    fn drag(&self, event: DragDropEvent) -> bool {
        let Some(site) = self.site() else {
            return false;
        };
        let result = match event {
            DragDropEvent::Enter { paths, .. } => site.drag_enter(&FileDrop::new(paths)),
            DragDropEvent::Drop { paths, .. } => site.drag_drop(&FileDrop::new(paths)),
            _ => return false,
        };
        match result {
            Ok(effect) => effect != DropEffect::None,
            Err(e) => {
                debug!(error = %e, "Drag refused by host");
                false
            }
        }
    }

    fn ipc(&self, message: &str) {
        if message == LBUTTON_MESSAGE {
            if let Some(site) = self.site() {
                site.left_button_down();
            }
        } else {
            trace!(body = message, "Ignoring unknown IPC message");
        }
    }
}

/// A WebView2 control driven through the core's engine interfaces.
pub struct WebViewEngine {
    hub: Rc<EventHub>,
    webview: RefCell<Option<Rc<WebView>>>,
    window: Cell<Option<WindowHandle>>,
    next_cookie: Cell<u32>,
}

impl WebViewEngine {
    pub fn new() -> Self {
        Self {
            hub: Rc::new(EventHub::default()),
            webview: RefCell::new(None),
            window: Cell::new(None),
            next_cookie: Cell::new(1),
        }
    }

    fn webview(&self) -> EngineResult<Rc<WebView>> {
        self.webview.borrow().clone().ok_or(EngineError::Closed)
    }

    /// URL as WebView2 must be asked to load it.
    fn engine_url(&self, url: &str) -> String {
        match self.hub.synthetic(url) {
            Some(s) => format!("http://{}.w{}/{}", s.scheme(), s.host_id(), s.path()),
            None => url.to_string(),
        }
    }

    fn script(&self, js: &str) -> EngineResult<()> {
        self.webview()?
            .evaluate_script(js)
            .map_err(|e| EngineError::internal(e.to_string()))
    }

    fn build(&self, parent: WindowHandle, rect: Rect) -> EngineResult<WebView> {
        let on_navigate = Rc::downgrade(&self.hub);
        let on_load = Rc::downgrade(&self.hub);
        let on_new_window = Rc::downgrade(&self.hub);
        let on_drag = Rc::downgrade(&self.hub);
        let on_ipc = Rc::downgrade(&self.hub);

        let mut builder = WebViewBuilder::new()
            .with_bounds(bounds(rect))
            .with_initialization_script(MOUSE_BRIDGE)
            .with_navigation_handler(move |url| {
                on_navigate
                    .upgrade()
                    .map(|hub| hub.before_navigate(&url))
                    .unwrap_or(false)
            })
            .with_on_page_load_handler(move |event, url| {
                if let PageLoadEvent::Finished = event {
                    if let Some(hub) = on_load.upgrade() {
                        hub.page_loaded(&url);
                    }
                }
            })
            .with_new_window_req_handler(move |url| {
                on_new_window
                    .upgrade()
                    .map(|hub| hub.new_window(&url))
                    .unwrap_or(false)
            })
            .with_drag_drop_handler(move |event| {
                on_drag
                    .upgrade()
                    .map(|hub| hub.drag(event))
                    .unwrap_or(false)
            })
            .with_ipc_handler(move |request: Request<String>| {
                if let Some(hub) = on_ipc.upgrade() {
                    hub.ipc(request.body());
                }
            });

        if let Some(scheme) = self.hub.scheme.borrow().clone() {
            let on_request: Weak<EventHub> = Rc::downgrade(&self.hub);
            builder = builder.with_custom_protocol(scheme, move |_id, request| {
                match on_request.upgrade() {
                    Some(hub) => hub.serve(&request),
                    None => Response::builder()
                        .status(StatusCode::GONE)
                        .body(Cow::Borrowed(&[][..]))
                        .unwrap_or_else(|_| Response::new(Cow::Borrowed(&[][..]))),
                }
            });
        }

        builder
            .build_as_child(&ParentWindow::new(parent))
            .map_err(|e| EngineError::Activation(e.to_string()))
    }
}

impl Default for WebViewEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The window WebView2 created under `parent`.
fn find_engine_window(parent: WindowHandle) -> Option<WindowHandle> {
    let parent = to_hwnd(parent);
    let child = unsafe {
        FindWindowExW(parent, HWND::default(), w!("WRY_WEBVIEW"), PCWSTR::null())
            .or_else(|_| GetWindow(parent, GW_CHILD))
            .ok()?
    };
    from_hwnd(child)
}

impl OleObject for WebViewEngine {
    fn set_client_site(&self, site: Option<Rc<dyn HostSite>>) -> EngineResult<()> {
        *self.hub.site.borrow_mut() = site;
        Ok(())
    }

    fn activate_in_place(&self, parent: WindowHandle, rect: Rect) -> EngineResult<WindowHandle> {
        if self.webview.borrow().is_some() {
            return Err(EngineError::Activation("already active".to_string()));
        }
        let site = self
            .hub
            .site()
            .ok_or_else(|| EngineError::Activation("no client site".to_string()))?;
        if !site.can_in_place_activate() {
            return Err(EngineError::Activation(
                "site refused in-place activation".to_string(),
            ));
        }

        let webview = self.build(parent, rect)?;
        *self.webview.borrow_mut() = Some(Rc::new(webview));

        let window = find_engine_window(parent).unwrap_or(parent);
        self.window.set(Some(window));
        site.on_in_place_activate();

        info!(parent = parent.raw(), window = window.raw(), "WebView2 activated");
        Ok(window)
    }

    fn close(&self) {
        let webview = self.webview.borrow_mut().take();
        if webview.is_none() {
            return;
        }
        if let Some(site) = self.hub.site() {
            site.on_in_place_deactivate();
        }
        drop(webview);
        self.window.set(None);
        self.hub.sinks.borrow_mut().clear();
        debug!("WebView2 closed");
    }
}

impl InPlaceObject for WebViewEngine {
    fn set_object_rects(&self, rect: Rect) -> EngineResult<()> {
        self.webview()?
            .set_bounds(bounds(rect))
            .map_err(|e| EngineError::internal(e.to_string()))
    }
}

impl ConnectionPoint for WebViewEngine {
    fn advise(&self, sink: Rc<dyn EngineEvents>) -> EngineResult<AdviseCookie> {
        let cookie = AdviseCookie::new(self.next_cookie.get());
        self.next_cookie.set(cookie.raw().wrapping_add(1));
        self.hub.sinks.borrow_mut().push((cookie, sink));
        Ok(cookie)
    }

    fn unadvise(&self, cookie: AdviseCookie) -> EngineResult<()> {
        let mut sinks = self.hub.sinks.borrow_mut();
        let before = sinks.len();
        sinks.retain(|(c, _)| *c != cookie);
        if sinks.len() == before {
            return Err(EngineError::Connection(format!(
                "unknown cookie {}",
                cookie.raw()
            )));
        }
        Ok(())
    }
}

impl WebBrowser for WebViewEngine {
    fn register_content_scheme(&self, scheme: &str) -> EngineResult<()> {
        if self.webview.borrow().is_some() {
            return Err(EngineError::Unsupported(
                "registering a scheme after activation",
            ));
        }
        *self.hub.scheme.borrow_mut() = Some(scheme.to_ascii_lowercase());
        Ok(())
    }

    fn navigate(&self, url: &str) -> EngineResult<()> {
        let target = self.engine_url(url);
        self.webview()?
            .load_url(&target)
            .map_err(|e| EngineError::navigation(url, e.to_string()))
    }

    fn go_back(&self) -> EngineResult<()> {
        self.hub.history.borrow_mut().pending = Some(HistoryMove::Back);
        self.script("history.back()")
    }

    fn go_forward(&self) -> EngineResult<()> {
        self.hub.history.borrow_mut().pending = Some(HistoryMove::Forward);
        self.script("history.forward()")
    }

    fn can_go_back(&self) -> bool {
        self.hub.history.borrow().can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        self.hub.history.borrow().can_go_forward()
    }

    fn set_visible(&self, visible: bool) -> EngineResult<()> {
        self.webview()?
            .set_visible(visible)
            .map_err(|e| EngineError::internal(e.to_string()))
    }

    fn exec(&self, command: EngineCommand) -> EngineResult<()> {
        match command {
            EngineCommand::Print => self
                .webview()?
                .print()
                .map_err(|e| EngineError::internal(e.to_string())),
            EngineCommand::SelectAll => self.script("document.execCommand('selectAll')"),
            EngineCommand::Copy => self.script("document.execCommand('copy')"),
            EngineCommand::Find => Err(EngineError::Unsupported("find")),
        }
    }

    fn set_zoom_percent(&self, percent: u32) -> EngineResult<()> {
        self.webview()?
            .zoom(f64::from(percent) / 100.0)
            .map_err(|e| EngineError::internal(e.to_string()))
    }

    fn zoom_percent(&self) -> EngineResult<u32> {
        Err(EngineError::Unsupported("zoom read-back"))
    }
}

impl ViewObject for WebViewEngine {
    fn draw(&self, area: Rect) -> EngineResult<Bitmap> {
        let window = self.window.get().ok_or(EngineError::Closed)?;
        capture_window(to_hwnd(window), area)
    }

    fn send_message(&self, message: WindowMessage) -> isize {
        let Some(window) = self.window.get() else {
            return 0;
        };
        unsafe {
            SendMessageW(
                to_hwnd(window),
                message.msg,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            )
            .0
        }
    }
}

/// Creates [`WebViewEngine`]s once the WebView2 runtime is known to exist.
#[derive(Debug, Default)]
pub struct WebViewProvider;

impl WebViewProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EngineProvider for WebViewProvider {
    fn name(&self) -> &str {
        "webview2"
    }

    fn instantiate(&self) -> EngineResult<Rc<dyn BrowserEngine>> {
        let version =
            wry::webview_version().map_err(|e| EngineError::Instantiation(e.to_string()))?;
        debug!(version = %version, "WebView2 runtime found");
        Ok(Rc::new(WebViewEngine::new()))
    }
}
