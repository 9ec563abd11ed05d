//! # Scripted Engine
//!
//! An in-memory engine implementing the full interface set. Navigations
//! raise `before_navigate` synchronously, like a real control, and are
//! queued; [`ScriptedEngine::pump`] then plays the loads to completion.
//! Announcing a new top-level navigation drops loads still queued.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use htmlhost_core::{
    AdviseCookie, Bitmap, BrowserEngine, ClientSite, ConnectionPoint, DataObject, DragDropError,
    DropEffect, EngineCommand, EngineError, EngineEvents, EngineProvider, EngineResult,
    HistoryCommand, HostSite, InPlaceObject, InPlaceSite, NavigationDecision, NavigationEvent,
    OleObject, Rect, UiHandler, ViewObject, WebBrowser, WindowHandle, WindowMessage,
};
use tracing::{debug, trace};

/// Status reported for synthetic URLs the host cannot serve.
pub const STATUS_NO_DATA: i32 = -2146697211;

/// Every call the host made into the engine, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetClientSite(bool),
    ActivateInPlace(WindowHandle),
    SetObjectRects(Rect),
    RegisterScheme(String),
    Advise(AdviseCookie),
    Unadvise(AdviseCookie),
    Navigate(String),
    GoBack,
    GoForward,
    SetVisible(bool),
    Exec(EngineCommand),
    SetZoom(u32),
    Draw(Rect),
    SendMessage(WindowMessage),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMove {
    Push,
    Back,
    Forward,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    url: String,
    history: HistoryMove,
}

/// Scripted stand-in for a browser control.
pub struct ScriptedEngine {
    window: WindowHandle,
    calls: RefCell<Vec<EngineCall>>,
    site: RefCell<Option<Rc<dyn HostSite>>>,
    sinks: RefCell<Vec<(AdviseCookie, Rc<dyn EngineEvents>)>>,
    retained_sinks: RefCell<Vec<Rc<dyn EngineEvents>>>,
    next_cookie: Cell<u32>,
    scheme: RefCell<Option<String>>,
    queue: RefCell<VecDeque<PendingLoad>>,
    history: RefCell<Vec<String>>,
    history_index: Cell<Option<usize>>,
    failing_urls: RefCell<HashMap<String, i32>>,
    fetched: RefCell<Vec<String>>,
    document: RefCell<Option<Vec<u8>>>,
    zoom: Cell<u32>,
    surface: Cell<[u8; 4]>,
    message_result: Cell<isize>,
    fail_activation: Cell<bool>,
    fail_advise: Cell<bool>,
    fail_zoom_read: Cell<bool>,
    closed: Cell<bool>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            window: WindowHandle::new(0xE1).expect("non-null window handle"),
            calls: RefCell::new(Vec::new()),
            site: RefCell::new(None),
            sinks: RefCell::new(Vec::new()),
            retained_sinks: RefCell::new(Vec::new()),
            next_cookie: Cell::new(1),
            scheme: RefCell::new(None),
            queue: RefCell::new(VecDeque::new()),
            history: RefCell::new(Vec::new()),
            history_index: Cell::new(None),
            failing_urls: RefCell::new(HashMap::new()),
            fetched: RefCell::new(Vec::new()),
            document: RefCell::new(None),
            zoom: Cell::new(100),
            surface: Cell::new([255, 255, 255, 255]),
            message_result: Cell::new(0),
            fail_activation: Cell::new(false),
            fail_advise: Cell::new(false),
            fail_zoom_read: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    // ========== Script setup ==========

    /// Make in-place activation fail.
    pub fn fail_activation(&self) {
        self.fail_activation.set(true);
    }

    /// Make event subscription fail.
    pub fn fail_advise(&self) {
        self.fail_advise.set(true);
    }

    /// Make zoom read-back unavailable.
    pub fn fail_zoom_read(&self) {
        self.fail_zoom_read.set(true);
    }

    /// Loads of `url` fail with `status`.
    pub fn fail_url(&self, url: &str, status: i32) {
        self.failing_urls.borrow_mut().insert(url.to_string(), status);
    }

    /// Color every drawn pixel gets.
    pub fn set_surface_color(&self, rgba: [u8; 4]) {
        self.surface.set(rgba);
    }

    /// Value returned from `send_message`.
    pub fn set_message_result(&self, result: isize) {
        self.message_result.set(result);
    }

    // ========== Inspection ==========

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    /// Position of the first call matching `predicate`.
    pub fn call_index(&self, predicate: impl Fn(&EngineCall) -> bool) -> Option<usize> {
        self.calls.borrow().iter().position(predicate)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Navigate(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.borrow().len()
    }

    pub fn has_client_site(&self) -> bool {
        self.site.borrow().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn registered_scheme(&self) -> Option<String> {
        self.scheme.borrow().clone()
    }

    /// URLs that went to the network instead of a content binding.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// Bytes of the last document served through a content binding.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.document.borrow().clone()
    }

    pub fn pending_loads(&self) -> usize {
        self.queue.borrow().len()
    }

    // ========== Event scripting ==========

    /// Play every queued load, including loads queued by handlers while
    /// pumping. Returns the number of loads played.
    pub fn pump(&self) -> usize {
        let mut played = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(load) = next else {
                return played;
            };
            played += 1;
            self.play(load);
        }
    }

    /// The page asks for a new window showing `url`.
    pub fn request_new_window(&self, url: &str) -> NavigationDecision {
        self.announce(&NavigationEvent::new_window(url))
    }

    /// A link inside the page was followed.
    pub fn click_link(&self, url: &str) {
        self.begin(url, HistoryMove::Push);
    }

    pub fn drag_enter(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        let site = self.site.borrow().clone();
        match site {
            Some(site) => site.drag_enter(data),
            None => Err(DragDropError::Detached),
        }
    }

    pub fn drag_drop(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        let site = self.site.borrow().clone();
        match site {
            Some(site) => site.drag_drop(data),
            None => Err(DragDropError::Detached),
        }
    }

    pub fn click(&self) {
        let site = self.site.borrow().clone();
        if let Some(site) = site {
            site.left_button_down();
        }
    }

    /// Raise `document_complete` for `url` on the advised sinks without
    /// touching the load queue, as for a load that finished out of order.
    pub fn complete_document(&self, url: &str) {
        for sink in self.current_sinks() {
            sink.document_complete(url);
        }
    }

    /// Raise `document_complete` on every sink ever advised, including
    /// unadvised ones, the way a misbehaving control might.
    pub fn fire_stale_document_complete(&self, url: &str) {
        let sinks = self.retained_sinks.borrow().clone();
        for sink in sinks {
            sink.document_complete(url);
        }
    }

    fn current_sinks(&self) -> Vec<Rc<dyn EngineEvents>> {
        self.sinks
            .borrow()
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect()
    }

    fn announce(&self, event: &NavigationEvent) -> NavigationDecision {
        for sink in self.current_sinks() {
            if sink.before_navigate(event) == NavigationDecision::Cancel {
                return NavigationDecision::Cancel;
            }
        }
        NavigationDecision::Allow
    }

    fn begin(&self, url: &str, history: HistoryMove) {
        if self.announce(&NavigationEvent::new(url)) == NavigationDecision::Cancel {
            debug!(%url, "Scripted navigation cancelled");
            return;
        }
        let superseded: Vec<PendingLoad> = self.queue.borrow_mut().drain(..).collect();
        for load in superseded {
            debug!(url = %load.url, "Scripted load superseded");
        }
        trace!(%url, ?history, "Scripted load queued");
        self.queue.borrow_mut().push_back(PendingLoad {
            url: url.to_string(),
            history,
        });
    }

    fn is_synthetic(&self, url: &str) -> bool {
        match self.scheme.borrow().as_deref() {
            Some(scheme) => {
                url.starts_with(&format!("{scheme}:"))
                    || url.starts_with(&format!("http://{scheme}."))
            }
            None => false,
        }
    }

    fn play(&self, load: PendingLoad) {
        let url = load.url;
        let failure = self.failing_urls.borrow().get(&url).copied();
        if let Some(status) = failure {
            self.fire_navigate_error(&url, status);
            return;
        }

        if self.is_synthetic(&url) {
            let site = self.site.borrow().clone();
            let binding = site.and_then(|site| site.content_for(&url));
            let data = binding.map(|binding| binding.bind_to_storage(&url));
            match data {
                Some(Ok(bytes)) => *self.document.borrow_mut() = Some(bytes),
                Some(Err(e)) => {
                    debug!(%url, error = %e, "Content binding failed");
                    self.fire_navigate_error(&url, STATUS_NO_DATA);
                    return;
                }
                None => {
                    self.fire_navigate_error(&url, STATUS_NO_DATA);
                    return;
                }
            }
        } else {
            self.fetched.borrow_mut().push(url.clone());
        }

        self.commit_history(&url, load.history);
        let (back, forward) = (self.can_go_back(), self.can_go_forward());
        for sink in self.current_sinks() {
            sink.command_state_change(HistoryCommand::Back, back);
            sink.command_state_change(HistoryCommand::Forward, forward);
        }
        for sink in self.current_sinks() {
            sink.document_complete(&url);
        }
    }

    fn fire_navigate_error(&self, url: &str, status: i32) {
        for sink in self.current_sinks() {
            sink.navigate_error(url, status);
        }
    }

    fn commit_history(&self, url: &str, history: HistoryMove) {
        let mut entries = self.history.borrow_mut();
        let index = self.history_index.get();
        match (history, index) {
            (HistoryMove::Back, Some(i)) if i > 0 => self.history_index.set(Some(i - 1)),
            (HistoryMove::Forward, Some(i)) if i + 1 < entries.len() => {
                self.history_index.set(Some(i + 1))
            }
            _ => {
                let keep = index.map_or(0, |i| i + 1);
                entries.truncate(keep);
                entries.push(url.to_string());
                self.history_index.set(Some(entries.len() - 1));
            }
        }
    }

    fn history_entry(&self, offset: isize) -> Option<String> {
        let index = self.history_index.get()? as isize + offset;
        if index < 0 {
            return None;
        }
        self.history.borrow().get(index as usize).cloned()
    }

    fn record(&self, call: EngineCall) {
        self.calls.borrow_mut().push(call);
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.get() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

impl OleObject for ScriptedEngine {
    fn set_client_site(&self, site: Option<Rc<dyn HostSite>>) -> EngineResult<()> {
        self.record(EngineCall::SetClientSite(site.is_some()));
        let previous = std::mem::replace(&mut *self.site.borrow_mut(), site);
        drop(previous);
        Ok(())
    }

    fn activate_in_place(&self, parent: WindowHandle, _rect: Rect) -> EngineResult<WindowHandle> {
        self.record(EngineCall::ActivateInPlace(parent));
        if self.fail_activation.get() {
            return Err(EngineError::Activation("scripted failure".to_string()));
        }
        let site = self.site.borrow().clone();
        if let Some(site) = site {
            if site.window() != Some(parent) || !site.can_in_place_activate() {
                return Err(EngineError::Activation("site refused activation".to_string()));
            }
            site.on_in_place_activate();
        }
        Ok(self.window)
    }

    fn close(&self) {
        self.record(EngineCall::Close);
        self.closed.set(true);
        self.queue.borrow_mut().clear();
    }
}

impl InPlaceObject for ScriptedEngine {
    fn set_object_rects(&self, rect: Rect) -> EngineResult<()> {
        self.record(EngineCall::SetObjectRects(rect));
        self.ensure_open()
    }
}

impl ConnectionPoint for ScriptedEngine {
    fn advise(&self, sink: Rc<dyn EngineEvents>) -> EngineResult<AdviseCookie> {
        if self.fail_advise.get() {
            return Err(EngineError::Connection("scripted failure".to_string()));
        }
        let cookie = AdviseCookie::new(self.next_cookie.get());
        self.next_cookie.set(cookie.raw() + 1);
        self.record(EngineCall::Advise(cookie));
        self.retained_sinks.borrow_mut().push(Rc::clone(&sink));
        self.sinks.borrow_mut().push((cookie, sink));
        Ok(cookie)
    }

    fn unadvise(&self, cookie: AdviseCookie) -> EngineResult<()> {
        self.record(EngineCall::Unadvise(cookie));
        let removed = {
            let mut sinks = self.sinks.borrow_mut();
            let before = sinks.len();
            sinks.retain(|(c, _)| *c != cookie);
            before != sinks.len()
        };
        if removed {
            Ok(())
        } else {
            Err(EngineError::Connection(format!(
                "unknown cookie {}",
                cookie.raw()
            )))
        }
    }
}

impl WebBrowser for ScriptedEngine {
    fn register_content_scheme(&self, scheme: &str) -> EngineResult<()> {
        self.record(EngineCall::RegisterScheme(scheme.to_string()));
        *self.scheme.borrow_mut() = Some(scheme.to_string());
        Ok(())
    }

    fn navigate(&self, url: &str) -> EngineResult<()> {
        self.record(EngineCall::Navigate(url.to_string()));
        self.ensure_open()?;
        self.begin(url, HistoryMove::Push);
        Ok(())
    }

    fn go_back(&self) -> EngineResult<()> {
        self.record(EngineCall::GoBack);
        let url = self
            .history_entry(-1)
            .ok_or_else(|| EngineError::navigation("back", "no history"))?;
        self.begin(&url, HistoryMove::Back);
        Ok(())
    }

    fn go_forward(&self) -> EngineResult<()> {
        self.record(EngineCall::GoForward);
        let url = self
            .history_entry(1)
            .ok_or_else(|| EngineError::navigation("forward", "no history"))?;
        self.begin(&url, HistoryMove::Forward);
        Ok(())
    }

    fn can_go_back(&self) -> bool {
        self.history_entry(-1).is_some()
    }

    fn can_go_forward(&self) -> bool {
        self.history_entry(1).is_some()
    }

    fn set_visible(&self, visible: bool) -> EngineResult<()> {
        self.record(EngineCall::SetVisible(visible));
        self.ensure_open()
    }

    fn exec(&self, command: EngineCommand) -> EngineResult<()> {
        self.record(EngineCall::Exec(command));
        self.ensure_open()
    }

    fn set_zoom_percent(&self, percent: u32) -> EngineResult<()> {
        self.record(EngineCall::SetZoom(percent));
        self.ensure_open()?;
        self.zoom.set(percent);
        Ok(())
    }

    fn zoom_percent(&self) -> EngineResult<u32> {
        if self.fail_zoom_read.get() {
            return Err(EngineError::Unsupported("zoom read-back"));
        }
        Ok(self.zoom.get())
    }
}

impl ViewObject for ScriptedEngine {
    fn draw(&self, area: Rect) -> EngineResult<Bitmap> {
        self.record(EngineCall::Draw(area));
        self.ensure_open()?;
        Ok(Bitmap::filled(area.width, area.height, self.surface.get()))
    }

    fn send_message(&self, message: WindowMessage) -> isize {
        self.record(EngineCall::SendMessage(message));
        self.message_result.get()
    }
}

/// Hands out one shared [`ScriptedEngine`].
pub struct ScriptedProvider {
    engine: Rc<ScriptedEngine>,
    fail: Cell<bool>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            engine: Rc::new(ScriptedEngine::new()),
            fail: Cell::new(false),
        }
    }

    /// The engine every `instantiate` returns.
    pub fn engine(&self) -> Rc<ScriptedEngine> {
        Rc::clone(&self.engine)
    }

    /// Make instantiation fail, as when the control is not registered.
    pub fn fail_instantiation(&self) {
        self.fail.set(true);
    }
}

impl EngineProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn instantiate(&self) -> EngineResult<Rc<dyn BrowserEngine>> {
        if self.fail.get() {
            return Err(EngineError::Instantiation("engine not registered".to_string()));
        }
        Ok(Rc::clone(&self.engine) as Rc<dyn BrowserEngine>)
    }
}
