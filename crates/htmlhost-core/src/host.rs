//! The public owner of an embedded browser control.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, trace, warn};

use crate::bitmap::Bitmap;
use crate::callback::HostCallback;
use crate::config::HostConfig;
use crate::content::{ContentSource, SyntheticUrl};
use crate::engine::{
    BrowserEngine, DataFormat, DataObject, DropEffect, EngineCommand, EngineEvents, EngineProvider,
    HistoryCommand, HostSite, InPlaceObject, NavigationEvent, OleObject, ViewObject, WebBrowser,
};
use crate::error::{DragDropError, HostError, HostResult};
use crate::geometry::{Rect, Size, WindowHandle, WindowMessage};
use crate::navigation::{Completion, NavigationState, NavigationStateMachine};
use crate::site::{ContainerSite, Subscription};

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

/// Hosts a browser engine inside a parent window.
///
/// Owns the engine, its [`ContainerSite`] and at most one live
/// [`ContentSource`]. Dropping the host tears everything down in order:
/// the event subscription first, the engine last.
///
/// Not `Send`: every call happens on the thread that owns the parent
/// window.
pub struct BrowserHost {
    inner: Rc<HostInner>,
}

pub(crate) struct HostInner {
    id: u64,
    config: HostConfig,
    callback: Rc<dyn HostCallback>,
    parent: Cell<Option<WindowHandle>>,
    engine_window: Cell<Option<WindowHandle>>,
    engine: RefCell<Option<Rc<dyn BrowserEngine>>>,
    site: RefCell<Option<Rc<ContainerSite>>>,
    content: RefCell<Option<Rc<ContentSource>>>,
    navigation: RefCell<NavigationStateMachine>,
    viewport: Cell<Rect>,
    zoom: Cell<u32>,
    blank_shown: Cell<bool>,
}

impl BrowserHost {
    /// Create a host with the default configuration.
    pub fn create(
        provider: &dyn EngineProvider,
        parent: WindowHandle,
        callback: Rc<dyn HostCallback>,
    ) -> HostResult<Self> {
        Self::create_with_config(provider, parent, callback, HostConfig::default())
    }

    /// Instantiate an engine, embed it inside `parent` and load the blank
    /// placeholder.
    ///
    /// Construction is all-or-nothing: on error, everything acquired so far
    /// has been released and nothing is left subscribed.
    pub fn create_with_config(
        provider: &dyn EngineProvider,
        parent: WindowHandle,
        callback: Rc<dyn HostCallback>,
        config: HostConfig,
    ) -> HostResult<Self> {
        config.validate()?;

        let id = NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed);
        debug!(host_id = id, engine = provider.name(), parent = parent.raw(), "Creating browser host");

        let engine = provider.instantiate().map_err(HostError::Instantiate)?;

        let zoom = config.zoom.initial;
        // From here on, an early return drops `host`, which runs the
        // ordered teardown over whatever has been set up.
        let host = Self {
            inner: Rc::new(HostInner {
                id,
                config,
                callback,
                parent: Cell::new(Some(parent)),
                engine_window: Cell::new(None),
                engine: RefCell::new(Some(Rc::clone(&engine))),
                site: RefCell::new(None),
                content: RefCell::new(None),
                navigation: RefCell::new(NavigationStateMachine::new()),
                viewport: Cell::new(Rect::default()),
                zoom: Cell::new(zoom),
                blank_shown: Cell::new(false),
            }),
        };
        let inner = &host.inner;

        let site = ContainerSite::new(Rc::downgrade(inner));
        *inner.site.borrow_mut() = Some(Rc::clone(&site));

        engine
            .set_client_site(Some(Rc::clone(&site) as Rc<dyn HostSite>))
            .map_err(HostError::Activate)?;

        engine
            .register_content_scheme(&inner.config.content_scheme)
            .map_err(HostError::Activate)?;

        let engine_window = engine
            .activate_in_place(parent, inner.viewport.get())
            .map_err(HostError::Activate)?;
        inner.engine_window.set(Some(engine_window));

        let subscription = Subscription::advise(&engine, Rc::clone(&site) as Rc<dyn EngineEvents>)
            .map_err(HostError::Subscribe)?;
        site.attach(subscription);

        inner.show_blank();

        info!(
            host_id = id,
            engine_window = engine_window.raw(),
            "Browser host created"
        );
        Ok(host)
    }

    /// Resize the engine viewport. Safe before the first navigation.
    pub fn on_size(&self, size: Size) {
        let rect = Rect::from_size(size);
        self.inner.viewport.set(rect);
        trace!(host_id = self.inner.id, width = size.width, height = size.height, "Resizing engine viewport");
        if let Some(engine) = self.inner.engine() {
            if let Err(e) = engine.set_object_rects(rect) {
                warn!(host_id = self.inner.id, error = %e, "Failed to resize engine");
            }
        }
    }

    pub fn set_visible(&self, visible: bool) {
        if let Some(engine) = self.inner.engine() {
            if let Err(e) = engine.set_visible(visible) {
                warn!(host_id = self.inner.id, visible, error = %e, "Failed to change visibility");
            }
        }
    }

    /// Navigate to an ordinary URL. The engine fetches it.
    pub fn navigate_to_url(&self, url: &str) {
        debug!(host_id = self.inner.id, %url, "Navigating");
        self.inner.navigate(url);
    }

    /// Navigate to `url` with its bytes supplied by
    /// [`HostCallback::get_data_for_url`] instead of a fetch.
    pub fn navigate_to_data_url(&self, url: &str) {
        let inner = &self.inner;
        let target = inner.synthetic_url(url);
        let synthetic = target.to_string();
        debug!(host_id = inner.id, %url, %synthetic, "Navigating to host-supplied content");

        let source = ContentSource::on_demand(target, url, Rc::downgrade(&inner.callback));
        inner.install_content(source);
        inner.navigate(&synthetic);
    }

    /// Show `html` as if it had been fetched from the placeholder URL.
    pub fn set_html(&self, html: &[u8]) {
        let inner = &self.inner;
        let target = inner.synthetic_url(&inner.config.placeholder_path);
        let synthetic = target.to_string();
        debug!(host_id = inner.id, len = html.len(), %synthetic, "Setting HTML");

        inner.install_content(ContentSource::with_buffer(target, html.to_vec()));
        inner.navigate(&synthetic);
    }

    pub fn go_back(&self) {
        if !self.can_go_back() {
            trace!(host_id = self.inner.id, "go_back ignored; no history");
            return;
        }
        if let Some(engine) = self.inner.engine() {
            if let Err(e) = engine.go_back() {
                warn!(host_id = self.inner.id, error = %e, "go_back failed");
            }
        }
    }

    pub fn go_forward(&self) {
        if !self.can_go_forward() {
            trace!(host_id = self.inner.id, "go_forward ignored; no history");
            return;
        }
        if let Some(engine) = self.inner.engine() {
            if let Err(e) = engine.go_forward() {
                warn!(host_id = self.inner.id, error = %e, "go_forward failed");
            }
        }
    }

    pub fn print_current_page(&self) {
        self.inner.exec(EngineCommand::Print);
    }

    pub fn find_in_current_page(&self) {
        self.inner.exec(EngineCommand::Find);
    }

    pub fn select_all(&self) {
        self.inner.exec(EngineCommand::SelectAll);
    }

    pub fn copy_selection(&self) {
        self.inner.exec(EngineCommand::Copy);
    }

    /// Set the zoom, clamped to the configured bounds.
    pub fn set_zoom_percent(&self, percent: u32) {
        let inner = &self.inner;
        let zoom = inner.config.zoom.clamp(percent);
        if zoom != percent {
            debug!(host_id = inner.id, requested = percent, applied = zoom, "Zoom clamped");
        }
        let Some(engine) = inner.engine() else {
            return;
        };
        match engine.set_zoom_percent(zoom) {
            Ok(()) => inner.zoom.set(zoom),
            Err(e) => warn!(host_id = inner.id, zoom, error = %e, "Failed to set zoom"),
        }
    }

    /// Current zoom as reported by the engine, or the last value applied
    /// when the engine cannot report one.
    pub fn zoom_percent(&self) -> u32 {
        let inner = &self.inner;
        let cached = inner.zoom.get();
        match inner.engine().map(|engine| engine.zoom_percent()) {
            Some(Ok(zoom)) => zoom,
            Some(Err(e)) => {
                debug!(host_id = inner.id, error = %e, "Engine zoom unavailable; using cached value");
                cached
            }
            None => cached,
        }
    }

    /// Render `area` of the live page and stretch it to `target`.
    pub fn take_screenshot(&self, area: Rect, target: Size) -> HostResult<Bitmap> {
        if area.is_empty() {
            return Err(HostError::Screenshot(format!(
                "empty capture area {}x{}",
                area.width, area.height
            )));
        }
        if target.is_empty() {
            return Err(HostError::Screenshot(format!(
                "empty target size {}x{}",
                target.width, target.height
            )));
        }
        let engine = self
            .inner
            .engine()
            .ok_or_else(|| HostError::Screenshot("engine released".to_string()))?;

        let bitmap = engine.draw(area)?;
        debug!(
            host_id = self.inner.id,
            source_width = bitmap.width(),
            source_height = bitmap.height(),
            target_width = target.width,
            target_height = target.height,
            "Captured screenshot"
        );
        Ok(bitmap.scaled(target))
    }

    /// Forward a raw window message to the engine window.
    pub fn send_message(&self, message: WindowMessage) -> isize {
        match self.inner.engine() {
            Some(engine) => engine.send_message(message),
            None => 0,
        }
    }

    /// Notify the host that the control was clicked so it can restore focus.
    pub fn on_lbutton_down(&self) {
        self.inner.on_lbutton_down();
    }

    pub fn current_url(&self) -> Option<String> {
        self.inner.navigation.borrow().current_url().map(str::to_string)
    }

    pub fn can_go_back(&self) -> bool {
        self.inner.navigation.borrow().can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.inner.navigation.borrow().can_go_forward()
    }

    pub fn navigation_state(&self) -> NavigationState {
        self.inner.navigation.borrow().state()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.navigation.borrow().is_loading()
    }

    /// Whether the placeholder page has been requested.
    pub fn blank_shown(&self) -> bool {
        self.inner.blank_shown.get()
    }

    pub fn engine_window(&self) -> Option<WindowHandle> {
        self.inner.engine_window.get()
    }

    pub fn parent_window(&self) -> Option<WindowHandle> {
        self.inner.parent_window()
    }

    /// Per-host id embedded in synthetic URLs.
    pub fn host_id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl std::fmt::Debug for BrowserHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHost")
            .field("host_id", &self.inner.id)
            .field("engine_window", &self.inner.engine_window.get())
            .field("state", &self.inner.navigation.borrow().state())
            .finish()
    }
}

// No RefCell borrow may be held across a call into the engine or the host
// callback: both re-enter.
impl HostInner {
    fn engine(&self) -> Option<Rc<dyn BrowserEngine>> {
        self.engine.borrow().clone()
    }

    pub(crate) fn parent_window(&self) -> Option<WindowHandle> {
        self.parent.get()
    }

    pub(crate) fn viewport(&self) -> Rect {
        self.viewport.get()
    }

    fn synthetic_url(&self, path: &str) -> SyntheticUrl {
        SyntheticUrl::new(self.config.content_scheme.as_str(), self.id, path)
    }

    fn show_blank(&self) {
        let blank = self.config.blank_url.clone();
        self.navigation.borrow_mut().start_bootstrap(&blank);
        self.blank_shown.set(true);
        if !self.navigate(&blank) {
            self.navigation.borrow_mut().cancel_bootstrap();
        }
    }

    /// Returns whether the engine accepted the request.
    fn navigate(&self, url: &str) -> bool {
        let Some(engine) = self.engine() else {
            warn!(host_id = self.id, %url, "Navigation requested after teardown");
            return false;
        };
        match engine.navigate(url) {
            Ok(()) => true,
            Err(e) => {
                warn!(host_id = self.id, %url, error = %e, "Engine refused navigation");
                false
            }
        }
    }

    fn exec(&self, command: EngineCommand) {
        let Some(engine) = self.engine() else {
            return;
        };
        debug!(host_id = self.id, ?command, "Executing engine command");
        if let Err(e) = engine.exec(command) {
            warn!(host_id = self.id, ?command, error = %e, "Engine command failed");
        }
    }

    /// Make `source` the one live content source.
    fn install_content(&self, source: ContentSource) {
        let previous = self.content.borrow_mut().replace(Rc::new(source));
        if let Some(previous) = previous {
            debug!(host_id = self.id, url = %previous.target(), "Releasing superseded content source");
        }
    }

    /// Drop the content source serving `url`, if any.
    fn release_content_for(&self, url: &str) {
        let released = {
            let mut slot = self.content.borrow_mut();
            match slot.as_ref() {
                Some(source) if source.serves(url) => slot.take(),
                _ => None,
            }
        };
        if let Some(source) = released {
            trace!(host_id = self.id, url = %source.target(), consumed = source.is_consumed(), "Content source released");
        }
    }

    /// Resolve a synthetic URL requested by the engine.
    ///
    /// Reuses the registered source when it serves `url` and still holds
    /// its bytes; otherwise asks the host for them on demand, which is how
    /// relative links inside synthetic pages resolve.
    pub(crate) fn content_for(&self, url: &str) -> Option<Rc<ContentSource>> {
        let Some(target) = SyntheticUrl::parse(&self.config.content_scheme, url) else {
            debug!(host_id = self.id, %url, "Not a synthetic URL");
            return None;
        };
        if target.host_id() != self.id {
            warn!(host_id = self.id, %url, owner = target.host_id(), "Synthetic URL belongs to another host");
            return None;
        }

        if let Some(source) = self.content.borrow().as_ref() {
            if source.target() == &target && !source.is_consumed() {
                return Some(Rc::clone(source));
            }
        }

        let data_url = target.path().to_string();
        let source = Rc::new(ContentSource::on_demand(
            target,
            data_url,
            Rc::downgrade(&self.callback),
        ));
        *self.content.borrow_mut() = Some(Rc::clone(&source));
        Some(source)
    }

    pub(crate) fn on_before_navigate(&self, event: &NavigationEvent) -> bool {
        let url = event.url.as_str();
        if event.new_window {
            let allowed = self.callback.on_before_navigate(url, true);
            debug!(host_id = self.id, %url, allowed, "New window request");
            return allowed;
        }

        let bootstrap = self.navigation.borrow_mut().begin(url);
        let allowed = bootstrap || self.callback.on_before_navigate(url, false);

        let transition = {
            let mut navigation = self.navigation.borrow_mut();
            if allowed {
                navigation.allow().map(|_| ())
            } else {
                navigation.veto().map(|_| ())
            }
        };
        if let Err(e) = transition {
            // The callback started another navigation; its decision stands.
            debug!(host_id = self.id, %url, error = %e, "Stale navigation decision");
        }

        if !allowed {
            self.release_content_for(url);
        }
        allowed
    }

    pub(crate) fn on_document_complete(&self, url: &str) {
        let (can_go_back, can_go_forward) = match self.engine() {
            Some(engine) => (engine.can_go_back(), engine.can_go_forward()),
            None => (false, false),
        };

        let completion = self
            .navigation
            .borrow_mut()
            .complete(url, can_go_back, can_go_forward);
        self.release_content_for(url);

        if completion == Completion::Surfaced {
            self.callback.on_document_complete(url);
        }
    }

    pub(crate) fn on_navigate_error(&self, url: &str, status: i32) {
        let result = self.navigation.borrow_mut().fail(url, status);
        if let Err(e) = result {
            debug!(host_id = self.id, %url, status, error = %e, "Navigation error outside a load");
        }
        self.release_content_for(url);
    }

    pub(crate) fn on_command_state_change(&self, command: HistoryCommand, enabled: bool) {
        self.navigation
            .borrow_mut()
            .set_command_state(command, enabled);
    }

    pub(crate) fn on_drag_enter(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        if data.formats().contains(&DataFormat::Files) {
            Ok(DropEffect::Copy)
        } else {
            Err(DragDropError::UnsupportedFormat)
        }
    }

    pub(crate) fn on_drag_drop(&self, data: &dyn DataObject) -> Result<DropEffect, DragDropError> {
        self.on_drag_enter(data)?;
        let files = data.files()?;
        if files.is_empty() {
            return Err(DragDropError::UnsupportedFormat);
        }
        debug!(host_id = self.id, count = files.len(), "Files dropped");
        self.callback.on_files_dropped(files);
        Ok(DropEffect::Copy)
    }

    pub(crate) fn on_lbutton_down(&self) {
        self.callback.on_lbutton_down();
    }

    fn teardown(&self) {
        debug!(host_id = self.id, "Tearing down browser host");

        let site = self.site.borrow_mut().take();
        if let Some(site) = &site {
            site.disconnect();
        }

        let content = self.content.borrow_mut().take();
        drop(content);

        let engine = self.engine.borrow_mut().take();
        if let Some(engine) = engine {
            if let Err(e) = engine.set_client_site(None) {
                warn!(host_id = self.id, error = %e, "Failed to clear client site");
            }
            engine.close();
        }
        drop(site);

        self.engine_window.set(None);
        self.parent.set(None);
        info!(host_id = self.id, "Browser host destroyed");
    }
}
