//! Conversions between core window handles, Win32 `HWND`s and
//! `raw-window-handle`.

use std::ffi::c_void;
use std::num::NonZeroIsize;

use htmlhost_core::WindowHandle;
use raw_window_handle::{HandleError, HasWindowHandle, RawWindowHandle, Win32WindowHandle};
use windows::Win32::Foundation::HWND;

/// A parent window borrowed by wry while it builds a child webview.
#[derive(Debug, Clone, Copy)]
pub struct ParentWindow(WindowHandle);

impl ParentWindow {
    pub fn new(handle: WindowHandle) -> Self {
        Self(handle)
    }
}

impl HasWindowHandle for ParentWindow {
    fn window_handle(&self) -> Result<raw_window_handle::WindowHandle<'_>, HandleError> {
        let hwnd = NonZeroIsize::new(self.0.raw()).ok_or(HandleError::Unavailable)?;
        let raw = RawWindowHandle::Win32(Win32WindowHandle::new(hwnd));
        // SAFETY: the embedding application keeps the parent alive for the
        // lifetime of the host, which outlives the webview built into it.
        Ok(unsafe { raw_window_handle::WindowHandle::borrow_raw(raw) })
    }
}

pub(crate) fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.raw() as *mut c_void)
}

pub(crate) fn from_hwnd(hwnd: HWND) -> Option<WindowHandle> {
    WindowHandle::new(hwnd.0 as isize)
}

/// Win32 handle of any window that exposes one, e.g. a `tao` window.
pub fn window_handle_of(window: &impl HasWindowHandle) -> Option<WindowHandle> {
    let handle = window.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => WindowHandle::new(win32.hwnd.get()),
        _ => None,
    }
}
