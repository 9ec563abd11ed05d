//! Window handles and small geometry values shared with the engine.

use std::num::NonZeroIsize;

/// Native window handle. Opaque to the core; backends interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(NonZeroIsize);

impl WindowHandle {
    /// Wrap a raw handle. Null handles are rejected.
    pub fn new(raw: isize) -> Option<Self> {
        NonZeroIsize::new(raw).map(Self)
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> isize {
        self.0.get()
    }
}

/// Size in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangle in device pixels, relative to the engine viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin covering `size`.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }
}

/// A raw window message forwarded to the engine window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub fn new(msg: u32, wparam: usize, lparam: isize) -> Self {
        Self { msg, wparam, lparam }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_window_handle_rejected() {
        assert!(WindowHandle::new(0).is_none());
        assert_eq!(WindowHandle::new(0x1234).map(|h| h.raw()), Some(0x1234));
    }

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(10, 20, 800, 600);
        assert_eq!(rect.right(), 810);
        assert_eq!(rect.bottom(), 620);
        assert_eq!(rect.size(), Size::new(800, 600));
        assert!(!rect.is_empty());
        assert!(Rect::new(0, 0, 0, 10).is_empty());
    }
}
