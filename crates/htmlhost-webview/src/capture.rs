//! GDI capture of the webview surface into a [`Bitmap`].

use htmlhost_core::{Bitmap, EngineError, EngineResult, Rect};
use windows::Win32::{
    Foundation::{HWND, RECT},
    Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, SRCCOPY,
    },
    Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS, PW_CLIENTONLY},
    UI::WindowsAndMessaging::GetClientRect,
};

/// Asks DWM for composed content; WebView2 renders through DirectComposition
/// and a plain `BitBlt` of the window DC comes back black.
const PW_RENDERFULLCONTENT: u32 = 0x0000_0002;

fn win32(msg: impl Into<String>) -> EngineError {
    EngineError::internal(msg)
}

/// Capture `area` of `hwnd`'s client area at native size.
pub(crate) fn capture_window(hwnd: HWND, area: Rect) -> EngineResult<Bitmap> {
    let (width, height, pixels) = capture_client(hwnd)?;
    crop(width, height, &pixels, area)
}

fn capture_client(hwnd: HWND) -> EngineResult<(u32, u32, Vec<u8>)> {
    unsafe {
        let mut rect = RECT::default();
        GetClientRect(hwnd, &mut rect).map_err(|e| win32(format!("GetClientRect failed: {e}")))?;

        let width = (rect.right - rect.left) as u32;
        let height = (rect.bottom - rect.top) as u32;
        if width == 0 || height == 0 {
            return Err(win32("Webview window has zero size"));
        }

        let hdc_window = GetDC(hwnd);
        if hdc_window.is_invalid() {
            return Err(win32("GetDC failed"));
        }

        let hdc_mem = CreateCompatibleDC(hdc_window);
        if hdc_mem.is_invalid() {
            ReleaseDC(hwnd, hdc_window);
            return Err(win32("CreateCompatibleDC failed"));
        }

        let hbm = CreateCompatibleBitmap(hdc_window, width as i32, height as i32);
        if hbm.is_invalid() {
            let _ = DeleteDC(hdc_mem);
            ReleaseDC(hwnd, hdc_window);
            return Err(win32("CreateCompatibleBitmap failed"));
        }

        let old_bm = SelectObject(hdc_mem, hbm);

        let flags = PRINT_WINDOW_FLAGS(PW_CLIENTONLY.0 | PW_RENDERFULLCONTENT);
        let printed = PrintWindow(hwnd, hdc_mem, flags).as_bool()
            || BitBlt(
                hdc_mem,
                0,
                0,
                width as i32,
                height as i32,
                hdc_window,
                0,
                0,
                SRCCOPY,
            )
            .is_ok();

        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            bmiColors: [Default::default()],
        };

        let mut pixels = vec![0u8; (width * height * 4) as usize];
        let lines = if printed {
            GetDIBits(
                hdc_mem,
                hbm,
                0,
                height,
                Some(pixels.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        SelectObject(hdc_mem, old_bm);
        let _ = DeleteObject(hbm);
        let _ = DeleteDC(hdc_mem);
        ReleaseDC(hwnd, hdc_window);

        if !printed {
            return Err(win32("PrintWindow and BitBlt both failed"));
        }
        if lines == 0 {
            return Err(win32("GetDIBits failed"));
        }

        // BGRX -> RGBA
        for chunk in pixels.chunks_exact_mut(4) {
            chunk.swap(0, 2);
            chunk[3] = 255;
        }

        Ok((width, height, pixels))
    }
}

/// Cut `area` out of a `width` x `height` RGBA buffer. The area is clipped
/// to the buffer.
fn crop(width: u32, height: u32, pixels: &[u8], area: Rect) -> EngineResult<Bitmap> {
    let left = area.x.clamp(0, width as i32) as u32;
    let top = area.y.clamp(0, height as i32) as u32;
    let right = area.right().clamp(0, width as i32) as u32;
    let bottom = area.bottom().clamp(0, height as i32) as u32;
    if right <= left || bottom <= top {
        return Err(win32(format!(
            "Area {area:?} lies outside the {width}x{height} surface"
        )));
    }

    let out_w = right - left;
    let out_h = bottom - top;
    let stride = width as usize * 4;
    let mut out = Vec::with_capacity(out_w as usize * out_h as usize * 4);
    for row in top..bottom {
        let start = row as usize * stride + left as usize * 4;
        out.extend_from_slice(&pixels[start..start + out_w as usize * 4]);
    }

    Bitmap::from_rgba(out_w, out_h, out).map_err(|e| win32(e.to_string()))
}
