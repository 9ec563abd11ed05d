//! Off-screen bitmaps produced by screenshots.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::BitmapError;
use crate::geometry::Size;

/// An owned 32-bit RGBA bitmap, rows top-down.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Bitmap {
    /// Wrap an RGBA pixel buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BitmapError> {
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(BitmapError::SizeMismatch {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(out)
    }

    /// Stretch to `target` using nearest-neighbour sampling.
    ///
    /// Returns a clone when the size already matches. An empty source or
    /// target produces an empty bitmap of the target size.
    pub fn scaled(&self, target: Size) -> Bitmap {
        if target == self.size() {
            return self.clone();
        }
        if target.is_empty() || self.size().is_empty() {
            return Bitmap::filled(target.width, target.height, [0, 0, 0, 0]);
        }

        let (src_w, src_h) = (self.width as u64, self.height as u64);
        let (dst_w, dst_h) = (target.width as u64, target.height as u64);
        let mut pixels = Vec::with_capacity((dst_w * dst_h * 4) as usize);

        for y in 0..dst_h {
            let sy = (y * src_h / dst_h) as usize;
            let row = sy * src_w as usize;
            for x in 0..dst_w {
                let sx = (x * src_w / dst_w) as usize;
                let offset = (row + sx) * 4;
                pixels.extend_from_slice(&self.pixels[offset..offset + 4]);
            }
        }

        Bitmap {
            width: target.width,
            height: target.height,
            pixels,
        }
    }

    /// Encode as PNG at `path`.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<(), BitmapError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut png_writer = encoder
            .write_header()
            .map_err(|e| BitmapError::PngEncoding(e.to_string()))?;

        png_writer
            .write_image_data(&self.pixels)
            .map_err(|e| BitmapError::PngEncoding(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadrants() -> Bitmap {
        // 2x2: red, green / blue, white
        let pixels = vec![
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        Bitmap::from_rgba(2, 2, pixels).unwrap()
    }

    #[test]
    fn test_from_rgba_rejects_short_buffer() {
        let err = Bitmap::from_rgba(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, BitmapError::SizeMismatch { actual: 10, .. }));
    }

    #[test]
    fn test_upscale_preserves_quadrants() {
        let scaled = quadrants().scaled(Size::new(4, 4));
        assert_eq!(scaled.size(), Size::new(4, 4));
        assert_eq!(scaled.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(scaled.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(scaled.pixel(3, 0), Some([0, 255, 0, 255]));
        assert_eq!(scaled.pixel(0, 3), Some([0, 0, 255, 255]));
        assert_eq!(scaled.pixel(3, 3), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_downscale_to_single_pixel() {
        let scaled = quadrants().scaled(Size::new(1, 1));
        assert_eq!(scaled.pixels().len(), 4);
        assert_eq!(scaled.pixel(0, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_scale_to_empty_target() {
        let scaled = quadrants().scaled(Size::new(0, 5));
        assert_eq!(scaled.size(), Size::new(0, 5));
        assert!(scaled.pixels().is_empty());
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        quadrants().write_png(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
