//! Slide rasterization: the renderer seam, a directory-backed renderer and
//! generated placeholder thumbnails.

use crate::presentation::read_slide_size;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use toc_core::{caption_for, Error, Result};

/// Width of the rasters embedded into the generated slide.
pub const EXPORT_WIDTH: u32 = 1600;

/// Height of the rasters embedded into the generated slide.
pub const EXPORT_HEIGHT: u32 = 900;

/// Light gray.
const PLACEHOLDER_BACKGROUND: [u8; 3] = [211, 211, 211];
const PLACEHOLDER_INK: [u8; 3] = [0, 0, 0];

/// Produces slide images for a presentation.
pub trait SlideRenderer {
    /// Encoded PNG or JPEG image of the 1-based slide, at roughly
    /// `width` × `height` pixels.
    fn export(&self, slide_number: usize, width: u32, height: u32) -> Result<Vec<u8>>;

    /// Slide size (cx, cy) in EMU of the deck at `container`.
    fn native_slide_size(&self, container: &Path) -> Result<(i64, i64)> {
        read_slide_size(container)
    }
}

/// Serves pre-rendered `slide_{n}.png` / `.jpg` / `.jpeg` files from a
/// directory. Images are returned as stored; the requested size is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryRenderer {
    dir: PathBuf,
}

impl DirectoryRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn find(&self, slide_number: usize) -> Option<PathBuf> {
        ["png", "jpg", "jpeg"]
            .iter()
            .map(|ext| self.dir.join(format!("slide_{}.{}", slide_number, ext)))
            .find(|path| path.is_file())
    }
}

impl SlideRenderer for DirectoryRenderer {
    fn export(&self, slide_number: usize, _width: u32, _height: u32) -> Result<Vec<u8>> {
        let path = self.find(slide_number).ok_or_else(|| Error::Rendering {
            slide: slide_number,
            reason: format!("no image for slide {} in {}", slide_number, self.dir.display()),
        })?;

        std::fs::read(&path).map_err(|e| Error::Rendering {
            slide: slide_number,
            reason: format!("failed to read {}: {}", path.display(), e),
        })
    }
}

/// Renders every slide as a labelled placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl SlideRenderer for PlaceholderRenderer {
    fn export(&self, slide_number: usize, width: u32, height: u32) -> Result<Vec<u8>> {
        placeholder_png(slide_number, width, height)
    }
}

/// Export a slide, substituting a placeholder when the renderer fails.
pub fn export_or_placeholder(
    renderer: &dyn SlideRenderer,
    slide_number: usize,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    match renderer.export(slide_number, width, height) {
        Ok(data) => Ok(data),
        Err(e) => {
            log::warn!("Slide {} could not be exported, using placeholder: {}", slide_number, e);
            placeholder_png(slide_number, width, height)
        }
    }
}

/// A light-gray PNG labelled "Slide N" in the top-left corner.
pub fn placeholder_png(slide_number: usize, width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput(format!(
            "placeholder size must be positive, got {}x{}",
            width, height
        )));
    }

    let mut img = RgbImage::from_pixel(width, height, Rgb(PLACEHOLDER_BACKGROUND));
    let scale = (height / 60).max(1);
    draw_text(&mut img, &caption_for(slide_number), scale * 2, scale * 2, scale);

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| Error::ImageError(format!("Failed to encode placeholder: {}", e)))?;

    Ok(buffer.into_inner())
}

/// Draw `text` with a 5×7 bitmap font, each font pixel `scale` pixels wide.
/// Characters without a glyph advance like a space; anything past the image
/// edge is clipped.
fn draw_text(img: &mut RgbImage, text: &str, left: u32, top: u32, scale: u32) {
    let (width, height) = img.dimensions();
    let advance = 6 * scale;

    for (index, ch) in text.chars().enumerate() {
        let origin = left + index as u32 * advance;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0b10000 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = origin + col * scale + dx;
                        let y = top + row as u32 * scale + dy;
                        if x < width && y < height {
                            img.put_pixel(x, y, Rgb(PLACEHOLDER_INK));
                        }
                    }
                }
            }
        }
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'l' => [0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'i' => [0b00100, 0b00000, 0b01100, 0b00100, 0b00100, 0b00100, 0b01110],
        'd' => [0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10001, 0b01111],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        _ => [0; 7],
    }
}
