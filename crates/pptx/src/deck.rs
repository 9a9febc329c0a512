//! Loading a deck into the caller-facing slide list.

use crate::package::Package;
use crate::presentation::PresentationInfo;
use crate::render::{export_or_placeholder, SlideRenderer};
use crate::units::emu_to_points;
use std::path::Path;
use toc_core::{Canvas, Result, SlideDeck, SlideRef, Thumbnail};

/// Width in pixels of the thumbnails produced for previews.
pub const PREVIEW_THUMB_WIDTH: u32 = 640;

/// Slide size of the deck at `path` in points, or the default canvas when
/// it cannot be read.
pub fn slide_canvas(renderer: &dyn SlideRenderer, path: &Path) -> Canvas {
    match renderer.native_slide_size(path) {
        Ok((cx, cy)) if cx > 0 && cy > 0 => Canvas::new(emu_to_points(cx), emu_to_points(cy)),
        Ok((cx, cy)) => {
            log::warn!(
                "{} declares slide size {}x{}, using default canvas",
                path.display(),
                cx,
                cy
            );
            Canvas::default()
        }
        Err(e) => {
            log::warn!("Cannot read slide size of {}, using default canvas: {}", path.display(), e);
            Canvas::default()
        }
    }
}

/// Thumbnail size for previews, keeping the slide aspect ratio.
pub fn preview_size(canvas: Canvas) -> (u32, u32) {
    let height = (PREVIEW_THUMB_WIDTH as f64 / canvas.aspect_ratio()).round();
    (PREVIEW_THUMB_WIDTH, (height as u32).max(1))
}

/// Read the slide list of the deck at `path`, every slide selected and
/// carrying a preview thumbnail.
pub fn load_deck(path: &Path, renderer: &dyn SlideRenderer) -> Result<SlideDeck> {
    let package = Package::open(path)?;
    let info = PresentationInfo::read(&package)?;
    let (width, height) = preview_size(slide_canvas(renderer, path));

    let mut slides = Vec::with_capacity(info.slide_count());
    for number in 1..=info.slide_count() {
        let image = export_or_placeholder(renderer, number, width, height)?;
        slides.push(SlideRef::new(number).with_thumbnail(Thumbnail::new(image)));
    }

    log::debug!("loaded {} slides from {}", slides.len(), path.display());
    Ok(SlideDeck::new(slides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use toc_core::Error;

    struct FixedSize(i64, i64);

    impl SlideRenderer for FixedSize {
        fn export(&self, slide_number: usize, _width: u32, _height: u32) -> Result<Vec<u8>> {
            Err(Error::Rendering {
                slide: slide_number,
                reason: "not used".to_string(),
            })
        }

        fn native_slide_size(&self, _container: &Path) -> Result<(i64, i64)> {
            Ok((self.0, self.1))
        }
    }

    #[test]
    fn test_slide_canvas_from_renderer() {
        let canvas = slide_canvas(&FixedSize(9_144_000, 6_858_000), Path::new("deck.pptx"));
        assert_eq!(canvas, Canvas::new(720.0, 540.0));
    }

    #[test]
    fn test_slide_canvas_falls_back() {
        let missing = Path::new("/nonexistent/deck.pptx");
        assert_eq!(
            slide_canvas(&crate::render::PlaceholderRenderer, missing),
            Canvas::default()
        );
        assert_eq!(slide_canvas(&FixedSize(0, 6_858_000), missing), Canvas::default());
    }

    #[test]
    fn test_preview_size_keeps_aspect() {
        assert_eq!(preview_size(Canvas::default()), (640, 360));
        assert_eq!(preview_size(Canvas::new(720.0, 540.0)), (640, 480));
    }

    #[test]
    fn test_load_deck_missing_file() {
        let result = load_deck(Path::new("/nonexistent/deck.pptx"), &FixedSize(1, 1));
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
