//! Domain types shared by the layout optimizer, the preview projector and
//! the document assembler.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default canvas width in points (13.333 in × 72, 16:9).
pub const DEFAULT_CANVAS_WIDTH: f64 = 960.0;

/// Default canvas height in points (7.5 in × 72, 16:9).
pub const DEFAULT_CANVAS_HEIGHT: f64 = 540.0;

/// The rectangle the table of contents is laid out in, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl Canvas {
    /// Create a canvas of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Reject zero, negative or non-finite dimensions.
    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "canvas must have positive dimensions, got {}x{}",
                self.width, self.height
            )))
        }
    }
}

/// Fixed spacing constants used by a layout computation, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConstants {
    /// Band reserved at the top of the slide for a title.
    pub title_height: f64,
    /// Band reserved at the bottom of the slide.
    pub bottom_margin: f64,
    /// Height reserved under each thumbnail for its caption.
    pub caption_height: f64,
    /// Smallest acceptable thumbnail width.
    pub min_thumb_width: f64,
    /// Smallest acceptable thumbnail height.
    pub min_thumb_height: f64,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            title_height: 120.0,
            bottom_margin: 40.0,
            caption_height: 20.0,
            min_thumb_width: 80.0,
            min_thumb_height: 60.0,
        }
    }
}

impl LayoutConstants {
    /// Create the default constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the height of the title band.
    pub fn with_title_height(mut self, height: f64) -> Self {
        self.title_height = height.max(0.0);
        self
    }

    /// Set the height of the bottom band.
    pub fn with_bottom_margin(mut self, height: f64) -> Self {
        self.bottom_margin = height.max(0.0);
        self
    }

    /// Set the caption height reserved under each thumbnail.
    pub fn with_caption_height(mut self, height: f64) -> Self {
        self.caption_height = height.max(0.0);
        self
    }

    /// Set the minimum thumbnail size.
    pub fn with_min_thumb_size(mut self, width: f64, height: f64) -> Self {
        self.min_thumb_width = width.max(0.0);
        self.min_thumb_height = height.max(0.0);
        self
    }
}

/// The grid chosen by the layout optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSolution {
    /// Number of columns, always at least 1.
    pub columns: usize,
    /// Width of each thumbnail.
    pub thumb_width: f64,
    /// Height of each thumbnail.
    pub thumb_height: f64,
    /// Vertical pitch between rows: thumbnail + margin + caption.
    pub row_height: f64,
}

impl GridSolution {
    /// Thumbnail area, the quantity the column search maximizes.
    pub fn thumb_area(&self) -> f64 {
        self.thumb_width * self.thumb_height
    }

    /// Number of rows needed for `count` items.
    pub fn rows_for(&self, count: usize) -> usize {
        count.div_ceil(self.columns)
    }
}

/// Opaque handle to an encoded slide thumbnail.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail(Arc<[u8]>);

impl Thumbnail {
    /// Wrap encoded image bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbnail({} bytes)", self.0.len())
    }
}

/// One slide of the source deck as seen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRef {
    /// 1-based slide number in the source deck.
    pub number: usize,

    /// Whether the slide goes into the table of contents.
    pub selected: bool,

    /// Rendered preview of the slide, if one was produced.
    #[serde(skip)]
    pub thumbnail: Option<Thumbnail>,
}

impl SlideRef {
    /// Create a selected slide reference without a thumbnail.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            selected: true,
            thumbnail: None,
        }
    }

    /// Attach a thumbnail.
    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Set the selection flag.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// The caller's slide list together with the background slide selector.
///
/// The background slide is held as a single index so there is never more
/// than one of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideDeck {
    /// Slides in presentation order.
    pub slides: Vec<SlideRef>,

    background: Option<usize>,
}

impl SlideDeck {
    /// Create a deck from a slide list with no explicit background.
    pub fn new(slides: Vec<SlideRef>) -> Self {
        Self {
            slides,
            background: None,
        }
    }

    /// Choose the slide (0-based index) whose layout the generated slide
    /// inherits. Replaces any previous choice.
    pub fn set_background(&mut self, index: usize) -> Result<()> {
        if index >= self.slides.len() {
            return Err(Error::InvalidInput(format!(
                "background slide index {} out of range (deck has {} slides)",
                index,
                self.slides.len()
            )));
        }
        self.background = Some(index);
        Ok(())
    }

    /// Forget the background choice.
    pub fn clear_background(&mut self) {
        self.background = None;
    }

    /// The chosen background index, falling back to the first slide.
    pub fn background_index(&self) -> usize {
        self.background.unwrap_or(0)
    }

    /// Whether the slide at `index` is the background slide.
    pub fn is_background(&self, index: usize) -> bool {
        self.background == Some(index)
    }

    /// Select or deselect every slide.
    pub fn select_all(&mut self, selected: bool) {
        for slide in &mut self.slides {
            slide.selected = selected;
        }
    }

    /// Selected slides, in presentation order.
    pub fn selected(&self) -> Vec<SlideRef> {
        self.slides.iter().filter(|s| s.selected).cloned().collect()
    }

    /// Whether anything is selected.
    pub fn has_selection(&self) -> bool {
        self.slides.iter().any(|s| s.selected)
    }
}

/// One thumbnail placed on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedItem {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Thumbnail width.
    pub width: f64,
    /// Thumbnail height, excluding the caption.
    pub height: f64,
    /// Caption shown under the thumbnail.
    pub caption: String,
    /// 1-based number of the slide this item links to.
    pub slide_number: usize,
    /// Thumbnail carried over from the originating slide.
    #[serde(skip)]
    pub thumbnail: Option<Thumbnail>,
}

impl PlacedItem {
    /// Right edge of the thumbnail.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge of the thumbnail plus its caption.
    pub fn bottom(&self, caption_height: f64) -> f64 {
        self.y + self.height + caption_height
    }
}

/// Caption text for a slide.
pub fn caption_for(slide_number: usize) -> String {
    format!("Slide {}", slide_number)
}
