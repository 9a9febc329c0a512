//! PPTX (Office Open XML) backend for table-of-contents generation.
//!
//! Reads the slide list of a .pptx package, rasterizes slides through a
//! [`SlideRenderer`] and appends a slide of linked thumbnails to a copy of
//! the deck.

pub mod assembler;
pub mod builder;
pub mod constants;
pub mod deck;
pub mod package;
pub mod presentation;
pub mod render;
pub mod units;

pub use assembler::{next_output_path, TocAssembler};
pub use builder::{
    EmuRect, NavigationLink, PptxSlideBuilder, Shape, ShapeContent, ShapeKind, SlideBuilder,
};
pub use deck::{load_deck, slide_canvas};
pub use package::{Package, Relationship};
pub use presentation::{read_slide_size, PresentationInfo, SlideEntry};
pub use render::{
    export_or_placeholder, placeholder_png, DirectoryRenderer, PlaceholderRenderer, SlideRenderer,
    EXPORT_HEIGHT, EXPORT_WIDTH,
};
pub use units::{emu_to_points, points_to_emu, EMU_PER_POINT};
