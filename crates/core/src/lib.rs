//! Core domain types, grid layout optimization and preview projection
//! for table-of-contents slide generation.

pub mod error;
pub mod layout;
pub mod preview;
pub mod types;

pub use error::{Error, Result};
pub use layout::{GridSolver, LayoutOptimizer, Trial, MAX_SEARCH_COLUMNS};
pub use preview::{canvas_size, cell_origin, fit_scale, project, PREVIEW_PADDING};
pub use types::{
    caption_for, Canvas, GridSolution, LayoutConstants, PlacedItem, SlideDeck, SlideRef, Thumbnail,
};
