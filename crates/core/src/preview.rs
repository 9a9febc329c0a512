//! Preview projection: turns a grid solution into positioned thumbnails.

use crate::layout::GridSolver;
use crate::types::{caption_for, Canvas, GridSolution, PlacedItem, SlideRef};
use crate::Result;

/// Padding added around the placed items when sizing a preview surface.
pub const PREVIEW_PADDING: f64 = 20.0;

/// Bounds for the automatic preview zoom.
const MIN_PREVIEW_SCALE: f64 = 0.3;
const MAX_PREVIEW_SCALE: f64 = 1.2;

/// Top-left corner of the cell at `index`.
///
/// Row is `index / columns`, column is `index % columns`.
pub fn cell_origin(
    index: usize,
    solution: &GridSolution,
    margin: f64,
    title_height: f64,
) -> (f64, f64) {
    let columns = solution.columns.max(1);
    let row = index / columns;
    let col = index % columns;

    let x = margin + col as f64 * (solution.thumb_width + margin);
    let y = title_height + row as f64 * solution.row_height;
    (x, y)
}

/// Lay out `slides` in input order.
///
/// An empty slice gives an empty result without consulting the solver.
pub fn project<S: GridSolver + ?Sized>(
    solver: &S,
    slides: &[SlideRef],
    columns: Option<usize>,
    margin: f64,
    canvas: Canvas,
) -> Result<Vec<PlacedItem>> {
    if slides.is_empty() {
        return Ok(Vec::new());
    }

    let solution = solver.solve(slides.len(), margin, columns, canvas)?;
    let title_height = solver.constants().title_height;

    let items = slides
        .iter()
        .enumerate()
        .map(|(i, slide)| {
            let (x, y) = cell_origin(i, &solution, margin, title_height);
            PlacedItem {
                x,
                y,
                width: solution.thumb_width,
                height: solution.thumb_height,
                caption: caption_for(slide.number),
                slide_number: slide.number,
                thumbnail: slide.thumbnail.clone(),
            }
        })
        .collect();

    Ok(items)
}

/// Smallest canvas that shows every item, never smaller than the default.
pub fn canvas_size(items: &[PlacedItem], caption_height: f64) -> Canvas {
    let default = Canvas::default();
    if items.is_empty() {
        return default;
    }

    let max_right = items.iter().map(PlacedItem::right).fold(f64::MIN, f64::max);
    let max_bottom = items
        .iter()
        .map(|item| item.bottom(caption_height))
        .fold(f64::MIN, f64::max);

    Canvas::new(
        (max_right + PREVIEW_PADDING).max(default.width),
        (max_bottom + PREVIEW_PADDING).max(default.height),
    )
}

/// Zoom factor that fits `canvas` into a viewport, clamped to a readable range.
///
/// Returns `None` while either size is still unknown.
pub fn fit_scale(viewport_width: f64, viewport_height: f64, canvas: Canvas) -> Option<f64> {
    if viewport_width <= 0.0
        || viewport_height <= 0.0
        || canvas.width <= 0.0
        || canvas.height <= 0.0
    {
        return None;
    }

    let scale = (viewport_width / canvas.width).min(viewport_height / canvas.height);
    Some(scale.clamp(MIN_PREVIEW_SCALE, MAX_PREVIEW_SCALE))
}
