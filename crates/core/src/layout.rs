//! Grid layout optimizer.
//!
//! Picks the column count and thumbnail size that fill the area below the
//! title band as fully as possible while respecting the minimum thumbnail
//! size. Everything here is pure: the same inputs always give the same
//! [`GridSolution`].

use crate::types::{Canvas, GridSolution, LayoutConstants};
use crate::{Error, Result};

/// Upper bound of the automatic column search.
pub const MAX_SEARCH_COLUMNS: usize = 8;

/// Column count used by the last-resort fallback, capped by the slide count.
const FALLBACK_COLUMNS: usize = 4;

/// Slack allowed when comparing the grid height to the available height.
/// The height-constrained re-solve lands exactly on the limit.
const FIT_EPSILON: f64 = 1e-6;

/// Something that can turn a slide count into a grid.
pub trait GridSolver {
    /// The spacing constants the solver lays out with.
    fn constants(&self) -> &LayoutConstants;

    /// Solve the grid for `slide_count` thumbnails on `canvas`.
    fn solve(
        &self,
        slide_count: usize,
        margin: f64,
        desired_columns: Option<usize>,
        canvas: Canvas,
    ) -> Result<GridSolution>;
}

/// Outcome of evaluating one candidate column count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Whether the grid fits the available area and the minimum sizes.
    pub fits: bool,
    /// The grid the trial produced, fitting or not.
    pub solution: GridSolution,
}

/// Area-maximizing grid layout optimizer.
#[derive(Debug, Clone, Default)]
pub struct LayoutOptimizer {
    constants: LayoutConstants,
}

impl LayoutOptimizer {
    /// Create an optimizer with the default constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom spacing constants.
    pub fn with_constants(mut self, constants: LayoutConstants) -> Self {
        self.constants = constants;
        self
    }

    /// Evaluate a single column count, including the height-constrained
    /// re-solve when the unconstrained grid is too tall.
    pub fn trial(&self, slide_count: usize, margin: f64, columns: usize, canvas: Canvas) -> Trial {
        let area = Area::new(&self.constants, margin, canvas);
        let c = &self.constants;
        let cols = columns.max(1);

        let column_budget = area.column_width(cols);
        let mut thumb_w = column_budget;
        let mut thumb_h = thumb_w / area.aspect;

        let rows = slide_count.div_ceil(cols);
        let mut row_h = thumb_h + margin + c.caption_height;
        let mut total_h = rows as f64 * row_h;
        let mut fits = area.fits(total_h, thumb_w, thumb_h);

        if !fits && total_h > area.height + FIT_EPSILON {
            let max_thumb_h =
                (area.height - rows as f64 * (c.caption_height + margin)) / rows as f64;
            if max_thumb_h > 0.0 {
                thumb_h = c.min_thumb_height.max(max_thumb_h);
                thumb_w = thumb_h * area.aspect;

                if thumb_w > column_budget {
                    thumb_w = column_budget;
                    thumb_h = thumb_w / area.aspect;
                }

                row_h = thumb_h + margin + c.caption_height;
                total_h = rows as f64 * row_h;
                fits = area.fits(total_h, thumb_w, thumb_h);
            }
        }

        Trial {
            fits,
            solution: GridSolution {
                columns: cols,
                thumb_width: thumb_w,
                thumb_height: thumb_h,
                row_height: row_h,
            },
        }
    }

    /// Last-resort grid: minimum thumbnail size at the canvas aspect ratio.
    fn hard_floor(&self, slide_count: usize, margin: f64, canvas: Canvas) -> GridSolution {
        let c = &self.constants;
        let aspect = canvas.aspect_ratio();
        let thumb_h = c.min_thumb_height.max(c.min_thumb_width / aspect);
        let thumb_w = c.min_thumb_width.max(thumb_h * aspect);

        GridSolution {
            columns: FALLBACK_COLUMNS.min(slide_count).max(1),
            thumb_width: thumb_w,
            thumb_height: thumb_h,
            row_height: thumb_h + margin + c.caption_height,
        }
    }
}

impl GridSolver for LayoutOptimizer {
    fn constants(&self) -> &LayoutConstants {
        &self.constants
    }

    fn solve(
        &self,
        slide_count: usize,
        margin: f64,
        desired_columns: Option<usize>,
        canvas: Canvas,
    ) -> Result<GridSolution> {
        if slide_count == 0 {
            return Err(Error::InvalidInput(
                "slide count must be at least 1".to_string(),
            ));
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(Error::InvalidInput(format!(
                "margin must be a non-negative number, got {}",
                margin
            )));
        }
        canvas.validate()?;

        // A desired column count wins outright whenever it fits.
        if let Some(desired) = desired_columns.filter(|&d| d > 0) {
            let trial = self.trial(slide_count, margin, desired, canvas);
            if trial.fits {
                log::debug!("using desired column count {}", desired);
                return Ok(trial.solution);
            }
            log::debug!("desired column count {} does not fit, searching", desired);
        }

        let mut best: Option<GridSolution> = None;
        for columns in 1..=MAX_SEARCH_COLUMNS {
            let trial = self.trial(slide_count, margin, columns, canvas);
            if !trial.fits {
                continue;
            }
            let improves = best
                .map(|b| trial.solution.thumb_area() > b.thumb_area())
                .unwrap_or(true);
            if improves {
                best = Some(trial.solution);
            }
        }

        if let Some(solution) = best {
            log::debug!(
                "{} slides -> {} columns of {:.1}x{:.1}",
                slide_count,
                solution.columns,
                solution.thumb_width,
                solution.thumb_height
            );
            return Ok(solution);
        }

        let single = self.trial(slide_count, margin, 1, canvas);
        if single.fits {
            return Ok(single.solution);
        }

        log::warn!(
            "no grid fits {} slides with margin {}; using minimum thumbnail size",
            slide_count,
            margin
        );
        Ok(self.hard_floor(slide_count, margin, canvas))
    }
}

/// The drawable region left after the title and bottom bands.
struct Area<'a> {
    constants: &'a LayoutConstants,
    margin: f64,
    width: f64,
    height: f64,
    aspect: f64,
}

impl<'a> Area<'a> {
    fn new(constants: &'a LayoutConstants, margin: f64, canvas: Canvas) -> Self {
        Self {
            constants,
            margin,
            width: canvas.width - margin * 2.0,
            height: canvas.height - constants.title_height - constants.bottom_margin,
            aspect: canvas.aspect_ratio(),
        }
    }

    /// Widest thumbnail that still fits `columns` side by side.
    fn column_width(&self, columns: usize) -> f64 {
        (self.width - self.margin * (columns as f64 - 1.0)) / columns as f64
    }

    fn fits(&self, total_height: f64, thumb_w: f64, thumb_h: f64) -> bool {
        total_height <= self.height + FIT_EPSILON
            && thumb_w >= self.constants.min_thumb_width
            && thumb_h >= self.constants.min_thumb_height
    }
}
