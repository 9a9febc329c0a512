//! The table-of-contents assembly pipeline.

use crate::builder::{
    EmuRect, NavigationLink, PptxSlideBuilder, Shape, ShapeContent, ShapeKind, SlideBuilder,
};
use crate::package::Package;
use crate::presentation::PresentationInfo;
use crate::render::{
    export_or_placeholder, DirectoryRenderer, SlideRenderer, EXPORT_HEIGHT, EXPORT_WIDTH,
};
use crate::units::points_to_emu;
use std::path::{Path, PathBuf};
use toc_core::{project, Error, LayoutOptimizer, PlacedItem, Result, SlideRef};

/// Height of every caption text box in EMU.
///
/// Fixed and independent of the caption band the layout reserves.
pub const CAPTION_SHAPE_HEIGHT_EMU: i64 = 300_000;

/// Outline color of thumbnail frames.
pub const FRAME_OUTLINE_COLOR: &str = "808080";

/// Language tag of caption text runs.
pub const CAPTION_LANGUAGE: &str = "en-US";

/// Builds a table-of-contents slide into a copy of a deck.
#[derive(Debug, Clone)]
pub struct TocAssembler {
    optimizer: LayoutOptimizer,
    export_width: u32,
    export_height: u32,
    caption_language: String,
    scratch_dir: Option<PathBuf>,
}

impl Default for TocAssembler {
    fn default() -> Self {
        Self {
            optimizer: LayoutOptimizer::new(),
            export_width: EXPORT_WIDTH,
            export_height: EXPORT_HEIGHT,
            caption_language: CAPTION_LANGUAGE.to_string(),
            scratch_dir: None,
        }
    }
}

impl TocAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a differently configured layout optimizer.
    pub fn with_optimizer(mut self, optimizer: LayoutOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Set the pixel size slides are rasterized at.
    pub fn with_export_size(mut self, width: u32, height: u32) -> Self {
        self.export_width = width.max(1);
        self.export_height = height.max(1);
        self
    }

    /// Set the language tag of caption text.
    pub fn with_caption_language(mut self, language: impl Into<String>) -> Self {
        self.caption_language = language.into();
        self
    }

    /// Create the temporary raster directory inside `dir` instead of the
    /// system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Copy `source` next to itself and append a slide linking to each of
    /// `slides`. Returns the path of the copy.
    ///
    /// Nothing is written unless every argument checks out. The source is
    /// never modified.
    pub fn assemble(
        &self,
        source: &Path,
        slides: &[SlideRef],
        columns: Option<usize>,
        margin: f64,
        background_index: usize,
        renderer: &dyn SlideRenderer,
    ) -> Result<PathBuf> {
        self.validate(source, slides, margin, background_index)?;

        let output = next_output_path(source);
        std::fs::copy(source, &output)?;
        log::debug!("copied {} to {}", source.display(), output.display());

        let mut scratch = tempfile::Builder::new();
        scratch.prefix("toc_rasters");
        let scratch = match &self.scratch_dir {
            Some(dir) => scratch.tempdir_in(dir)?,
            None => scratch.tempdir()?,
        };
        let result = self
            .export_rasters(slides, renderer, scratch.path())
            .and_then(|()| {
                let mut builder = PptxSlideBuilder::open(&output)?;
                let rasters = DirectoryRenderer::new(scratch.path());
                self.emit(&mut builder, slides, columns, margin, background_index, &rasters)
            });

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!("Failed to remove {}: {}", scratch_path.display(), e);
        }

        let items = result?;
        log::info!(
            "added table of contents with {} entries to {}",
            items.len(),
            output.display()
        );
        Ok(output)
    }

    fn validate(
        &self,
        source: &Path,
        slides: &[SlideRef],
        margin: f64,
        background_index: usize,
    ) -> Result<()> {
        if slides.is_empty() {
            return Err(Error::InvalidInput("no slides selected".to_string()));
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(Error::InvalidInput(format!(
                "margin must be a non-negative number, got {}",
                margin
            )));
        }

        let package = Package::open(source)?;
        let slide_count = PresentationInfo::read(&package)?.slide_count();

        if background_index >= slide_count {
            return Err(Error::InvalidInput(format!(
                "background slide index {} out of range (deck has {} slides)",
                background_index, slide_count
            )));
        }
        if let Some(slide) = slides.iter().find(|s| s.number == 0 || s.number > slide_count) {
            return Err(Error::InvalidInput(format!(
                "slide {} out of range (deck has {} slides)",
                slide.number, slide_count
            )));
        }
        Ok(())
    }

    /// Write one raster per slide into `dir` as `slide_{n}.png`.
    fn export_rasters(
        &self,
        slides: &[SlideRef],
        renderer: &dyn SlideRenderer,
        dir: &Path,
    ) -> Result<()> {
        for slide in slides {
            let data = export_or_placeholder(
                renderer,
                slide.number,
                self.export_width,
                self.export_height,
            )?;
            std::fs::write(dir.join(format!("slide_{}.png", slide.number)), data)?;
        }
        Ok(())
    }

    /// Lay out `slides` on the builder's canvas and emit a frame, a picture
    /// and a caption for each one, then save.
    ///
    /// Images come from `rasters`, which is expected to succeed for every
    /// slide.
    pub fn emit<B: SlideBuilder + ?Sized>(
        &self,
        builder: &mut B,
        slides: &[SlideRef],
        columns: Option<usize>,
        margin: f64,
        background_index: usize,
        rasters: &dyn SlideRenderer,
    ) -> Result<Vec<PlacedItem>> {
        builder.new_slide_from(background_index)?;

        let canvas = builder.canvas();
        let items = project(&self.optimizer, slides, columns, margin, canvas)?;

        for (i, item) in items.iter().enumerate() {
            let n = item.slide_number;
            let link = Some(NavigationLink { slide_number: n });
            let thumb = EmuRect {
                x: points_to_emu(item.x),
                y: points_to_emu(item.y),
                cx: points_to_emu(item.width),
                cy: points_to_emu(item.height),
            };

            builder.add_shape(Shape {
                id: ShapeKind::Frame.shape_id(i),
                kind: ShapeKind::Frame,
                name: ShapeKind::Frame.name(n),
                geometry: thumb,
                content: ShapeContent::Outline {
                    color: FRAME_OUTLINE_COLOR.to_string(),
                },
                link: None,
            })?;

            let image = rasters.export(n, self.export_width, self.export_height)?;
            builder.add_shape(Shape {
                id: ShapeKind::Picture.shape_id(i),
                kind: ShapeKind::Picture,
                name: ShapeKind::Picture.name(n),
                geometry: thumb,
                content: ShapeContent::Image(image),
                link,
            })?;

            builder.add_shape(Shape {
                id: ShapeKind::Caption.shape_id(i),
                kind: ShapeKind::Caption,
                name: ShapeKind::Caption.name(n),
                geometry: EmuRect {
                    y: thumb.y + thumb.cy,
                    cy: CAPTION_SHAPE_HEIGHT_EMU,
                    ..thumb
                },
                content: ShapeContent::Text {
                    text: item.caption.clone(),
                    language: self.caption_language.clone(),
                },
                link,
            })?;
        }

        builder.save()?;
        Ok(items)
    }
}

/// First of `<stem>_TOC.<ext>`, `<stem>_TOC(2).<ext>`, ... next to `source`
/// that does not exist yet. Nothing is created.
pub fn next_output_path(source: &Path) -> PathBuf {
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|i| {
            let suffix = if i == 1 { "_TOC".to_string() } else { format!("_TOC({})", i) };
            dir.join(format!("{}{}{}", stem, suffix, extension))
        })
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(format!("{}_TOC{}", stem, extension)))
}
