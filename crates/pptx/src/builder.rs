//! Slide construction seam and its PPTX implementation.
//!
//! The assembler describes the table-of-contents slide as a sequence of
//! [`Shape`]s handed to a [`SlideBuilder`]; [`PptxSlideBuilder`] turns them
//! into PresentationML inside an in-memory [`Package`].

use crate::constants::{content_type, namespace, relationship_type, SLIDE_JUMP_ACTION};
use crate::package::{relative_target, Package};
use crate::presentation::{add_section_slide_id, add_slide_id, PresentationInfo};
use quick_xml::escape::escape;
use std::path::{Path, PathBuf};
use toc_core::{Canvas, Error, Result};

/// The three shapes emitted per table-of-contents entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Outline drawn around the thumbnail.
    Frame,
    /// The thumbnail image.
    Picture,
    /// Text under the thumbnail.
    Caption,
}

impl ShapeKind {
    /// First shape ID of this kind.
    pub fn id_base(self) -> u32 {
        match self {
            ShapeKind::Picture => 2000,
            ShapeKind::Frame => 3000,
            ShapeKind::Caption => 4000,
        }
    }

    /// Shape ID for the entry at 0-based `index`.
    pub fn shape_id(self, index: usize) -> u32 {
        self.id_base() + index as u32
    }

    /// Display name for the shape that belongs to `slide_number`.
    pub fn name(self, slide_number: usize) -> String {
        match self {
            ShapeKind::Frame => format!("Frame {}", slide_number),
            ShapeKind::Picture => format!("Slide {}", slide_number),
            ShapeKind::Caption => format!("Caption {}", slide_number),
        }
    }
}

/// A rectangle in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuRect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// What a shape shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeContent {
    /// An unfilled rectangle with a solid outline (hex RGB).
    Outline { color: String },
    /// Encoded PNG or JPEG bytes, stretched over the shape.
    Image(Vec<u8>),
    /// A single text run.
    Text { text: String, language: String },
}

/// Click action that jumps to a slide of the same deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationLink {
    /// 1-based target slide number.
    pub slide_number: usize,
}

/// One shape on the generated slide.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: u32,
    pub kind: ShapeKind,
    pub name: String,
    pub geometry: EmuRect,
    pub content: ShapeContent,
    pub link: Option<NavigationLink>,
}

/// Builds one new slide in a presentation.
pub trait SlideBuilder {
    /// Slide size in points.
    fn canvas(&self) -> Canvas;

    /// Start a new slide that uses the layout of the slide at
    /// 0-based `background_index`.
    fn new_slide_from(&mut self, background_index: usize) -> Result<()>;

    /// Append a shape to the slide started by [`SlideBuilder::new_slide_from`].
    fn add_shape(&mut self, shape: Shape) -> Result<()>;

    /// Register the new slide last in the presentation and write the result.
    fn save(&mut self) -> Result<()>;
}

/// The slide under construction.
struct PendingSlide {
    partname: String,
    shapes: String,
    /// Relationship IDs to target slides, keyed by slide number.
    links: Vec<(usize, String)>,
}

/// [`SlideBuilder`] over a PPTX package held in memory.
pub struct PptxSlideBuilder {
    package: Package,
    info: PresentationInfo,
    output: PathBuf,
    pending: Option<PendingSlide>,
}

impl PptxSlideBuilder {
    /// Load the presentation at `path`; [`SlideBuilder::save`] writes back
    /// to the same path.
    pub fn open(path: &Path) -> Result<Self> {
        let package = Package::open(path)?;
        Self::from_package(package, path)
    }

    /// Build on an already loaded package, saving to `output`.
    pub fn from_package(package: Package, output: &Path) -> Result<Self> {
        let info = PresentationInfo::read(&package)?;
        Ok(Self {
            package,
            info,
            output: output.to_path_buf(),
            pending: None,
        })
    }

    /// The package as modified so far.
    pub fn package(&self) -> &Package {
        &self.package
    }

    fn pending_mut(&mut self) -> Result<&mut PendingSlide> {
        self.pending
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("no slide has been started".to_string()))
    }

    fn free_partname(&self, prefix: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("{}{}.{}", prefix, n, extension))
            .find(|name| !self.package.contains(name))
            .unwrap_or_default()
    }

    /// Relationship from the new slide to `slide_number`, created once.
    fn link_relationship(&mut self, slide_number: usize) -> Result<String> {
        let pending = self.pending_mut()?;
        if let Some((_, rel_id)) = pending.links.iter().find(|(n, _)| *n == slide_number) {
            return Ok(rel_id.clone());
        }
        let source = pending.partname.clone();

        let target = self
            .info
            .slide(slide_number)
            .map(|slide| slide.partname.clone())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "link target slide {} out of range (deck has {} slides)",
                    slide_number,
                    self.info.slide_count()
                ))
            })?;

        let rel_id = self.package.add_relationship(
            &source,
            relationship_type::SLIDE,
            &relative_target(&source, &target),
        )?;
        self.pending_mut()?.links.push((slide_number, rel_id.clone()));
        Ok(rel_id)
    }

    /// Store image bytes as a new media part and relate it to the slide.
    fn embed_image(&mut self, data: &[u8]) -> Result<String> {
        let (extension, mime) = image_format(data)?;
        let source = self.pending_mut()?.partname.clone();

        let media = self.free_partname("ppt/media/toc_image", extension);
        self.package.set_part(&media, data.to_vec());
        self.package.register_default(extension, mime)?;
        self.package
            .add_relationship(&source, relationship_type::IMAGE, &relative_target(&source, &media))
    }
}

impl SlideBuilder for PptxSlideBuilder {
    fn canvas(&self) -> Canvas {
        self.info.canvas()
    }

    fn new_slide_from(&mut self, background_index: usize) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::InvalidInput("a slide is already being built".to_string()));
        }

        let layout = self.info.layout_of(&self.package, background_index)?;
        let partname = self.free_partname("ppt/slides/slide", "xml");
        self.package.add_relationship(
            &partname,
            relationship_type::SLIDE_LAYOUT,
            &relative_target(&partname, &layout),
        )?;

        log::debug!("new slide {} based on {}", partname, layout);
        self.pending = Some(PendingSlide {
            partname,
            shapes: String::new(),
            links: Vec::new(),
        });
        Ok(())
    }

    fn add_shape(&mut self, shape: Shape) -> Result<()> {
        self.pending_mut()?;

        let link = match shape.link {
            Some(link) => Some(self.link_relationship(link.slide_number)?),
            None => None,
        };

        let xml = match &shape.content {
            ShapeContent::Outline { color } => frame_xml(&shape, color),
            ShapeContent::Image(data) => {
                let embed = self.embed_image(data)?;
                picture_xml(&shape, &embed, link.as_deref())
            }
            ShapeContent::Text { text, language } => {
                caption_xml(&shape, text, language, link.as_deref())
            }
        };

        self.pending_mut()?.shapes.push_str(&xml);
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::InvalidInput("no slide has been started".to_string()))?;

        self.package
            .set_part(&pending.partname, slide_xml(&pending.shapes).into_bytes());

        let presentation = self.info.partname.clone();
        let rel_id = self.package.add_relationship(
            &presentation,
            relationship_type::SLIDE,
            &relative_target(&presentation, &pending.partname),
        )?;
        let slide_id = self.info.next_slide_id()?;
        let patched = add_slide_id(self.package.part_str(&presentation)?, slide_id, &rel_id)?;
        let patched = add_section_slide_id(&patched, slide_id)?;
        self.package.set_part(&presentation, patched.into_bytes());
        self.package
            .register_override(&pending.partname, content_type::SLIDE)?;

        self.package.save(&self.output)?;
        log::debug!("saved {} to {}", pending.partname, self.output.display());
        Ok(())
    }
}

/// File extension and content type of encoded image bytes.
fn image_format(data: &[u8]) -> Result<(&'static str, &'static str)> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Ok(("png", content_type::PNG))
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Ok(("jpeg", content_type::JPEG))
    } else {
        Err(Error::ImageError("thumbnail is neither PNG nor JPEG".to_string()))
    }
}

fn slide_xml(shapes: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}">"#,
            r#"<p:cSld><p:spTree>"#,
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
            r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
            "{shapes}",
            r#"</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        ),
        a = namespace::DRAWINGML,
        r = namespace::OFFICE_RELATIONSHIPS,
        p = namespace::PRESENTATIONML,
        shapes = shapes
    )
}

fn xfrm_xml(rect: &EmuRect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.x, rect.y, rect.cx, rect.cy
    )
}

fn hlink_xml(rel_id: Option<&str>) -> String {
    match rel_id {
        Some(id) => format!(
            r#"<a:hlinkClick r:id="{}" action="{}"/>"#,
            escape(id),
            SLIDE_JUMP_ACTION
        ),
        None => String::new(),
    }
}

fn frame_xml(shape: &Shape, color: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/>"#,
            r#"<a:ln><a:solidFill><a:srgbClr val="{color}"/></a:solidFill></a:ln></p:spPr></p:sp>"#
        ),
        id = shape.id,
        name = escape(shape.name.as_str()),
        xfrm = xfrm_xml(&shape.geometry),
        color = escape(color)
    )
}

fn picture_xml(shape: &Shape, embed: &str, link: Option<&str>) -> String {
    let name = escape(shape.name.as_str());
    let nv_pr = match link {
        Some(_) => format!(
            r#"<p:cNvPr id="{}" name="{}">{}</p:cNvPr>"#,
            shape.id,
            name,
            hlink_xml(link)
        ),
        None => format!(r#"<p:cNvPr id="{}" name="{}"/>"#, shape.id, name),
    };

    format!(
        concat!(
            r#"<p:pic><p:nvPicPr>{nv_pr}<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="{embed}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        ),
        nv_pr = nv_pr,
        embed = escape(embed),
        xfrm = xfrm_xml(&shape.geometry)
    )
}

fn caption_xml(shape: &Shape, text: &str, language: &str, link: Option<&str>) -> String {
    let run_pr = match link {
        Some(_) => format!(
            r#"<a:rPr lang="{}" dirty="0">{}</a:rPr>"#,
            escape(language),
            hlink_xml(link)
        ),
        None => format!(r#"<a:rPr lang="{}" dirty="0"/>"#, escape(language)),
    };

    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"/><a:lstStyle/>"#,
            r#"<a:p><a:pPr algn="ctr"/><a:r>{run_pr}<a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        ),
        id = shape.id,
        name = escape(shape.name.as_str()),
        xfrm = xfrm_xml(&shape.geometry),
        run_pr = run_pr,
        text = escape(text)
    )
}
