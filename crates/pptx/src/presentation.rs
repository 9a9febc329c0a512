//! Reader for the main presentation part: slide list, slide size and the
//! layouts slides are built on.

use crate::constants::{namespace, relationship_type, DEFAULT_PRESENTATION_PART};
use crate::package::{append_child, element_prefix, local_name, write_event, Package};
use crate::units::emu_to_points;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;
use toc_core::{Canvas, Error, Result};

/// Smallest slide ID PowerPoint accepts.
const MIN_SLIDE_ID: u32 = 256;

/// Largest slide ID allowed by `ST_SlideId`.
const MAX_SLIDE_ID: u32 = 2_147_483_647;

/// One `p:sldId` entry, resolved to its slide part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideEntry {
    /// Numeric slide ID.
    pub id: u32,
    /// Relationship ID from the presentation part to the slide.
    pub rel_id: String,
    /// Partname of the slide, e.g. "ppt/slides/slide1.xml".
    pub partname: String,
}

/// What the assembler needs to know about a presentation.
#[derive(Debug, Clone)]
pub struct PresentationInfo {
    /// Partname of the main presentation part.
    pub partname: String,
    /// Slides in presentation order.
    pub slides: Vec<SlideEntry>,
    /// Slide size (cx, cy) in EMU, when declared.
    pub slide_size: Option<(i64, i64)>,
}

impl PresentationInfo {
    /// Read the presentation part of `package`.
    pub fn read(package: &Package) -> Result<Self> {
        let partname = package
            .relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type == relationship_type::OFFICE_DOCUMENT)
            .map(|rel| rel.target_partname(""))
            .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_string());

        let xml = package.part_str(&partname)?;
        let (ids, slide_size) = parse_presentation(xml)?;
        let rels = package.relationships(&partname)?;

        let mut slides = Vec::with_capacity(ids.len());
        for (id, rel_id) in ids {
            let rel = rels.iter().find(|rel| rel.id == rel_id).ok_or_else(|| {
                Error::CorruptedFile(format!(
                    "Slide {} refers to missing relationship '{}'",
                    id, rel_id
                ))
            })?;
            slides.push(SlideEntry {
                id,
                rel_id,
                partname: rel.target_partname(&partname),
            });
        }

        log::debug!("{} lists {} slides", partname, slides.len());
        Ok(Self {
            partname,
            slides,
            slide_size,
        })
    }

    /// Number of slides.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Slide by 1-based number.
    pub fn slide(&self, number: usize) -> Option<&SlideEntry> {
        number.checked_sub(1).and_then(|index| self.slides.get(index))
    }

    /// ID for a slide appended after all existing ones.
    pub fn next_slide_id(&self) -> Result<u32> {
        let Some(max) = self.slides.iter().map(|slide| slide.id).max() else {
            return Ok(MIN_SLIDE_ID);
        };
        max.checked_add(1)
            .filter(|id| *id <= MAX_SLIDE_ID)
            .map(|id| id.max(MIN_SLIDE_ID))
            .ok_or_else(|| {
                Error::CorruptedFile(format!(
                    "{} already uses the largest slide id ({})",
                    self.partname, max
                ))
            })
    }

    /// Partname of the slide layout used by the slide at 0-based `index`.
    pub fn layout_of(&self, package: &Package, index: usize) -> Result<String> {
        let slide = self.slides.get(index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "slide index {} out of range (deck has {} slides)",
                index,
                self.slides.len()
            ))
        })?;

        package
            .relationships(&slide.partname)?
            .into_iter()
            .find(|rel| rel.rel_type == relationship_type::SLIDE_LAYOUT)
            .map(|rel| rel.target_partname(&slide.partname))
            .ok_or_else(|| {
                Error::CorruptedFile(format!("{} has no slide layout", slide.partname))
            })
    }

    /// Slide size in points, or the default canvas when undeclared.
    pub fn canvas(&self) -> Canvas {
        match self.slide_size {
            Some((cx, cy)) if cx > 0 && cy > 0 => Canvas::new(emu_to_points(cx), emu_to_points(cy)),
            _ => {
                log::warn!("{} has no usable slide size, using default canvas", self.partname);
                Canvas::default()
            }
        }
    }
}

/// Read the declared slide size (cx, cy) in EMU of the deck at `path`.
pub fn read_slide_size(path: &Path) -> Result<(i64, i64)> {
    let package = Package::open(path)?;
    PresentationInfo::read(&package)?
        .slide_size
        .ok_or_else(|| Error::CorruptedFile(format!("{} declares no slide size", path.display())))
}

/// Slide ID list and slide size from presentation XML.
///
/// Only `sldId` entries directly under the presentation's own `sldIdLst`
/// count; section lists in `extLst` repeat the IDs without relationships.
fn parse_presentation(xml: &str) -> Result<(Vec<(u32, String)>, Option<(i64, i64)>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut ids = Vec::new();
    let mut slide_size = None;
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        let (element, opens) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, true),
            Ok(Event::Empty(e)) => (e, false),
            Ok(Event::End(_)) => {
                path.pop();
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing presentation: {}", e)));
            }
            _ => continue,
        };

        let name = local_name(element.name().as_ref()).to_vec();
        match name.as_slice() {
            b"sldId" if path.len() == 2 && path[1] == b"sldIdLst" => {
                ids.push(parse_slide_id(&element)?);
            }
            b"sldSz" if path.len() == 1 => {
                let mut cx = None;
                let mut cy = None;
                for attr in element.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).parse::<i64>().ok();
                    match attr.key.as_ref() {
                        b"cx" => cx = value,
                        b"cy" => cy = value,
                        _ => {}
                    }
                }
                if let (Some(cx), Some(cy)) = (cx, cy) {
                    slide_size = Some((cx, cy));
                }
            }
            _ => {}
        }

        if opens {
            path.push(name);
        }
    }

    Ok((ids, slide_size))
}

fn parse_slide_id(e: &BytesStart<'_>) -> Result<(u32, String)> {
    let mut id = None;
    let mut rel_id = None;

    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        let value = String::from_utf8_lossy(&attr.value).to_string();
        if key == b"id" {
            id = Some(value.parse::<u32>().map_err(|_| {
                Error::CorruptedFile(format!("Malformed slide id '{}'", value))
            })?);
        } else if local_name(key) == b"id" {
            rel_id = Some(value);
        }
    }

    match (id, rel_id) {
        (Some(id), Some(rel_id)) => Ok((id, rel_id)),
        _ => Err(Error::CorruptedFile("Incomplete p:sldId element".to_string())),
    }
}

/// Append a `p:sldId` entry to the slide ID list of presentation XML.
pub fn add_slide_id(xml: &str, id: u32, rel_id: &str) -> Result<String> {
    let r_prefix = relationships_prefix(xml)?;
    let id = id.to_string();

    append_child(xml, "sldIdLst", |prefix| {
        let mut entry = BytesStart::new(format!("{}sldId", prefix));
        entry.push_attribute(("id", id.as_str()));
        match &r_prefix {
            Some(r) => {
                let key = format!("{}:id", r);
                entry.push_attribute((key.as_str(), rel_id));
            }
            None => {
                entry.push_attribute(("xmlns:r", namespace::OFFICE_RELATIONSHIPS));
                entry.push_attribute(("r:id", rel_id));
            }
        }
        entry
    })
}

/// Append a slide ID to the last section of the presentation's section
/// list (`p14:sectionLst`). XML without sections is returned unchanged.
pub fn add_section_slide_id(xml: &str, id: u32) -> Result<String> {
    let sections = count_sections(xml)?;
    if sections == 0 {
        return Ok(xml.to_string());
    }

    let id = id.to_string();
    let entry = |prefix: &str| {
        let mut entry = BytesStart::new(format!("{}sldId", prefix));
        entry.push_attribute(("id", id.as_str()));
        entry
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut seen = 0;
    let mut in_last = false;
    let mut inserted = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error reading section list: {}", e)))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                let name = local_name(e.name().as_ref()).to_vec();
                if is_section(&path, &name) {
                    seen += 1;
                    in_last = seen == sections;
                }
                write_event(&mut writer, &event)?;
                path.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e.name().as_ref()).to_vec();
                let expand = if is_section(&path, &name) {
                    seen += 1;
                    seen == sections
                } else {
                    in_last && !inserted && name == b"sldIdLst" && parent_is(&path, b"section")
                };
                if !expand {
                    write_event(&mut writer, &event)?;
                    continue;
                }

                let qname = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let prefix = element_prefix(e.name().as_ref());
                write_event(&mut writer, &Event::Start(e.clone()))?;
                if name == b"section" {
                    write_slide_list(&mut writer, &prefix, entry(&prefix))?;
                } else {
                    write_event(&mut writer, &Event::Empty(entry(&prefix)))?;
                }
                write_event(&mut writer, &Event::End(BytesEnd::new(qname)))?;
                inserted = true;
            }
            Event::End(ref e) => {
                let name = path.pop().unwrap_or_default();
                if in_last && !inserted {
                    let prefix = element_prefix(e.name().as_ref());
                    if name == b"sldIdLst" && parent_is(&path, b"section") {
                        write_event(&mut writer, &Event::Empty(entry(&prefix)))?;
                        inserted = true;
                    } else if is_section(&path, &name) {
                        write_slide_list(&mut writer, &prefix, entry(&prefix))?;
                        inserted = true;
                    }
                }
                write_event(&mut writer, &event)?;
            }
            other => write_event(&mut writer, &other)?,
        }
    }

    if !inserted {
        return Err(Error::CorruptedFile("Unbalanced section list".to_string()));
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::XmlError(format!("Rewritten XML is not UTF-8: {}", e)))
}

fn write_slide_list(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    prefix: &str,
    entry: BytesStart<'static>,
) -> Result<()> {
    let list = format!("{}sldIdLst", prefix);
    write_event(writer, &Event::Start(BytesStart::new(list.clone())))?;
    write_event(writer, &Event::Empty(entry))?;
    write_event(writer, &Event::End(BytesEnd::new(list)))
}

/// Number of `section` elements inside a `sectionLst`.
fn count_sections(xml: &str) -> Result<usize> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut count = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref()).to_vec();
                if is_section(&path, &name) {
                    count += 1;
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if is_section(&path, local_name(e.name().as_ref())) {
                    count += 1;
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error reading section list: {}", e)));
            }
            _ => {}
        }
    }

    Ok(count)
}

fn is_section(path: &[Vec<u8>], name: &[u8]) -> bool {
    name == b"section" && parent_is(path, b"sectionLst")
}

fn parent_is(path: &[Vec<u8>], parent: &[u8]) -> bool {
    path.last().map_or(false, |name| name.as_slice() == parent)
}

/// Prefix bound to the office relationships namespace on the root element.
fn relationships_prefix(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let prefix = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    let declared = key.strip_prefix(b"xmlns:")?;
                    (&*attr.value == namespace::OFFICE_RELATIONSHIPS.as_bytes())
                        .then(|| String::from_utf8_lossy(declared).to_string())
                });
                return Ok(prefix);
            }
            Ok(Event::Eof) => {
                return Err(Error::CorruptedFile("Presentation part is empty".to_string()));
            }
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing presentation: {}", e)));
            }
            _ => {}
        }
    }
}
