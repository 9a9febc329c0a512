//! In-memory OPC package: the named parts of a ZIP container plus the
//! relationship and content-type bookkeeping needed to add new parts.

use crate::constants::{namespace, CONTENT_TYPES_PART};
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use toc_core::{Error, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A relationship from one part to another (or to an external target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID, e.g. "rId2".
    pub id: String,
    /// Relationship type URI.
    pub rel_type: String,
    /// Target reference, relative to the source part.
    pub target: String,
    /// Whether the target lives outside the package.
    pub external: bool,
}

impl Relationship {
    /// Absolute partname of the target, resolved against `source`.
    pub fn target_partname(&self, source: &str) -> String {
        resolve_target(source, &self.target)
    }
}

/// All parts of a package, kept in their original archive order.
#[derive(Debug, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Read every part of the package at `path` into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read every part of a package from a reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", index, e)))?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;
            parts.push((name, data));
        }

        log::debug!("opened package with {} parts", parts.len());
        Ok(Self { parts })
    }

    /// Whether a part with this name exists.
    pub fn contains(&self, partname: &str) -> bool {
        self.parts.iter().any(|(name, _)| name == partname)
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    /// Raw bytes of a part.
    pub fn part(&self, partname: &str) -> Result<&[u8]> {
        self.parts
            .iter()
            .find(|(name, _)| name == partname)
            .map(|(_, data)| data.as_slice())
            .ok_or_else(|| {
                Error::CorruptedFile(format!("Part not found in package: '{}'", partname))
            })
    }

    /// A part decoded as UTF-8 text.
    pub fn part_str(&self, partname: &str) -> Result<&str> {
        let bytes = self.part(partname)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::XmlError(format!("'{}' is not valid UTF-8: {}", partname, e)))?;
        Ok(text.trim_start_matches('\u{feff}'))
    }

    /// Replace a part, or append it when it does not exist yet.
    pub fn set_part(&mut self, partname: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(name, _)| name == partname) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((partname.to_string(), data)),
        }
    }

    /// Relationships whose source is `partname`. A missing `.rels` part
    /// means no relationships.
    pub fn relationships(&self, partname: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_partname(partname);
        if !self.contains(&rels_name) {
            return Ok(Vec::new());
        }
        parse_relationships(self.part_str(&rels_name)?)
    }

    /// Add an internal relationship from `source` and return its new ID.
    pub fn add_relationship(
        &mut self,
        source: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<String> {
        let rels_name = rels_partname(source);
        let existing = self.relationships(source)?;
        let id = next_relationship_id(&existing);

        let xml = if self.contains(&rels_name) {
            append_child(self.part_str(&rels_name)?, "Relationships", |prefix| {
                let mut rel = BytesStart::new(format!("{}Relationship", prefix));
                rel.push_attribute(("Id", id.as_str()));
                rel.push_attribute(("Type", rel_type));
                rel.push_attribute(("Target", target));
                rel
            })?
        } else {
            relationships_xml(&[Relationship {
                id: id.clone(),
                rel_type: rel_type.to_string(),
                target: target.to_string(),
                external: false,
            }])
        };

        self.set_part(&rels_name, xml.into_bytes());
        Ok(id)
    }

    /// Declare the content type of a single part.
    pub fn register_override(&mut self, partname: &str, content_type: &str) -> Result<()> {
        let part_name = format!("/{}", partname.trim_start_matches('/'));
        let xml = append_child(self.part_str(CONTENT_TYPES_PART)?, "Types", |prefix| {
            let mut item = BytesStart::new(format!("{}Override", prefix));
            item.push_attribute(("PartName", part_name.as_str()));
            item.push_attribute(("ContentType", content_type));
            item
        })?;
        self.set_part(CONTENT_TYPES_PART, xml.into_bytes());
        Ok(())
    }

    /// Declare a content type for every part with `extension`, unless one
    /// is already declared.
    pub fn register_default(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let content_types = self.part_str(CONTENT_TYPES_PART)?;
        if default_extensions(content_types)?
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
        {
            return Ok(());
        }

        let xml = append_child(content_types, "Types", |prefix| {
            let mut item = BytesStart::new(format!("{}Default", prefix));
            item.push_attribute(("Extension", extension));
            item.push_attribute(("ContentType", content_type));
            item
        })?;
        self.set_part(CONTENT_TYPES_PART, xml.into_bytes());
        Ok(())
    }

    /// Write the package to `path` as a ZIP archive.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the package as a ZIP archive to any seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
            zip.write_all(data)?;
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        Ok(())
    }
}

/// Partname of the `.rels` part that holds relationships for `partname`.
///
/// The package itself (empty partname) maps to `_rels/.rels`.
pub fn rels_partname(partname: &str) -> String {
    let partname = partname.trim_start_matches('/');
    match partname.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", partname),
    }
}

/// Resolve a relationship target against the partname of its source.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_segments(absolute.split('/'));
    }

    let base = source
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize_segments(base.split('/').chain(target.split('/')))
}

/// Relative reference from `source` to the part `target`.
pub fn relative_target(source: &str, target: &str) -> String {
    let source_dirs: Vec<&str> = source.trim_start_matches('/').split('/').collect();
    let source_dirs = &source_dirs[..source_dirs.len().saturating_sub(1)];
    let target_segments: Vec<&str> = target.trim_start_matches('/').split('/').collect();

    let common = source_dirs
        .iter()
        .zip(&target_segments)
        .take_while(|(a, b)| a == b)
        .count()
        .min(target_segments.len().saturating_sub(1));

    let mut parts: Vec<&str> = vec![".."; source_dirs.len() - common];
    parts.extend_from_slice(&target_segments[common..]);
    parts.join("/")
}

fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

/// Parse a `.rels` part.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };

                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }

                if rel.id.is_empty() {
                    return Err(Error::CorruptedFile(
                        "Relationship without an Id attribute".to_string(),
                    ));
                }
                relationships.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(relationships)
}

/// Serialize relationships as a complete `.rels` document.
pub fn relationships_xml(relationships: &[Relationship]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<Relationships xmlns="{}">"#,
        namespace::PACKAGE_RELATIONSHIPS
    ));
    for rel in relationships {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
            escape(rel.id.as_str()),
            escape(rel.rel_type.as_str()),
            escape(rel.target.as_str()),
            if rel.external { r#" TargetMode="External""# } else { "" }
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// First unused "rIdN" after the highest numbered existing ID.
pub fn next_relationship_id(existing: &[Relationship]) -> String {
    let mut next = existing
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;

    loop {
        let candidate = format!("rId{}", next);
        if !existing.iter().any(|rel| rel.id == candidate) {
            return candidate;
        }
        next += 1;
    }
}

/// Extensions that already have a `Default` content type.
fn default_extensions(content_types: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content_types);
    reader.trim_text(true);
    let mut extensions = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Default" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"Extension" {
                        extensions.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing content types: {}", e)));
            }
            _ => {}
        }
    }

    Ok(extensions)
}

/// Copy `xml` through unchanged, inserting one child element as the last
/// child of the first element whose local name is `parent`.
///
/// `build` receives the parent's namespace prefix (e.g. "p:") so the child
/// can use the same one.
pub(crate) fn append_child<F>(xml: &str, parent: &str, build: F) -> Result<String>
where
    F: FnOnce(&str) -> BytesStart<'static>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut build = Some(build);
    let mut prefix = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error reading <{}>: {}", parent, e)))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) if local_name(e.name().as_ref()) == parent.as_bytes() => {
                prefix = element_prefix(e.name().as_ref());
                write_event(&mut writer, &event)?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == parent.as_bytes() => {
                if let Some(build) = build.take() {
                    write_event(&mut writer, &Event::Empty(build(&prefix)))?;
                }
                write_event(&mut writer, &event)?;
            }
            Event::Empty(ref e)
                if build.is_some() && local_name(e.name().as_ref()) == parent.as_bytes() =>
            {
                let prefix = element_prefix(e.name().as_ref());
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                write_event(&mut writer, &Event::Start(e.clone()))?;
                if let Some(build) = build.take() {
                    write_event(&mut writer, &Event::Empty(build(&prefix)))?;
                }
                write_event(&mut writer, &Event::End(BytesEnd::new(name)))?;
            }
            other => write_event(&mut writer, &other)?,
        }
    }

    if build.is_some() {
        return Err(Error::CorruptedFile(format!("Missing <{}> element", parent)));
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::XmlError(format!("Rewritten XML is not UTF-8: {}", e)))
}

pub(crate) fn write_event<W: Write>(writer: &mut Writer<W>, event: &Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::XmlError(format!("Error writing XML: {}", e)))
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Namespace prefix of an element name including the colon, or "".
pub(crate) fn element_prefix(name: &[u8]) -> String {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => String::from_utf8_lossy(&name[..=pos]).to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::relationship_type;

    const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="PNG" ContentType="image/png"/></Types>"#;

    fn package_with(parts: &[(&str, &str)]) -> Package {
        let mut package = Package::default();
        for (name, data) in parts {
            package.set_part(name, data.as_bytes().to_vec());
        }
        package
    }

    #[test]
    fn test_rels_partname() {
        assert_eq!(rels_partname("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_partname("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels_partname(""), "_rels/.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide3.xml"),
            "ppt/slides/slide3.xml"
        );
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(
            resolve_target("ppt/presentation.xml", "/ppt/slides/slide1.xml"),
            "ppt/slides/slide1.xml"
        );
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("ppt/slides/slide9.xml", "ppt/slideLayouts/slideLayout1.xml"),
            "../slideLayouts/slideLayout1.xml"
        );
        assert_eq!(relative_target("ppt/slides/slide9.xml", "ppt/slides/slide2.xml"), "slide2.xml");
        assert_eq!(
            relative_target("ppt/presentation.xml", "ppt/slides/slide9.xml"),
            "slides/slide9.xml"
        );
        assert_eq!(
            relative_target("ppt/slides/slide9.xml", "ppt/media/image1.png"),
            "../media/image1.png"
        );
    }

    #[test]
    fn test_parse_relationships() {
        let rels = parse_relationships(SLIDE_RELS).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].id, "rId1");
        assert_eq!(rels[0].rel_type, relationship_type::SLIDE_LAYOUT);
        assert_eq!(
            rels[0].target_partname("ppt/slides/slide1.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert!(!rels[0].external);
        assert!(rels[1].external);
    }

    #[test]
    fn test_next_relationship_id_skips_gaps() {
        let rels = parse_relationships(SLIDE_RELS).unwrap();
        assert_eq!(next_relationship_id(&rels), "rId4");
        assert_eq!(next_relationship_id(&[]), "rId1");
    }

    #[test]
    fn test_add_relationship_to_existing_rels() {
        let mut package = package_with(&[("ppt/slides/_rels/slide1.xml.rels", SLIDE_RELS)]);
        let id = package
            .add_relationship("ppt/slides/slide1.xml", relationship_type::SLIDE, "slide2.xml")
            .unwrap();
        assert_eq!(id, "rId4");

        let rels = package.relationships("ppt/slides/slide1.xml").unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[2].id, "rId4");
        assert_eq!(rels[2].target, "slide2.xml");
        // Untouched relationships survive the rewrite.
        assert_eq!(rels[1].target, "https://example.com");
    }

    #[test]
    fn test_add_relationship_creates_rels_part() {
        let mut package = Package::default();
        let id = package
            .add_relationship("ppt/slides/slide5.xml", relationship_type::IMAGE, "../media/a.png")
            .unwrap();
        assert_eq!(id, "rId1");
        assert!(package.contains("ppt/slides/_rels/slide5.xml.rels"));
        let rels = package.relationships("ppt/slides/slide5.xml").unwrap();
        assert_eq!(rels[0].rel_type, relationship_type::IMAGE);
    }

    #[test]
    fn test_register_content_types() {
        let mut package = package_with(&[(CONTENT_TYPES_PART, CONTENT_TYPES)]);
        package.register_default("png", "image/png").unwrap();
        package.register_default("jpeg", "image/jpeg").unwrap();
        package
            .register_override("ppt/slides/slide3.xml", crate::constants::content_type::SLIDE)
            .unwrap();

        let xml = package.part_str(CONTENT_TYPES_PART).unwrap();
        assert_eq!(xml.matches("Extension=\"PNG\"").count(), 1);
        assert!(!xml.contains("Extension=\"png\""));
        assert!(xml.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#));
        assert!(xml.contains(r#"PartName="/ppt/slides/slide3.xml""#));
        assert!(xml.ends_with("</Types>"));
    }

    #[test]
    fn test_append_child_expands_empty_parent() {
        let xml = r#"<p:presentation xmlns:p="urn:p"><p:sldIdLst/></p:presentation>"#;
        let out = append_child(xml, "sldIdLst", |prefix| {
            let mut e = BytesStart::new(format!("{}sldId", prefix));
            e.push_attribute(("id", "256"));
            e
        })
        .unwrap();
        assert_eq!(
            out,
            r#"<p:presentation xmlns:p="urn:p"><p:sldIdLst><p:sldId id="256"/></p:sldIdLst></p:presentation>"#
        );
    }

    #[test]
    fn test_append_child_missing_parent() {
        let result = append_child("<root/>", "sldIdLst", |_| BytesStart::new("x"));
        assert!(matches!(result, Err(Error::CorruptedFile(_))));
    }

    #[test]
    fn test_zip_round_trip_keeps_order() {
        let package = package_with(&[
            (CONTENT_TYPES_PART, CONTENT_TYPES),
            ("ppt/slides/_rels/slide1.xml.rels", SLIDE_RELS),
            ("docProps/app.xml", "<Properties/>"),
        ]);
        let mut buffer = Cursor::new(Vec::new());
        package.write_to(&mut buffer).unwrap();

        buffer.set_position(0);
        let reopened = Package::from_reader(buffer).unwrap();
        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(
            names,
            vec![CONTENT_TYPES_PART, "ppt/slides/_rels/slide1.xml.rels", "docProps/app.xml"]
        );
        assert_eq!(reopened.part_str("docProps/app.xml").unwrap(), "<Properties/>");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
