//! End-to-end assembly on a small generated deck.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use toc_core::{Error, SlideRef};
use toc_pptx::{
    load_deck, DirectoryRenderer, Package, PlaceholderRenderer, PresentationInfo, TocAssembler,
};
use zip::write::FileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slides/slide2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#;

const PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#;

const PRESENTATION_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/></Relationships>"#;

const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree/></p:cSld></p:sld>"#;

fn slide_rels(layout: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout{}.xml"/></Relationships>"#,
        layout
    )
}

/// Parts of a two-slide deck; slide 1 uses layout 1, slide 2 uses layout 2.
fn deck_parts() -> Vec<(&'static str, String)> {
    vec![
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("ppt/presentation.xml", PRESENTATION.to_string()),
        ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS.to_string()),
        ("ppt/slides/slide1.xml", SLIDE.to_string()),
        ("ppt/slides/slide2.xml", SLIDE.to_string()),
        ("ppt/slides/_rels/slide1.xml.rels", slide_rels(1)),
        ("ppt/slides/_rels/slide2.xml.rels", slide_rels(2)),
    ]
}

fn write_parts(dir: &Path, parts: Vec<(&str, String)>) -> PathBuf {
    let path = dir.join("talk.pptx");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = FileOptions::default();

    for (name, data) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn write_deck(dir: &Path) -> PathBuf {
    write_parts(dir, deck_parts())
}

fn selection(numbers: &[usize]) -> Vec<SlideRef> {
    numbers.iter().copied().map(SlideRef::new).collect()
}

#[test]
fn test_assemble_appends_linked_toc_slide() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());
    let original = std::fs::read(&source).unwrap();

    let output = TocAssembler::new()
        .with_export_size(160, 90)
        .assemble(&source, &selection(&[1, 2]), None, 20.0, 1, &PlaceholderRenderer)
        .unwrap();

    assert_eq!(output, dir.path().join("talk_TOC.pptx"));
    assert_eq!(std::fs::read(&source).unwrap(), original);

    let package = Package::open(&output).unwrap();
    let info = PresentationInfo::read(&package).unwrap();
    assert_eq!(info.slide_count(), 3);

    let toc = info.slide(3).unwrap();
    assert_eq!(toc.id, 258);
    assert_eq!(toc.partname, "ppt/slides/slide3.xml");

    // The new slide inherits the layout of the background slide (index 1).
    assert_eq!(info.layout_of(&package, 2).unwrap(), "ppt/slideLayouts/slideLayout2.xml");

    let rels = package.relationships(&toc.partname).unwrap();
    let targets: Vec<String> = rels.iter().map(|r| r.target_partname(&toc.partname)).collect();
    assert!(targets.contains(&"ppt/slides/slide1.xml".to_string()));
    assert!(targets.contains(&"ppt/slides/slide2.xml".to_string()));
    assert!(package.contains("ppt/media/toc_image1.png"));
    assert!(package.contains("ppt/media/toc_image2.png"));

    let xml = package.part_str(&toc.partname).unwrap();
    for id in ["3000", "2000", "4000", "3001", "2001", "4001"] {
        assert!(xml.contains(&format!(r#"id="{}""#, id)), "missing shape {}", id);
    }
    assert_eq!(xml.matches("ppaction://hlinksldjump").count(), 4);
    assert!(xml.contains("<a:t>Slide 2</a:t>"));

    let types = package.part_str("[Content_Types].xml").unwrap();
    assert!(types.contains(r#"PartName="/ppt/slides/slide3.xml""#));
    assert!(types.contains(r#"Extension="png""#));

    // A second run takes the next free name.
    let second = TocAssembler::new()
        .with_export_size(160, 90)
        .assemble(&source, &selection(&[2]), Some(1), 10.0, 0, &PlaceholderRenderer)
        .unwrap();
    assert_eq!(second, dir.path().join("talk_TOC(2).pptx"));
}

#[test]
fn test_background_out_of_range_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());

    let result = TocAssembler::new().assemble(
        &source,
        &selection(&[1]),
        None,
        20.0,
        2,
        &PlaceholderRenderer,
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!dir.path().join("talk_TOC.pptx").exists());
}

#[test]
fn test_selected_slide_out_of_range_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());

    let result = TocAssembler::new().assemble(
        &source,
        &selection(&[1, 3]),
        None,
        20.0,
        0,
        &PlaceholderRenderer,
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!dir.path().join("talk_TOC.pptx").exists());
}

#[test]
fn test_missing_renders_fall_back_to_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());
    let empty = tempfile::tempdir().unwrap();

    let renderer = DirectoryRenderer::new(empty.path());

    let output = TocAssembler::new()
        .with_export_size(160, 90)
        .assemble(&source, &selection(&[2]), None, 20.0, 0, &renderer)
        .unwrap();

    let package = Package::open(&output).unwrap();
    let image = package.part("ppt/media/toc_image1.png").unwrap();
    assert!(image.starts_with(b"\x89PNG"));
}

#[test]
fn test_scratch_dir_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());
    let scratch = tempfile::tempdir().unwrap();

    TocAssembler::new()
        .with_export_size(160, 90)
        .with_scratch_dir(scratch.path())
        .assemble(&source, &selection(&[1, 2]), None, 20.0, 0, &PlaceholderRenderer)
        .unwrap();

    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_scratch_dir_removed_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut parts = deck_parts();
    parts.retain(|(name, _)| *name != "ppt/slides/_rels/slide2.xml.rels");
    let source = write_parts(dir.path(), parts);
    let scratch = tempfile::tempdir().unwrap();

    // Slide 2 has no layout, which only surfaces once the rasters exist.
    let result = TocAssembler::new()
        .with_export_size(160, 90)
        .with_scratch_dir(scratch.path())
        .assemble(&source, &selection(&[1, 2]), None, 20.0, 1, &PlaceholderRenderer);

    assert!(matches!(result, Err(Error::CorruptedFile(_))));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_assemble_sectioned_deck() {
    let dir = tempfile::tempdir().unwrap();
    let presentation = PRESENTATION.replace(
        "</p:presentation>",
        concat!(
            r#"<p:extLst><p:ext uri="{521415D9-36F7-43E2-AB2F-B90AF26B5E84}">"#,
            r#"<p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main">"#,
            r#"<p14:section name="Intro" id="{11111111-0000-0000-0000-000000000001}">"#,
            r#"<p14:sldIdLst><p14:sldId id="256"/></p14:sldIdLst></p14:section>"#,
            r#"<p14:section name="Main" id="{11111111-0000-0000-0000-000000000002}">"#,
            r#"<p14:sldIdLst><p14:sldId id="257"/></p14:sldIdLst></p14:section>"#,
            r#"</p14:sectionLst></p:ext></p:extLst></p:presentation>"#,
        ),
    );
    let mut parts = deck_parts();
    parts[2].1 = presentation;
    let source = write_parts(dir.path(), parts);

    let deck = load_deck(&source, &PlaceholderRenderer).unwrap();
    assert_eq!(deck.slides.len(), 2);

    let output = TocAssembler::new()
        .with_export_size(160, 90)
        .assemble(&source, &selection(&[1, 2]), None, 20.0, 0, &PlaceholderRenderer)
        .unwrap();

    let package = Package::open(&output).unwrap();
    let info = PresentationInfo::read(&package).unwrap();
    assert_eq!(info.slide_count(), 3);
    assert_eq!(info.slide(3).unwrap().id, 258);

    let xml = package.part_str("ppt/presentation.xml").unwrap();
    assert!(xml.contains(
        r#"<p14:sldIdLst><p14:sldId id="257"/><p14:sldId id="258"/></p14:sldIdLst>"#
    ));
    assert_eq!(xml.matches(r#"<p14:sldId id="258"/>"#).count(), 1);
}

#[test]
fn test_load_deck() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_deck(dir.path());

    let deck = load_deck(&source, &PlaceholderRenderer).unwrap();
    assert_eq!(deck.slides.len(), 2);
    assert!(deck.slides.iter().all(|s| s.selected && s.thumbnail.is_some()));
    assert_eq!(deck.background_index(), 0);

    let thumb = deck.slides[0].thumbnail.as_ref().unwrap();
    let img = image::load_from_memory(thumb.bytes()).unwrap();
    assert_eq!((img.width(), img.height()), (640, 360));
}
