//! Relationship types, content types and namespaces used by PPTX packages.

/// Relationship type URIs.
pub mod relationship_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// Content type strings.
pub mod content_type {
    pub const SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
}

/// XML namespace URIs.
pub mod namespace {
    pub const PACKAGE_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const OFFICE_RELATIONSHIPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const DRAWINGML: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
    pub const PRESENTATIONML: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
}

/// Partname of the content types stream.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Fallback partname of the main presentation part.
pub const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Click action that jumps to a slide inside the same deck.
pub const SLIDE_JUMP_ACTION: &str = "ppaction://hlinksldjump";
