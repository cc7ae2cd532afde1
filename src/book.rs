use std::collections::BTreeMap;

/// In-memory representation of an assembled EPUB.
///
/// Built fresh for every conversion and discarded once written. Resources are
/// keyed by package-internal href; a `BTreeMap` keeps manifest and archive
/// entry order stable so repeated conversions of the same source produce
/// byte-identical output.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    /// Serialized XHTML content document (the book body).
    pub content: String,
    pub toc: Vec<TocEntry>,
    pub resources: BTreeMap<String, Resource>,
}

/// Package metadata.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
}

/// A table of contents entry in the navigation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
}

/// An embedded resource (image) with its declared media type.
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource under a package-internal href. An existing entry at the
    /// same href is replaced.
    pub fn add_resource(
        &mut self,
        href: impl Into<String>,
        data: Vec<u8>,
        media_type: impl Into<String>,
    ) {
        self.resources.insert(
            href.into(),
            Resource {
                data,
                media_type: media_type.into(),
            },
        );
    }

    pub fn get_resource(&self, href: &str) -> Option<&Resource> {
        self.resources.get(href)
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}
