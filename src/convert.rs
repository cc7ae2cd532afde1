//! The FB2 → EPUB conversion routine.
//!
//! One call converts one file: parse the source, extract metadata and body
//! content, embed images, assemble the package, write it out. Nothing is
//! shared between conversions.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

use tracing::debug;

use crate::book::{Book, Metadata, TocEntry};
use crate::epub::{self, CONTENT_DOCUMENT};
use crate::error::Result;
use crate::fb2::{self, ContentNode, Fb2Document, ImageRef};
use crate::util;

/// Fixed output language; the tool targets Russian-language libraries.
pub const DEFAULT_LANGUAGE: &str = "ru";

const UNTITLED: &str = "Untitled";

/// Convert a single FB2 file into an EPUB at `epub_path`.
///
/// The destination's parent directory must already exist. Any failure
/// (unreadable source, malformed XML, unwritable destination) aborts this
/// file only; callers decide whether to continue with other files.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(fb2_path: P, epub_path: Q) -> Result<()> {
    let fb2_path = fb2_path.as_ref();
    let bytes = fs::read(fb2_path)?;
    let encoding = util::extract_xml_encoding(&bytes).map(str::to_owned);
    let xml = util::decode_text(&bytes, encoding.as_deref());
    let doc = fb2::parse_fb2(&xml)?;

    let stem = fb2_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut book = build_book(&doc, &stem);
    attach_sidecar_images(&mut book, &doc, fb2_path)?;
    epub::write_epub(&book, epub_path)
}

/// Assemble the output [`Book`] from a parsed document.
///
/// `filename_stem` feeds the author fallback when the document carries no
/// author metadata.
pub fn build_book(doc: &Fb2Document, filename_stem: &str) -> Book {
    let title = doc.title.clone().unwrap_or_else(|| UNTITLED.to_string());
    let author = fb2::author_display(doc.author.as_ref(), filename_stem);

    let mut book = Book::new();
    book.metadata = Metadata::new(&title)
        .with_author(author)
        .with_language(DEFAULT_LANGUAGE);
    book.content = render_content(&title, doc);
    book.toc.push(TocEntry::new(&title, CONTENT_DOCUMENT));

    for binary in &doc.binaries {
        // The .jpg extension is fixed regardless of the declared media type.
        // Historical behavior, kept; see DESIGN.md.
        book.add_resource(
            embedded_image_path(&binary.id),
            binary.data.clone(),
            &binary.media_type,
        );
    }

    book
}

fn embedded_image_path(id: &str) -> String {
    format!("images/{id}.jpg")
}

/// Render the content document: every section's children concatenated in
/// document order, image references rewritten where they resolve, wrapped in
/// the fixed XHTML shell.
fn render_content(title: &str, doc: &Fb2Document) -> String {
    let known: HashSet<&str> = doc.binaries.iter().map(|b| b.id.as_str()).collect();

    let mut body = String::new();
    for section in &doc.sections {
        for node in &section.nodes {
            match node {
                ContentNode::Markup(markup) => body.push_str(markup),
                ContentNode::Image(image) => render_image(&mut body, image, &known),
            }
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n\
         <head><title>{}</title></head>\n\
         <body>{}</body>\n\
         </html>\n",
        util::escape_xml(title),
        body
    )
}

/// Rewrite an image reference whose target resolves to an embedded resource
/// into an `<img>` pointing at the package path. Unresolved references are
/// re-emitted untouched: a dangling link in the output, never a failure.
fn render_image(out: &mut String, image: &ImageRef, known: &HashSet<&str>) {
    let resolved = image
        .href()
        .map(|href| href.trim_start_matches('#'))
        .filter(|id| known.contains(id));

    match resolved {
        Some(id) => {
            out.push_str("<img src=\"");
            out.push_str(&embedded_image_path(id));
            out.push('"');
            for (key, value) in &image.attrs {
                if key != "href" {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
            }
            out.push_str("/>");
        }
        None => {
            if let Some(href) = image.href() {
                debug!(href = %href, "image reference does not resolve, passing through");
            }
            out.push_str("<image");
            for (key, value) in &image.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            out.push_str("/>");
        }
    }
}

/// Pull in images referenced by relative path next to the source file.
///
/// This is a second, independent image-inclusion path alongside the embedded
/// `<binary>` resources, and the two are deliberately not merged: entries
/// land under the original relative href, not under `images/`. Hrefs that
/// point outside the source directory or at nothing on disk are skipped;
/// a file that exists but cannot be read fails the conversion.
fn attach_sidecar_images(book: &mut Book, doc: &Fb2Document, fb2_path: &Path) -> Result<()> {
    let Some(dir) = fb2_path.parent() else {
        return Ok(());
    };

    for href in &doc.image_hrefs {
        if href.starts_with('#') || book.get_resource(href).is_some() {
            continue;
        }
        let relative = Path::new(href);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            continue;
        }

        let candidate = dir.join(relative);
        if !candidate.is_file() {
            continue;
        }

        let data = fs::read(&candidate)?;
        let media_type = util::detect_mime_type(href, &data).unwrap_or("application/octet-stream");
        book.add_resource(href.clone(), data, media_type);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fb2::parse_fb2;

    fn doc(body: &str) -> Fb2Document {
        let xml = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns:l="http://www.w3.org/1999/xlink">{body}</FictionBook>"#
        );
        parse_fb2(&xml).unwrap()
    }

    #[test]
    fn test_minimal_document() {
        let parsed = doc(
            "<description><title-info>\
             <book-title>Test</book-title>\
             <author><first-name>A</first-name><last-name>B</last-name></author>\
             </title-info></description>",
        );
        let book = build_book(&parsed, "stem");
        assert_eq!(book.metadata.title, "Test");
        assert_eq!(book.metadata.author, "A B");
        assert_eq!(book.metadata.language, "ru");
        assert!(book.content.contains("<title>Test</title>"));
        assert!(book.content.contains("<body></body>"));
        assert!(book.resources.is_empty());
    }

    #[test]
    fn test_untitled_fallback() {
        let parsed = doc("<body><section><p>text</p></section></body>");
        let book = build_book(&parsed, "Автор - книга");
        assert_eq!(book.metadata.title, "Untitled");
        assert_eq!(book.metadata.author, "Автор");
    }

    #[test]
    fn test_resolved_image_rewritten() {
        let parsed = doc(
            "<body><section><image l:href=\"#pic\"/></section></body>\
             <binary id=\"pic\" content-type=\"image/png\">aGVsbG8=</binary>",
        );
        let book = build_book(&parsed, "stem");
        assert!(book.content.contains("<img src=\"images/pic.jpg\"/>"));
        let resource = book.get_resource("images/pic.jpg").unwrap();
        assert_eq!(resource.media_type, "image/png");
        assert_eq!(resource.data, b"hello");
    }

    #[test]
    fn test_dangling_image_passes_through() {
        let parsed = doc("<body><section><image l:href=\"#missing\" alt=\"x\"/></section></body>");
        let book = build_book(&parsed, "stem");
        assert!(book.content.contains("<image href=\"#missing\" alt=\"x\"/>"));
        assert!(!book.content.contains("<img "));
    }

    #[test]
    fn test_rewrite_keeps_other_attributes() {
        let parsed = doc(
            "<body><section><image l:href=\"#pic\" alt=\"cover\"/></section></body>\
             <binary id=\"pic\" content-type=\"image/jpeg\">aGVsbG8=</binary>",
        );
        let book = build_book(&parsed, "stem");
        assert!(book
            .content
            .contains("<img src=\"images/pic.jpg\" alt=\"cover\"/>"));
    }

    #[test]
    fn test_title_escaped_in_content_document() {
        let parsed = doc(
            "<description><title-info><book-title>Tom &amp; Jerry</book-title></title-info></description>",
        );
        let book = build_book(&parsed, "stem");
        assert!(book.content.contains("<title>Tom &amp; Jerry</title>"));
    }

    #[test]
    fn test_body_order_spans_sections() {
        let parsed = doc(
            "<body><section><p>one</p></section><section><p>two</p></section></body>",
        );
        let book = build_book(&parsed, "stem");
        let one = book.content.find("<p>one</p>").unwrap();
        let two = book.content.find("<p>two</p>").unwrap();
        assert!(one < two);
    }
}
