use std::io::{Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::book::Book;
use crate::error::Result;
use crate::util::escape_xml;

/// Internal name of the content document inside the package.
pub const CONTENT_DOCUMENT: &str = "content.xhtml";

/// Write a [`Book`] to an EPUB file on disk.
///
/// Creates an EPUB 3 package with an OPF package document, an XHTML
/// navigation document, an NCX table of contents for older readers, and all
/// resources. Output is deterministic: the same book always serializes to
/// the same bytes.
pub fn write_epub<P: AsRef<Path>>(book: &Book, path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_epub_to_writer(book, file)
}

/// Write a [`Book`] to any [`Write`] + [`Seek`] destination.
pub fn write_epub_to_writer<W: Write + Seek>(book: &Book, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    // mimetype must be the first entry and stored uncompressed
    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", options_stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    let identifier = package_identifier(book);

    zip.start_file("OEBPS/content.opf", options_deflate)?;
    zip.write_all(generate_opf(book, &identifier).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", options_deflate)?;
    zip.write_all(generate_ncx(book, &identifier).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", options_deflate)?;
    zip.write_all(generate_nav(book).as_bytes())?;

    zip.start_file(format!("OEBPS/{CONTENT_DOCUMENT}"), options_deflate)?;
    zip.write_all(book.content.as_bytes())?;

    for (href, resource) in &book.resources {
        zip.start_file(format!("OEBPS/{href}"), options_deflate)?;
        zip.write_all(&resource.data)?;
    }

    zip.finish()?;
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

// A real modification timestamp would make re-runs produce different bytes,
// so the package carries a fixed epoch instead.
const MODIFIED: &str = "1970-01-01T00:00:00Z";

fn generate_opf(book: &Book, identifier: &str) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );

    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&book.metadata.title)
    ));

    let language = if book.metadata.language.is_empty() {
        "en"
    } else {
        &book.metadata.language
    };
    opf.push_str(&format!("    <dc:language>{}</dc:language>\n", language));

    opf.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        escape_xml(&book.metadata.author)
    ));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        MODIFIED
    ));

    opf.push_str("  </metadata>\n  <manifest>\n");

    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    opf.push_str(&format!(
        "    <item id=\"content\" href=\"{CONTENT_DOCUMENT}\" media-type=\"application/xhtml+xml\"/>\n",
    ));

    for (href, resource) in &book.resources {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
            href_to_id(href),
            escape_xml(href),
            escape_xml(&resource.media_type)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    opf.push_str("    <itemref idref=\"nav\"/>\n");
    opf.push_str("    <itemref idref=\"content\"/>\n");
    opf.push_str("  </spine>\n</package>\n");
    opf
}

fn generate_ncx(book: &Book, identifier: &str) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content=""#,
    );
    ncx.push_str(&escape_xml(identifier));
    ncx.push_str(
        r#""/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>"#,
    );
    ncx.push_str(&escape_xml(&book.metadata.title));
    ncx.push_str(
        r#"</text>
  </docTitle>
  <navMap>
"#,
    );

    for (index, entry) in book.toc.iter().enumerate() {
        let play_order = index + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{play_order}\" playOrder=\"{play_order}\">\n"
        ));
        ncx.push_str(&format!(
            "      <navLabel>\n        <text>{}</text>\n      </navLabel>\n",
            escape_xml(&entry.title)
        ));
        ncx.push_str(&format!(
            "      <content src=\"{}\"/>\n    </navPoint>\n",
            escape_xml(&entry.href)
        ));
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn generate_nav(book: &Book) -> String {
    let mut nav = String::new();

    nav.push_str(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>"#,
    );
    nav.push_str(&escape_xml(&book.metadata.title));
    nav.push_str(
        r#"</title></head>
<body>
<nav epub:type="toc" id="toc">
<ol>
"#,
    );

    for entry in &book.toc {
        nav.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_xml(&entry.href),
            escape_xml(&entry.title)
        ));
    }

    nav.push_str("</ol>\n</nav>\n</body>\n</html>\n");
    nav
}

fn href_to_id(href: &str) -> String {
    href.replace(['/', '.', ' ', '-'], "_")
}

/// Deterministic package identifier derived from the book's own content.
/// A random UUID would break byte-identical re-runs.
fn package_identifier(book: &Book) -> String {
    let mut hash = fnv1a(0xcbf2_9ce4_8422_2325, book.metadata.title.as_bytes());
    hash = fnv1a(hash, book.metadata.author.as_bytes());
    hash = fnv1a(hash, book.content.as_bytes());
    format!("urn:polka:{hash:016x}")
}

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
