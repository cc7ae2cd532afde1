//! Single-pass FB2 parser.
//!
//! FB2 is a single XML file carrying metadata (`<description>`), hierarchical
//! body content (`<section>`), and base64-encoded images (`<binary>`).
//! One streaming pass produces a typed [`Fb2Document`]; there is no mutable
//! DOM. Hyperlink attributes using the `l:` or `xlink:` namespace prefixes
//! are rewritten to a plain `href` on the way through, so downstream code
//! only ever sees the canonical form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::error::{Error, Result};

/// Typed result of parsing one FB2 file.
#[derive(Debug, Clone, Default)]
pub struct Fb2Document {
    /// First `<book-title>` in document order, if any.
    pub title: Option<String>,
    /// First `<author>` in document order, if any.
    pub author: Option<Fb2Author>,
    /// Top-level body sections, nested sections flattened in document order.
    pub sections: Vec<Section>,
    /// Embedded images from `<binary>` elements, payload already decoded.
    pub binaries: Vec<Binary>,
    /// Normalized hrefs of every `<image>` element anywhere in the document,
    /// in document order. Used for sidecar image lookup on disk.
    pub image_hrefs: Vec<String>,
}

/// Author metadata from `<first-name>`/`<last-name>` children of `<author>`.
#[derive(Debug, Clone, Default)]
pub struct Fb2Author {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// An embedded binary image resource.
#[derive(Debug, Clone)]
pub struct Binary {
    pub id: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// One body section's direct children, in document order.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub nodes: Vec<ContentNode>,
}

/// A direct child of a section.
#[derive(Debug, Clone)]
pub enum ContentNode {
    /// An `<image>` reference, candidate for rewriting to an embedded entry.
    Image(ImageRef),
    /// Any other element, captured as serialized XML with hyperlink
    /// attributes already normalized.
    Markup(String),
}

/// Attributes of an `<image>` element, hyperlink key normalized to `href`.
#[derive(Debug, Clone, Default)]
pub struct ImageRef {
    pub attrs: Vec<(String, String)>,
}

impl ImageRef {
    pub fn href(&self) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == "href")
            .map(|(_, value)| value.as_str())
    }
}

/// Parse an FB2 document.
///
/// Tolerant of missing metadata (title, author, binaries are all optional);
/// malformed XML is an error for the whole document.
pub fn parse_fb2(xml: &str) -> Result<Fb2Document> {
    let mut reader = Reader::from_str(xml);
    let mut doc = Fb2Document::default();
    let mut saw_element = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_element = true;
                match local_name(e.name().as_ref()) {
                    b"book-title" if doc.title.is_none() => {
                        doc.title = Some(read_element_text(&mut reader)?.trim().to_string());
                    }
                    b"author" if doc.author.is_none() => {
                        doc.author = Some(parse_author(&mut reader)?);
                    }
                    b"binary" => {
                        if let Some(binary) = parse_binary(&mut reader, &e)? {
                            doc.binaries.push(binary);
                        }
                    }
                    b"section" => {
                        let section = parse_section(&mut reader, &mut doc.image_hrefs)?;
                        doc.sections.push(section);
                    }
                    b"image" => {
                        record_image_href(&e, &mut doc.image_hrefs);
                        skip_element(&mut reader)?;
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                saw_element = true;
                if local_name(e.name().as_ref()) == b"image" {
                    record_image_href(&e, &mut doc.image_hrefs);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_element {
        return Err(Error::InvalidFb2("document contains no elements".into()));
    }

    Ok(doc)
}

/// Display form of the document author.
///
/// With author metadata: first and last name joined by a space, trimmed
/// (either part may be absent). Without: derived from the filename stem as
/// the part before the first hyphen, trimmed, keeping only Cyrillic/Latin
/// letters and whitespace; "Unknown" when nothing survives.
pub fn author_display(author: Option<&Fb2Author>, filename_stem: &str) -> String {
    match author {
        Some(author) => {
            let first = author.first_name.as_deref().unwrap_or("");
            let last = author.last_name.as_deref().unwrap_or("");
            format!("{first} {last}").trim().to_string()
        }
        None => author_from_filename(filename_stem),
    }
}

fn author_from_filename(stem: &str) -> String {
    let prefix = stem.split('-').next().unwrap_or("").trim();
    let cleaned: String = prefix.chars().filter(|&c| is_author_char(c)).collect();
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned
    }
}

fn is_author_char(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_alphabetic() || matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

/// Read `<first-name>`/`<last-name>` from inside an `<author>` element,
/// consuming events through the matching end tag.
fn parse_author(reader: &mut Reader<&[u8]>) -> Result<Fb2Author> {
    let mut author = Fb2Author::default();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"first-name" if author.first_name.is_none() => {
                    author.first_name = Some(read_element_text(reader)?.trim().to_string());
                }
                b"last-name" if author.last_name.is_none() => {
                    author.last_name = Some(read_element_text(reader)?.trim().to_string());
                }
                _ => depth += 1,
            },
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => return Err(unexpected_eof()),
            _ => {}
        }
    }

    Ok(author)
}

/// Parse a `<binary>` element into a decoded image resource.
///
/// Returns `None` (not an error) for binaries without an `id`, with a
/// non-image content type, or with an undecodable payload.
fn parse_binary(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Option<Binary>> {
    let mut id = None;
    let mut content_type = None;

    for attr in start.attributes().flatten() {
        match attr.key.as_ref() {
            b"id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"content-type" => {
                content_type = Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
            _ => {}
        }
    }

    let payload = read_element_text(reader)?;

    let (Some(id), Some(media_type)) = (id, content_type) else {
        return Ok(None);
    };
    if !media_type.starts_with("image/") {
        return Ok(None);
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    match BASE64.decode(compact.as_bytes()) {
        Ok(data) => Ok(Some(Binary {
            id,
            media_type,
            data,
        })),
        Err(err) => {
            warn!(id = %id, error = %err, "skipping binary with undecodable payload");
            Ok(None)
        }
    }
}

/// Parse a `<section>`, consuming events through the matching end tag.
///
/// Direct `<image>` children become [`ContentNode::Image`]; every other
/// child element is captured verbatim as [`ContentNode::Markup`]. Nested
/// sections contribute their children in place, preserving document order.
/// Text directly inside a section (typically whitespace) is dropped.
fn parse_section(reader: &mut Reader<&[u8]>, image_hrefs: &mut Vec<String>) -> Result<Section> {
    let mut nodes = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"section" => {
                    let inner = parse_section(reader, image_hrefs)?;
                    nodes.extend(inner.nodes);
                }
                b"image" => {
                    let image = image_ref(&e, image_hrefs);
                    skip_element(reader)?;
                    nodes.push(ContentNode::Image(image));
                }
                _ => nodes.push(ContentNode::Markup(serialize_element(
                    reader,
                    &e,
                    false,
                    image_hrefs,
                )?)),
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"image" {
                    nodes.push(ContentNode::Image(image_ref(&e, image_hrefs)));
                } else {
                    nodes.push(ContentNode::Markup(serialize_element(
                        reader,
                        &e,
                        true,
                        image_hrefs,
                    )?));
                }
            }
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof()),
            _ => {}
        }
    }

    Ok(Section { nodes })
}

/// Re-serialize an element subtree as a string, normalizing hyperlink
/// attribute keys and recording any nested `<image>` hrefs along the way.
fn serialize_element(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    empty: bool,
    image_hrefs: &mut Vec<String>,
) -> Result<String> {
    let mut out = String::new();
    write_start_tag(&mut out, start, empty);
    if empty {
        return Ok(out);
    }

    let mut depth = 1usize;
    while depth > 0 {
        match reader.read_event()? {
            Event::Start(e) => {
                if local_name(e.name().as_ref()) == b"image" {
                    record_image_href(&e, image_hrefs);
                }
                write_start_tag(&mut out, &e, false);
                depth += 1;
            }
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"image" {
                    record_image_href(&e, image_hrefs);
                }
                write_start_tag(&mut out, &e, true);
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                out.push('>');
                depth -= 1;
            }
            Event::Text(t) => out.push_str(&String::from_utf8_lossy(t.as_ref())),
            Event::GeneralRef(e) => {
                out.push('&');
                out.push_str(&String::from_utf8_lossy(e.as_ref()));
                out.push(';');
            }
            Event::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(&String::from_utf8_lossy(&t));
                out.push_str("]]>");
            }
            Event::Comment(t) => {
                out.push_str("<!--");
                out.push_str(&String::from_utf8_lossy(t.as_ref()));
                out.push_str("-->");
            }
            Event::Eof => return Err(unexpected_eof()),
            _ => {}
        }
    }

    Ok(out)
}

fn write_start_tag(out: &mut String, e: &BytesStart, empty: bool) {
    out.push('<');
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    let mut seen_href = false;
    for attr in e.attributes().flatten() {
        let key = canonical_attr_key(attr.key.as_ref());
        // An element carrying both prefix variants must still end up with a
        // single canonical href.
        if key == b"href" {
            if seen_href {
                continue;
            }
            seen_href = true;
        }
        out.push(' ');
        out.push_str(&String::from_utf8_lossy(key));
        out.push_str("=\"");
        out.push_str(&String::from_utf8_lossy(&attr.value));
        out.push('"');
    }
    out.push_str(if empty { "/>" } else { ">" });
}

/// Rewrite the two known namespace-prefixed hyperlink forms to plain `href`.
fn canonical_attr_key(key: &[u8]) -> &[u8] {
    match key {
        b"l:href" | b"xlink:href" => b"href",
        other => other,
    }
}

fn image_ref(e: &BytesStart, image_hrefs: &mut Vec<String>) -> ImageRef {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(canonical_attr_key(attr.key.as_ref())).into_owned();
        if key == "href" && attrs.iter().any(|(k, _)| k == "href") {
            continue;
        }
        attrs.push((key, String::from_utf8_lossy(&attr.value).into_owned()));
    }
    let image = ImageRef { attrs };
    if let Some(href) = image.href() {
        image_hrefs.push(href.to_string());
    }
    image
}

fn record_image_href(e: &BytesStart, image_hrefs: &mut Vec<String>) {
    for attr in e.attributes().flatten() {
        if canonical_attr_key(attr.key.as_ref()) == b"href" {
            image_hrefs.push(String::from_utf8_lossy(&attr.value).into_owned());
            return;
        }
    }
}

/// Collect all text content of the current element, consuming events through
/// the matching end tag. Entity references are resolved; nested markup is
/// descended into, its text included.
fn read_element_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Text(t) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(e) => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                    text.push_str(&resolved);
                }
            }
            Event::Eof => return Err(unexpected_eof()),
            _ => {}
        }
    }

    Ok(text)
}

/// Skip the current element, consuming events through the matching end tag.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => return Err(unexpected_eof()),
            _ => {}
        }
    }
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn unexpected_eof() -> Error {
    Error::InvalidFb2("unexpected end of document".into())
}
