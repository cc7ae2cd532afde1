//! Shared utilities: text decoding, XML escaping, media format detection.

use std::borrow::Cow;

/// Decode raw bytes into a string, handling common ebook encodings.
///
/// Tries UTF-8 first, then the hint encoding (e.g. from the XML declaration),
/// then falls back to Windows-1251, the dominant legacy encoding for FB2
/// files from Russian-language libraries.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
    result
}

/// Extract the encoding name from an XML declaration, if present.
///
/// Only the first ~100 bytes are checked, which is enough for any
/// well-formed `<?xml version="1.0" encoding="..."?>` prolog.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_start = 1;
    let value_end = after_enc[value_start..].iter().position(|&b| b == quote)? + value_start;

    std::str::from_utf8(&after_enc[value_start..value_end]).ok()
}

/// Escape the five XML special characters for use in text content or
/// attribute values.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Detected image format for sidecar files referenced by relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    WebP,
    Binary,
}

impl MediaFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Binary => "application/octet-stream",
        }
    }
}

/// Detect an image format from file path and/or raw bytes.
///
/// Extension-based detection first, then magic bytes.
pub fn detect_media_format(path: &str, data: &[u8]) -> MediaFormat {
    let path_lower = path.to_lowercase();

    if path_lower.ends_with(".jpg") || path_lower.ends_with(".jpeg") {
        return MediaFormat::Jpeg;
    }
    if path_lower.ends_with(".png") {
        return MediaFormat::Png;
    }
    if path_lower.ends_with(".gif") {
        return MediaFormat::Gif;
    }
    if path_lower.ends_with(".svg") {
        return MediaFormat::Svg;
    }
    if path_lower.ends_with(".webp") {
        return MediaFormat::WebP;
    }

    if data.len() >= 4 {
        // JPEG: FF D8
        if data[0] == 0xFF && data[1] == 0xD8 {
            return MediaFormat::Jpeg;
        }
        // PNG: 89 50 4E 47
        if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
            return MediaFormat::Png;
        }
        // GIF: 47 49 46
        if data[0] == 0x47 && data[1] == 0x49 && data[2] == 0x46 {
            return MediaFormat::Gif;
        }
        // WebP: RIFF....WEBP
        if data.len() >= 12
            && &data[0..4] == b"RIFF"
            && &data[8..12] == b"WEBP"
        {
            return MediaFormat::WebP;
        }
    }

    MediaFormat::Binary
}

/// Detect a MIME type from file extension or magic bytes.
///
/// Returns `None` if the format is unrecognized.
pub fn detect_mime_type(filename: &str, data: &[u8]) -> Option<&'static str> {
    match detect_media_format(filename, data) {
        MediaFormat::Binary => None,
        other => Some(other.mime_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8() {
        assert_eq!(decode_text("Война и мир".as_bytes(), None), "Война и мир");
    }

    #[test]
    fn test_decode_text_windows_1251() {
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode("Тест");
        assert_eq!(decode_text(&encoded, Some("windows-1251")), "Тест");
        // Fallback path: no hint, still decoded as 1251
        assert_eq!(decode_text(&encoded, None), "Тест");
    }

    #[test]
    fn test_extract_xml_encoding() {
        let xml = br#"<?xml version="1.0" encoding="windows-1251"?><FictionBook/>"#;
        assert_eq!(extract_xml_encoding(xml), Some("windows-1251"));
        assert_eq!(extract_xml_encoding(b"<FictionBook/>"), None);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b < c"), "a &amp; b &lt; c");
        assert_eq!(escape_xml(r#""quoted""#), "&quot;quoted&quot;");
    }

    #[test]
    fn test_detect_media_format_by_extension() {
        assert_eq!(detect_media_format("cover.jpg", &[]), MediaFormat::Jpeg);
        assert_eq!(detect_media_format("IMG.PNG", &[]), MediaFormat::Png);
        assert_eq!(detect_media_format("anim.gif", &[]), MediaFormat::Gif);
    }

    #[test]
    fn test_detect_media_format_by_magic_bytes() {
        assert_eq!(
            detect_media_format("noext", &[0xFF, 0xD8, 0xFF, 0xE0]),
            MediaFormat::Jpeg
        );
        assert_eq!(
            detect_media_format("noext", &[0x89, 0x50, 0x4E, 0x47]),
            MediaFormat::Png
        );
        assert_eq!(detect_media_format("noext", b"0000"), MediaFormat::Binary);
    }

    #[test]
    fn test_detect_mime_type() {
        assert_eq!(detect_mime_type("image.jpg", &[]), Some("image/jpeg"));
        assert_eq!(detect_mime_type("unknown", &[]), None);
    }
}
