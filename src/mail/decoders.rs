//! Envelope decoding and short text previews.

use mailparse::ParsedMail;

use crate::fingerprint::leaf_parts;

/// Decode an envelope field, including RFC 2047 encoded words. Bytes that
/// do not form a header value are returned lossily.
pub fn decode_header_value(raw: &[u8]) -> String {
    let line = [b"X: ".as_slice(), raw, b"\r\n".as_slice()].concat();
    mailparse::parse_header(&line)
        .map(|(h, _)| h.get_value())
        .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned())
}

/// Up to `max_chars` of message text on one line. Plain text parts win over
/// HTML ones; HTML is reduced to its text.
pub fn extract_preview(raw: &[u8], max_chars: usize) -> Option<String> {
    let parsed = mailparse::parse_mail(raw).ok()?;
    let leaves = leaf_parts(&parsed);
    let text = first_body(&leaves, "text/plain")
        .or_else(|| first_body(&leaves, "text/html").map(|html| without_tags(&html)))?;

    let preview: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect();
    (!preview.is_empty()).then_some(preview)
}

fn first_body(leaves: &[&ParsedMail<'_>], mimetype: &str) -> Option<String> {
    leaves
        .iter()
        .filter(|p| p.ctype.mimetype.eq_ignore_ascii_case(mimetype))
        .find_map(|p| p.get_body().ok().filter(|b| !b.trim().is_empty()))
}

fn without_tags(html: &str) -> String {
    let mut chunks = html.split('<');
    let mut out = chunks.next().unwrap_or_default().to_string();
    for chunk in chunks {
        if let Some((_, text)) = chunk.split_once('>') {
            out.push(' ');
            out.push_str(text);
        }
    }
    out
}
