//! Decoding for strings embedded in the report's script data.
//!
//! The exporter URL-encodes names and documentation (`decodeURL("...")` wrappers
//! in the page script, `+` meaning space) and the surrounding HTML may entity-escape
//! characters on top of that. Decoding happens once at the extractor boundary so the
//! builder and serializer only ever see final Unicode text.

use std::borrow::Cow;

/// Decodes a raw report string: URL percent-escapes and `+` first, HTML entities second.
pub fn decode_report_string(input: &str) -> Cow<'_, str> {
    // Fast path: nothing to decode.
    if !input.contains('%') && !input.contains('+') && !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let unquoted = unquote_plus(input);
    match htmlize::unescape(unquoted.as_str()) {
        Cow::Borrowed(_) => Cow::Owned(unquoted),
        Cow::Owned(s) => Cow::Owned(s),
    }
}

/// `urllib.parse.unquote_plus` semantics: `+` is a space, `%XX` is a byte.
///
/// Invalid escapes are kept verbatim rather than failing the whole string; the
/// report occasionally contains literal `%` in names.
fn unquote_plus(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (from_hex_byte(bytes[i + 1]), from_hex_byte(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn from_hex_byte(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
