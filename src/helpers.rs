//! Hex string helpers shared by the catalog, encoder and decoder.
//!
//! Identifiers travel through the crate as lowercase hex strings, the same way they
//! are written in catalog files and reported in responses.

/// Returns true if the string is non-empty and only contains hex digits
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Lowercases a hex identifier
pub fn normalize_hex(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Encodes bytes as a lowercase hex string
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Formats a single byte as a two character lowercase hex string
pub fn byte_hex(b: u8) -> String {
    format!("{b:02x}")
}

/// Parses a two character hex string into a byte
pub fn parse_byte(s: &str) -> Option<u8> {
    if s.len() != 2 {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}

/// Left pads a hex value with zeros to `width` characters.
///
/// Leading zeros of the value are stripped first, so `None` is only returned if
/// the significant digits do not fit into `width`
pub fn pad_hex(value: &str, width: usize) -> Option<String> {
    let significant = value.trim_start_matches('0');
    if significant.len() > width {
        return None;
    }
    Some(format!("{significant:0>width$}"))
}
