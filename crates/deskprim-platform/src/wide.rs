//! UTF-16 conversions for wide-character APIs.

/// NUL-terminated UTF-16 copy of `s`.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode up to the first NUL, or the whole buffer if there is none.
pub(crate) fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|unit| *unit == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}
