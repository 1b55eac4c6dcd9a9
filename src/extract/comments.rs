//! Comment stripping
//!
//! Removes `//` and `/* */` comments from component source so commented-out
//! definitions are never recovered. Quoted spans are copied through verbatim.

/// Quote characters that open an opaque span.
pub(crate) const QUOTES: [u8; 3] = [b'\'', b'"', b'`'];

/// Strip line and block comments, leaving string-literal contents untouched.
///
/// Line comments are removed up to (not including) the newline. Block
/// comments collapse to a single space so adjacent tokens stay separated.
/// An unterminated block comment swallows the rest of the input.
pub fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    // Start of the pending run of bytes to copy through.
    let mut run = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if QUOTES.contains(&b) {
            i = skip_quoted(bytes, i);
            continue;
        }

        if b == b'/' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'/' => {
                    out.push_str(&source[run..i]);
                    i += 2;
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    run = i;
                    continue;
                }
                b'*' => {
                    out.push_str(&source[run..i]);
                    out.push(' ');
                    i += 2;
                    while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                        i += 1;
                    }
                    i = (i + 2).min(bytes.len());
                    run = i;
                    continue;
                }
                _ => {}
            }
        }

        i += 1;
    }

    out.push_str(&source[run..]);
    out
}

/// Skip a quoted span starting at `start` (the opening quote).
///
/// Returns the index just past the closing quote, or the input length when
/// the span is unterminated. A backslash always consumes the next byte.
pub(crate) fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    closing_quote(bytes, start).unwrap_or(bytes.len())
}

/// Index just past the closing quote; `None` when the input ends first.
pub(crate) fn closing_quote(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
