//! Structural Scanner and Literal Segmenter
//!
//! Bracket matching over raw text without a tokenizer. Quoted spans (single,
//! double, backtick) are opaque and honor backslash escapes, so brackets inside
//! strings never affect depth.
//!
//! Brackets that appear unquoted inside non-literal code (an arrow function
//! body, say) are counted like any other. Callers must only hand the scanner
//! spans that are themselves literals.

use super::comments::{skip_quoted, QUOTES};

/// Find the bracket matching the one just before `start`.
///
/// `start` is the position immediately after an opening `[`, `{` or `(`.
/// Returns the index of the balanced closing bracket, or `None` when the text
/// ends first or `start` does not follow an opening bracket.
pub fn find_closing(text: &str, start: usize) -> Option<usize> {
    let open = *text.as_bytes().get(start.checked_sub(1)?)?;
    let close = match open {
        b'[' => b']',
        b'{' => b'}',
        b'(' => b')',
        _ => return None,
    };
    find_matching(text, start, open, close)
}

/// Depth-count `open`/`close` from `start` (depth already 1) and return the
/// index of the close that brings depth back to zero.
pub fn find_matching(text: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        if QUOTES.contains(&b) {
            i = skip_quoted(bytes, i);
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }

    None
}

/// Byte range of one top-level object literal, braces included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    pub start: usize,
    pub end: usize,
}

impl ObjectSpan {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Locate every top-level object literal in the body of an array literal.
///
/// Filler between objects (commas, whitespace, identifiers, strings) is
/// skipped. After an object closes, scanning resumes strictly after it, so
/// nested objects are never reported separately. An object whose closing brace
/// is missing ends the scan.
pub fn object_spans(body: &str) -> Vec<ObjectSpan> {
    let bytes = body.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if QUOTES.contains(&b) {
            i = skip_quoted(bytes, i);
            continue;
        }
        if b == b'[' || b == b'(' {
            // Nested arrays and call arguments are filler at this level.
            match find_closing(body, i + 1) {
                Some(end) => i = end + 1,
                None => break,
            }
            continue;
        }
        if b == b'{' {
            match find_matching(body, i + 1, b'{', b'}') {
                Some(end) => {
                    spans.push(ObjectSpan { start: i, end: end + 1 });
                    i = end + 1;
                }
                None => break,
            }
            continue;
        }
        i += 1;
    }

    spans
}

/// Segment an array-literal body into its top-level object-literal substrings,
/// in source order.
pub fn segment_objects(body: &str) -> Vec<&str> {
    object_spans(body).iter().map(|span| span.slice(body)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_closing_simple() {
        let text = "[1, [2, 3], 4] tail";
        assert_eq!(find_closing(text, 1), Some(13));
    }

    #[test]
    fn test_find_closing_ignores_brackets_in_strings() {
        let text = r#"{ a: '}', b: "{{", c: `]` }"#;
        assert_eq!(find_closing(text, 1), Some(text.len() - 1));
    }

    #[test]
    fn test_find_closing_escaped_quote() {
        let text = r#"{ a: 'it\'s }', b: 1 }x"#;
        assert_eq!(find_closing(text, 1), Some(text.len() - 2));
    }

    #[test]
    fn test_find_closing_deep_nesting() {
        let mut text = String::new();
        for _ in 0..64 {
            text.push('{');
        }
        for _ in 0..64 {
            text.push('}');
        }
        assert_eq!(find_closing(&text, 1), Some(127));
        assert_eq!(find_closing(&text, 32), Some(96));
    }

    #[test]
    fn test_find_closing_unterminated() {
        assert_eq!(find_closing("{ a: [1, 2 }", 6), None);
        assert_eq!(find_closing("{ a: 1", 1), None);
        assert_eq!(find_closing("abc", 1), None);
    }

    #[test]
    fn test_segment_counts_top_level_objects() {
        let body = r#"
            { name: 'a', nested: { deep: { deeper: [ { x: 1 } ] } } },
            { name: 'b', label: "has } brace" },
            'filler {not an object}',
            { name: 'c' }
        "#;
        let parts = segment_objects(body);
        assert_eq!(parts.len(), 3);
        assert!(parts[0].contains("'a'"));
        assert!(parts[1].contains("'b'"));
        assert!(parts[2].contains("'c'"));
        assert!(parts.iter().all(|p| p.starts_with('{') && p.ends_with('}')));
    }

    #[test]
    fn test_segment_skips_nested_arrays_between_objects() {
        let body = "[{ inner: 1 }], { outer: 2 }";
        let parts = segment_objects(body);
        assert_eq!(parts, vec!["{ outer: 2 }"]);
    }

    #[test]
    fn test_segment_empty() {
        assert!(segment_objects("   ").is_empty());
    }
}
