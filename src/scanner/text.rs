//! Text normalization shared by every scanner.
//!
//! File contents are decoded with invalid UTF-8 dropped, and `\r\n` / lone `\r` line
//! endings are folded to `\n`. Line splitting recognizes the full set of line boundaries
//! (vertical tab, form feed, the ASCII separators, NEL, and the Unicode line/paragraph
//! separators), so line numbers agree regardless of the newline convention a file uses.

/// True for every character that terminates a line.
#[must_use]
pub const fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split `text` into lines without their terminators.
///
/// `\r\n` counts as one boundary. A trailing terminator does not produce an empty final
/// line, and empty input yields no lines.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_boundary(c) {
            continue;
        }
        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();
        if c == '\r' && matches!(chars.peek(), Some(&(_, '\n'))) {
            chars.next();
            start += 1;
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Decode bytes as UTF-8, dropping invalid sequences instead of substituting them.
#[must_use]
pub fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Fold `\r\n` and lone `\r` to `\n`.
#[must_use]
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Decoded, newline-normalized text of a file's bytes.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    normalize_newlines(&decode_ignoring_invalid(bytes))
}
