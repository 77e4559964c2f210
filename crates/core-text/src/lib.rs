//! Line/column addressing over plain text buffers.
//!
//! The card panel hands the editor surface 1-based `(line, column)`
//! coordinates (the same numbering shown in the gutter) and the editor needs
//! a flat character offset to splice text. Everything here is a pure, total
//! function: out-of-range coordinates clamp instead of failing.
//!
//! Conventions:
//! * Lines are separated by `\n` only. A trailing `\n` yields a final empty
//!   line, matching how the gutter numbers lines.
//! * Lengths and offsets are counted in `char`s (Unicode scalar values), not
//!   bytes. Use [`char_to_byte`] before slicing a `&str`.
//! * A line or column of `0` is treated as `1`.

/// A 1-based `(line, column)` coordinate inside a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn origin() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for TextPosition {
    fn default() -> Self {
        Self::origin()
    }
}

/// Number of `\n`-separated lines in `text`. Always at least 1.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Convert a 1-based `(line, column)` pair into a char offset into `text`.
///
/// Sums the lengths of every line before `line` plus one separator per line,
/// then adds `min(column - 1, len(line))`. A `line` past the end of the text
/// clamps to the last line.
pub fn line_column_to_offset(text: &str, line: usize, column: usize) -> usize {
    let lines: Vec<&str> = text.split('\n').collect();
    // `split` always yields at least one (possibly empty) piece.
    let target = line.clamp(1, lines.len()) - 1;
    let prefix: usize = lines[..target]
        .iter()
        .map(|l| l.chars().count() + 1)
        .sum();
    let line_len = lines[target].chars().count();
    prefix + column.saturating_sub(1).min(line_len)
}

/// Convenience wrapper over [`line_column_to_offset`].
pub fn position_to_offset(text: &str, pos: TextPosition) -> usize {
    line_column_to_offset(text, pos.line, pos.column)
}

/// Byte index of the `char_offset`-th char in `text` (clamped to `text.len()`).
pub fn char_to_byte(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Return a copy of `text` with `snippet` spliced in at `at`, or appended
/// when no position is given.
pub fn insert_text(text: &str, snippet: &str, at: Option<TextPosition>) -> String {
    let byte = match at {
        Some(pos) => char_to_byte(text, position_to_offset(text, pos)),
        None => text.len(),
    };
    let mut out = String::with_capacity(text.len() + snippet.len());
    out.push_str(&text[..byte]);
    out.push_str(snippet);
    out.push_str(&text[byte..]);
    out
}
