/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Translation between editor positions and tool coordinates.
//!
//! Editors address text by 1-based `(line, column)`. Command-line tools want a
//! flat offset on the way in and report `path:line:col` on the way out. Both
//! directions live here so the arithmetic can be tested without a process.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// First line of declaration tool output: `<path>:<line>:<col>[:...]`.
#[allow(
    clippy::expect_used,
    reason = "The pattern is a literal that is covered by unit tests"
)]
static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(\d+)(?::.*)?$").expect("location pattern must compile")
});

/// A cursor location as the editor models it. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based).
    pub column: u32,
}

impl Position {
    /// Creates a position from 1-based line and column.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A range of editor positions. End is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    /// Start line (1-based).
    pub start_line: u32,
    /// Start column (1-based).
    pub start_col: u32,
    /// End line (1-based).
    pub end_line: u32,
    /// End column (1-based, exclusive).
    pub end_col: u32,
}

impl Range {
    /// A one-column range anchored at `position`, used when a tool reports a
    /// point rather than a span.
    #[must_use]
    pub const fn anchor(position: Position) -> Self {
        Self {
            start_line: position.line,
            start_col: position.column,
            end_line: position.line,
            end_col: position.column.saturating_add(1),
        }
    }

    /// The start of the range.
    #[must_use]
    pub const fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col)
    }
}

/// A location reported by a tool: a file and a range within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// The file as the tool printed it. May differ from the requested file.
    pub path: PathBuf,
    /// Anchor range at the reported line and column.
    pub range: Range,
}

/// Errors converting an editor position to an offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// Line or column was zero.
    #[error("positions are 1-based, got line {line} column {column}")]
    ZeroBased {
        /// The offending line.
        line: u32,
        /// The offending column.
        column: u32,
    },
    /// The line is past the end of the buffer.
    #[error("line {line} is out of range (buffer has {line_count} lines)")]
    LineOutOfRange {
        /// The requested line.
        line: u32,
        /// Number of lines in the buffer.
        line_count: u32,
    },
}

/// Errors parsing `path:line:col` tool output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationParseError {
    /// The first line of output did not have the expected shape.
    #[error("expected `path:line:col`, got {0:?}")]
    NoMatch(String),
    /// A line or column number was zero or too large.
    #[error("{field} {value:?} is not a valid 1-based number")]
    InvalidNumber {
        /// Which field failed: `line` or `column`.
        field: &'static str,
        /// The raw digits.
        value: String,
    },
    /// The tool printed bytes that are not UTF-8.
    #[error("output is not valid UTF-8")]
    InvalidUtf8,
}

/// How a position is turned into the offset passed to a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetEncoding {
    /// Displayed columns: every earlier line contributes its max column.
    #[default]
    Columns,
    /// UTF-8 bytes of the buffer text.
    Bytes,
}

/// Per-line length queries supplied by the host editor.
pub trait LineInfo {
    /// Number of lines in the buffer. Never zero.
    fn line_count(&self) -> u32;

    /// Max column of a 1-based line: its length plus one. `None` past the end.
    fn max_column(&self, line: u32) -> Option<u32>;
}

/// Converts a position to a flat offset under the column convention.
///
/// Each line before `position.line` contributes its max column (length plus
/// terminator). `(1, 1)` maps to 0.
///
/// # Errors
///
/// Returns [`PositionError`] if the position is zero-based or its line is past
/// the end of the buffer.
pub fn to_offset(lines: &impl LineInfo, position: Position) -> Result<usize, PositionError> {
    check_bounds(lines, position)?;

    let mut offset = (position.column - 1) as usize;
    for row in 1..position.line {
        let max_column = lines
            .max_column(row)
            .ok_or_else(|| PositionError::LineOutOfRange {
                line: row,
                line_count: lines.line_count(),
            })?;
        offset += max_column as usize;
    }
    Ok(offset)
}

/// Parses the first line of declaration tool output.
///
/// Later lines are ignored. The result is an anchor range one column wide.
///
/// # Errors
///
/// Returns [`LocationParseError`] when the line does not match
/// `path:line:col`. There is no fallback location.
pub fn parse_location(output: &str) -> Result<SourceLocation, LocationParseError> {
    let first = output.lines().next().unwrap_or_default().trim_end();

    let captures = LOCATION_PATTERN
        .captures(first)
        .ok_or_else(|| LocationParseError::NoMatch(first.to_string()))?;

    let path = captures.get(1).map_or("", |m| m.as_str());
    let line = parse_number("line", captures.get(2).map_or("", |m| m.as_str()))?;
    let column = parse_number("column", captures.get(3).map_or("", |m| m.as_str()))?;

    Ok(SourceLocation {
        path: PathBuf::from(path),
        range: Range::anchor(Position::new(line, column)),
    })
}

fn parse_number(field: &'static str, digits: &str) -> Result<u32, LocationParseError> {
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(LocationParseError::InvalidNumber {
            field,
            value: digits.to_string(),
        }),
    }
}

fn check_bounds(lines: &impl LineInfo, position: Position) -> Result<(), PositionError> {
    if position.line == 0 || position.column == 0 {
        return Err(PositionError::ZeroBased {
            line: position.line,
            column: position.column,
        });
    }
    let line_count = lines.line_count();
    if position.line > line_count {
        return Err(PositionError::LineOutOfRange {
            line: position.line,
            line_count,
        });
    }
    Ok(())
}

/// One line of a [`TextBuffer`], as byte offsets into the text.
#[derive(Debug, Clone, Copy)]
struct LineSpan {
    start: usize,
    /// End of the displayed content, before any `\r\n` or `\n`.
    content_end: usize,
    columns: u32,
}

/// Buffer text with its line table.
///
/// Lines split on `\n`. A `\r` before the `\n` is part of the terminator, not
/// a displayed column. Empty text is one empty line.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    text: String,
    lines: Vec<LineSpan>,
}

impl TextBuffer {
    /// Builds the line table for `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut lines = Vec::new();
        let mut start = 0;

        for segment in text.split('\n') {
            let content = segment.strip_suffix('\r').unwrap_or(segment);
            let columns = u32::try_from(content.chars().count()).unwrap_or(u32::MAX);
            lines.push(LineSpan {
                start,
                content_end: start + content.len(),
                columns,
            });
            start += segment.len() + 1;
        }

        Self { text, lines }
    }

    /// The full buffer text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The position just past the last character of the buffer.
    #[must_use]
    pub fn end_position(&self) -> Position {
        let last = self.line_count();
        Position::new(last, self.max_column(last).unwrap_or(1))
    }

    /// Converts a position to an offset using `encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if the position is outside the buffer.
    pub fn offset(&self, position: Position, encoding: OffsetEncoding) -> Result<usize, PositionError> {
        match encoding {
            OffsetEncoding::Columns => to_offset(self, position),
            OffsetEncoding::Bytes => self.byte_offset(position),
        }
    }

    /// Converts a position to a UTF-8 byte offset into the text.
    ///
    /// Terminators count with their real width. Columns past the end of a
    /// line count one byte each.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if the position is outside the buffer.
    pub fn byte_offset(&self, position: Position) -> Result<usize, PositionError> {
        check_bounds(self, position)?;

        let span = self.lines[(position.line - 1) as usize];
        let content = &self.text[span.start..span.content_end];
        let wanted = (position.column - 1) as usize;

        let mut bytes = 0;
        let mut taken = 0;
        for ch in content.chars().take(wanted) {
            bytes += ch.len_utf8();
            taken += 1;
        }

        Ok(span.start + bytes + (wanted - taken))
    }

    /// Converts a column-convention offset back to a position.
    ///
    /// Offsets past the end of the buffer clamp to [`Self::end_position`].
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        let mut remaining = offset;
        for (index, span) in self.lines.iter().enumerate() {
            let line = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let max_column = span.columns as usize + 1;
            if remaining < max_column {
                let column = u32::try_from(remaining + 1).unwrap_or(u32::MAX);
                return Position::new(line, column);
            }
            remaining -= max_column;
        }
        self.end_position()
    }
}

impl LineInfo for TextBuffer {
    fn line_count(&self) -> u32 {
        u32::try_from(self.lines.len()).unwrap_or(u32::MAX)
    }

    fn max_column(&self, line: u32) -> Option<u32> {
        let index = (line as usize).checked_sub(1)?;
        self.lines
            .get(index)
            .map(|span| span.columns.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Line table given directly as max columns, like a host editor would.
    struct Columns(Vec<u32>);

    impl LineInfo for Columns {
        fn line_count(&self) -> u32 {
            u32::try_from(self.0.len()).unwrap_or(u32::MAX)
        }

        fn max_column(&self, line: u32) -> Option<u32> {
            self.0.get((line as usize).checked_sub(1)?).copied()
        }
    }

    #[test]
    fn test_offset_origin_is_zero() {
        let buffer = TextBuffer::new("package main\n");
        assert_eq!(to_offset(&buffer, Position::new(1, 1)), Ok(0));
    }

    #[test]
    fn test_offset_accumulates_previous_lines() {
        // max columns 5, 1, 4 => line starts at 0, 5, 6
        let lines = Columns(vec![5, 1, 4]);
        assert_eq!(to_offset(&lines, Position::new(1, 3)), Ok(2));
        assert_eq!(to_offset(&lines, Position::new(2, 1)), Ok(5));
        assert_eq!(to_offset(&lines, Position::new(3, 1)), Ok(6));
        assert_eq!(to_offset(&lines, Position::new(3, 4)), Ok(9));
    }

    #[test]
    fn test_offset_matches_char_index() {
        let text = "func main() {\n\tx := 1\n}\n";
        let buffer = TextBuffer::new(text);
        let offset = to_offset(&buffer, Position::new(2, 2)).unwrap();
        assert_eq!(&text[offset..offset + 1], "x");
    }

    #[test]
    fn test_offset_is_monotonic() {
        let buffer = TextBuffer::new("ab\n\ncdef\ng");
        let mut positions = Vec::new();
        for line in 1..=buffer.line_count() {
            for column in 1..=buffer.max_column(line).unwrap() {
                positions.push(Position::new(line, column));
            }
        }
        positions.sort();

        let offsets: Vec<usize> = positions
            .iter()
            .map(|p| to_offset(&buffer, *p).unwrap())
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "{offsets:?}");
    }

    #[test]
    fn test_offset_rejects_line_past_end() {
        let buffer = TextBuffer::new("one\ntwo");
        assert_eq!(
            to_offset(&buffer, Position::new(3, 1)),
            Err(PositionError::LineOutOfRange {
                line: 3,
                line_count: 2
            })
        );
    }

    #[test]
    fn test_offset_rejects_zero() {
        let buffer = TextBuffer::new("one");
        assert!(matches!(
            to_offset(&buffer, Position::new(0, 1)),
            Err(PositionError::ZeroBased { .. })
        ));
        assert!(matches!(
            to_offset(&buffer, Position::new(1, 0)),
            Err(PositionError::ZeroBased { .. })
        ));
    }

    #[test]
    fn test_buffer_line_table() {
        let buffer = TextBuffer::new("abc\r\nde\n");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.max_column(1), Some(4));
        assert_eq!(buffer.max_column(2), Some(3));
        assert_eq!(buffer.max_column(3), Some(1));
        assert_eq!(buffer.max_column(4), None);
        assert_eq!(buffer.max_column(0), None);

        let empty = TextBuffer::new("");
        assert_eq!(empty.line_count(), 1);
        assert_eq!(empty.end_position(), Position::new(1, 1));
    }

    #[test]
    fn test_byte_offset_counts_multibyte() {
        let text = "s := \"héllo\"\nx\n";
        let buffer = TextBuffer::new(text);

        // 'l' after 'é' is column 9: 8 chars before it, 9 bytes
        let offset = buffer.byte_offset(Position::new(1, 9)).unwrap();
        assert_eq!(offset, 9);
        assert_eq!(&text[offset..=offset], "l");

        // Column convention disagrees by the extra byte of 'é'
        assert_eq!(to_offset(&buffer, Position::new(1, 9)), Ok(8));

        let offset = buffer.byte_offset(Position::new(2, 1)).unwrap();
        assert_eq!(&text[offset..=offset], "x");
    }

    #[test]
    fn test_byte_offset_counts_crlf() {
        let text = "ab\r\ncd";
        let buffer = TextBuffer::new(text);
        let offset = buffer.offset(Position::new(2, 2), OffsetEncoding::Bytes).unwrap();
        assert_eq!(&text[offset..=offset], "d");
    }

    #[test]
    fn test_position_at_inverts_offset() {
        let buffer = TextBuffer::new("ab\n\ncdef\ng");
        for position in [
            Position::new(1, 1),
            Position::new(1, 3),
            Position::new(2, 1),
            Position::new(3, 4),
            Position::new(4, 2),
        ] {
            let offset = to_offset(&buffer, position).unwrap();
            assert_eq!(buffer.position_at(offset), position);
        }
        assert_eq!(buffer.position_at(10_000), buffer.end_position());
    }

    #[test]
    fn test_parse_location() {
        let location = parse_location("a/b.go:12:5").unwrap();
        assert_eq!(location.path, PathBuf::from("a/b.go"));
        assert_eq!(
            location.range,
            Range {
                start_line: 12,
                start_col: 5,
                end_line: 12,
                end_col: 6
            }
        );
    }

    #[test]
    fn test_parse_location_uses_first_line_only() {
        let output = "/src/fmt/print.go:263:6\nfunc Println(a ...any) (n int, err error)\n";
        let location = parse_location(output).unwrap();
        assert_eq!(location.path, PathBuf::from("/src/fmt/print.go"));
        assert_eq!(location.range.start(), Position::new(263, 6));
    }

    #[test]
    fn test_parse_location_trailing_fields() {
        let location = parse_location("main.go:3:7:extra:9\r\n").unwrap();
        assert_eq!(location.path, PathBuf::from("main.go"));
        assert_eq!(location.range.start(), Position::new(3, 7));
    }

    #[test]
    fn test_parse_location_drive_letter() {
        let location = parse_location(r"C:\go\src\main.go:10:2").unwrap();
        assert_eq!(location.path, PathBuf::from(r"C:\go\src\main.go"));
        assert_eq!(location.range.start(), Position::new(10, 2));
    }

    #[test]
    fn test_parse_location_garbage() {
        assert_eq!(
            parse_location("garbage"),
            Err(LocationParseError::NoMatch("garbage".to_string()))
        );
        assert!(parse_location("").is_err());
        // Package directories are reported without a position
        assert!(parse_location("/usr/local/go/src/html/template\n").is_err());
    }

    #[test]
    fn test_parse_location_zero_line() {
        assert!(matches!(
            parse_location("main.go:0:4"),
            Err(LocationParseError::InvalidNumber { field: "line", .. })
        ));
        assert!(matches!(
            parse_location("main.go:1:99999999999"),
            Err(LocationParseError::InvalidNumber { field: "column", .. })
        ));
    }
}
