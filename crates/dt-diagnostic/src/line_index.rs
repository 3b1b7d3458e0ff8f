//! Byte offset to line number lookup.

use std::fmt::Display;

use crate::text_range::TextRange;

/// A 1-based, inclusive pair of line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub const fn is_single_line(&self) -> bool {
        self.start == self.end
    }
}

impl Display for LineSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_line() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Newline offsets of one buffer, built once per parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    newlines: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            newlines: text
                .bytes()
                .enumerate()
                .filter_map(|(idx, b)| (b == b'\n').then_some(idx))
                .collect(),
            len: text.len(),
        }
    }

    /// Returns the 1-based line containing the byte at `offset`.
    ///
    /// A newline byte belongs to the line it terminates.
    ///
    /// ```
    /// use dt_diagnostic::line_index::LineIndex;
    ///
    /// let index = LineIndex::new("a\nbc\n");
    /// assert_eq!(index.line(0), 1);
    /// assert_eq!(index.line(1), 1);
    /// assert_eq!(index.line(2), 2);
    /// assert_eq!(index.line(5), 3);
    /// ```
    pub fn line(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        // Number of newlines strictly before `offset`
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }

    /// Returns the lines covered by `range`.
    ///
    /// The last line is the one holding the range's last byte, so a range ending right after a
    /// newline doesn't spill onto the next line.
    pub fn lines(&self, range: TextRange) -> LineSpan {
        let start = self.line(range.start);
        let end = if range.is_empty() {
            start
        } else {
            self.line(range.end - 1)
        };
        LineSpan { start, end }
    }

    /// Total number of lines.
    pub fn line_count(&self) -> usize {
        self.newlines.len() + 1
    }
}
