use std::fmt::Display;

use dt_diagnostic::line_index::{LineIndex, LineSpan};

use crate::TextRange;

/// A byte range into one source buffer with the lines it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceSpan {
    pub range: TextRange,
    pub lines: Option<LineSpan>,
}

impl SourceSpan {
    pub fn new(range: TextRange, index: &LineIndex) -> Self {
        Self {
            range,
            lines: Some(index.lines(range)),
        }
    }

    /// A span without line information.
    pub const fn bytes(range: TextRange) -> Self {
        Self { range, lines: None }
    }

    #[inline(always)]
    pub const fn start(&self) -> usize {
        self.range.start
    }

    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.range.end
    }

    /// Get the text
    pub fn text<'a>(&self, source: &'a str) -> Option<&'a str> {
        self.range.text(source)
    }

    pub const fn contains(&self, other: &SourceSpan) -> bool {
        self.range.contains_range(other.range)
    }
}

impl Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.lines {
            Some(lines) => write!(f, "{} (line {lines})", self.range),
            None => write!(f, "{}", self.range),
        }
    }
}
