use std::fmt::{Debug, Display};
use std::ops::Range;

/// A half-open byte range `[start, end)` into one source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextRange {
    /// The beginning byte offset of the span (inclusive)
    pub start: usize,
    /// The ending byte offset of the span (exclusive)
    pub end: usize,
}
impl Display for TextRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl TextRange {
    /// Creates a new `TextRange`.
    ///
    /// `start` must not be past `end`.
    pub const fn new(start: usize, end: usize) -> TextRange {
        debug_assert!(start <= end);
        TextRange { start, end }
    }

    /// Creates an empty `TextRange` at `offset`.
    pub const fn empty(offset: usize) -> TextRange {
        TextRange {
            start: offset,
            end: offset,
        }
    }

    /// Returns the length of the span.
    ///
    /// # Example
    ///
    /// ```
    /// use dt_diagnostic::text_range::TextRange;
    ///
    /// let span = TextRange { start: 4, end: 7 };
    /// assert_eq!(span.length(), 3);
    ///
    /// let span = TextRange { start: 4, end: 4 };
    /// assert_eq!(span.length(), 0);
    /// ```
    #[inline(always)]
    pub const fn length(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Offsets the span by the specified amount
    ///
    /// # Example
    ///
    /// ```
    /// use dt_diagnostic::text_range::TextRange;
    ///
    /// let span = TextRange { start: 4, end: 7 };
    /// assert_eq!(span.offset(2), TextRange { start: 6, end: 9 });
    /// ```
    #[inline(always)]
    #[must_use]
    pub const fn offset(self, offset: usize) -> Self {
        TextRange {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Returns the text as referenced from `source`.
    ///
    /// # Example
    ///
    /// ```
    /// use dt_diagnostic::text_range::TextRange;
    ///
    /// let source = "foo bar baz";
    ///
    /// let span = TextRange { start: 4, end: 7 };
    /// assert_eq!(span.text(source), Some("bar"));
    ///
    /// // Out of bounds
    /// let span = TextRange { start: 11, end: 12 };
    /// assert_eq!(span.text(source), None);
    /// ```
    #[inline(always)]
    pub fn text<'i>(&self, source: &'i str) -> Option<&'i str> {
        source.get(self.start..self.end)
    }

    /// Returns the byte offset range in a [`Range`].
    #[inline(always)]
    pub const fn byte_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Returns true if `other` lies completely inside `self`.
    ///
    /// ```
    /// use dt_diagnostic::text_range::TextRange;
    ///
    /// assert!(TextRange::new(2, 10).contains_range(TextRange::new(2, 10)));
    /// assert!(TextRange::new(2, 10).contains_range(TextRange::new(4, 4)));
    /// assert!(!TextRange::new(2, 10).contains_range(TextRange::new(1, 4)));
    /// ```
    pub const fn contains_range(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns a `TextRange` that would enclose both `self` and `end`.
    ///
    /// Note that this can also be used to extend the span "backwards":
    /// `start.to(end)` and `end.to(start)` return the same `TextRange`.
    ///
    /// ```text
    ///     ____             ___
    ///     self lorem ipsum end
    ///     ^^^^^^^^^^^^^^^^^^^^
    /// ```
    #[must_use]
    pub fn to(self, end: TextRange) -> TextRange {
        TextRange::new(self.start.min(end.start), self.end.max(end.end))
    }

    /// Shrinks the range so that the text it refers to in `source` has no leading or trailing
    /// whitespace.
    ///
    /// Returns `self` unchanged when it is out of bounds.
    #[must_use]
    pub fn trim(self, source: &str) -> TextRange {
        let Some(text) = self.text(source) else {
            return self;
        };
        let start = self.start + (text.len() - text.trim_start().len());
        let end = self.end - (text.len() - text.trim_end().len());
        TextRange::new(start, end.max(start))
    }
}

impl From<Range<usize>> for TextRange {
    #[inline(always)]
    fn from(value: Range<usize>) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}
impl From<TextRange> for Range<usize> {
    #[inline(always)]
    fn from(value: TextRange) -> Self {
        value.start..value.end
    }
}
