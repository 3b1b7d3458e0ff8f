use std::path::PathBuf;

use crate::{
    lexer::LexError,
    tree::SourceId,
    value::{ValueError, ValueKind},
    TextRange,
};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeImbalance {
    #[error("`}};` without a matching `{{`")]
    UnmatchedClose,
    #[error("`{{` is never closed with `}};`")]
    UnclosedOpen,
}

/// Node-boundary errors from the scanner and the tree builder.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("{error}")]
    Lex { error: LexError, range: TextRange },
    #[error("root node `/ {{` not found")]
    RootNotFound,
    #[error("overlay fragment `{name}` must be at the top level")]
    OverlayMustBeTopLevel { name: String, range: TextRange },
    #[error("unbalanced scopes: {kind}")]
    UnbalancedScopes {
        kind: ScopeImbalance,
        range: TextRange,
    },
}

impl ScanError {
    pub fn range(&self) -> Option<TextRange> {
        match self {
            Self::RootNotFound => None,
            Self::Lex { range, .. }
            | Self::OverlayMustBeTopLevel { range, .. }
            | Self::UnbalancedScopes { range, .. } => Some(*range),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property `{name}` is assigned more than once")]
    DuplicateProperty {
        name: String,
        /// Key of the first assignment.
        first: TextRange,
        range: TextRange,
    },
    #[error("property `{name}` was {expected}, can't reassign it as {found}")]
    PropertyKindConflict {
        name: String,
        expected: ValueKind,
        found: ValueKind,
        range: TextRange,
    },
}

impl PropertyError {
    pub fn range(&self) -> TextRange {
        match self {
            Self::DuplicateProperty { range, .. } | Self::PropertyKindConflict { range, .. } => {
                *range
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl ParseErrorKind {
    pub fn range(&self) -> Option<TextRange> {
        match self {
            Self::Scan(err) => err.range(),
            Self::Value(err) => err.range(),
            Self::Property(err) => Some(err.range()),
        }
    }
}

/// A fatal error while parsing one buffer.
///
/// No tree is produced alongside it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{file}:{line}: {kind}{}", snippet_suffix(.snippet))]
pub struct ParseError {
    pub file: SourceId,
    /// Byte range of the offending text.
    pub range: TextRange,
    /// 1-based line of `range.start`.
    pub line: usize,
    /// The first line of the offending text.
    pub snippet: String,
    pub kind: ParseErrorKind,
}

const SNIPPET_MAX_CHARS: usize = 60;

fn snippet_suffix(snippet: &str) -> String {
    if snippet.is_empty() {
        String::new()
    } else {
        format!(" (`{snippet}`)")
    }
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        range: TextRange,
        file: SourceId,
        line: usize,
        text: &str,
    ) -> Self {
        let snippet = range
            .text(text)
            .and_then(|s| s.lines().next())
            .map(|s| s.trim().chars().take(SNIPPET_MAX_CHARS).collect())
            .unwrap_or_default();
        Self {
            file,
            range,
            line,
            snippet,
            kind,
        }
    }
}

/// Errors from reading and parsing a file from disk.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("{} not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),
    #[error("failed to read source")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
