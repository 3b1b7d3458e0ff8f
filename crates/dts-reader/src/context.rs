use std::borrow::Cow;

use dt_diagnostic::{line_index::LineIndex, Diagnostic, DiagnosticCollector, Severity};

use crate::{
    error::{ParseError, ParseErrorKind},
    options::ParseOptions,
    span::SourceSpan,
    tree::SourceId,
    TextRange,
};

/// Everything a pass needs to know about the buffer being parsed.
pub(crate) struct Context<'a> {
    pub(crate) source: &'a SourceId,
    pub(crate) text: &'a str,
    pub(crate) index: &'a LineIndex,
    pub(crate) options: &'a ParseOptions,
    pub(crate) diag: &'a dyn DiagnosticCollector,
}

impl<'a> Context<'a> {
    pub(crate) fn span(&self, range: TextRange) -> SourceSpan {
        SourceSpan::new(range, self.index)
    }

    pub(crate) fn slice(&self, range: TextRange) -> &'a str {
        range.text(self.text).unwrap_or_default()
    }

    pub(crate) fn emit(
        &self,
        range: TextRange,
        msg: impl Into<Cow<'static, str>>,
        severity: Severity,
    ) {
        self.diag.emit(
            Diagnostic::new(range, msg.into(), severity)
                .with_source(self.source.clone())
                .with_lines(self.index.lines(range)),
        );
    }

    pub(crate) fn warn(&self, range: TextRange, msg: impl Into<Cow<'static, str>>) {
        self.emit(range, msg, Severity::Warn);
    }

    /// Builds a [`ParseError`], using `fallback` when the error doesn't carry its own range.
    pub(crate) fn error(&self, kind: impl Into<ParseErrorKind>, fallback: TextRange) -> ParseError {
        let kind = kind.into();
        let range = kind.range().unwrap_or(fallback);
        ParseError::new(
            kind,
            range,
            self.source.clone(),
            self.index.line(range.start),
            self.text,
        )
    }
}
