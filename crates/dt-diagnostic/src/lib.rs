//! # dt-tools diagnostics
//!
//! Source positions and the diagnostic sink shared by the reader passes.
//!
//! Passes never print on their own. They hand a [`Diagnostic`] to whatever
//! [`DiagnosticCollector`] the caller injected.

use std::borrow::Cow;
use std::sync::Arc;

use line_index::LineSpan;
use text_range::TextRange;

pub mod line_index;
pub mod text_range;

// TODO: https://doc.rust-lang.org/nightly/nightly-rustc/rustc_error_messages/enum.DiagMessage.html
pub type DiagnosticMessage = Cow<'static, str>;

/// Just like the [MultiSpan from rustc & clippy][1]
///
/// [1]: https://doc.rust-lang.org/nightly/nightly-rustc/rustc_error_messages/struct.MultiSpan.html
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiSpan {
    pub primary_spans: Vec<TextRange>,
    pub span_labels: Vec<SpanLabel>,
}

impl From<TextRange> for MultiSpan {
    fn from(value: TextRange) -> Self {
        Self {
            primary_spans: vec![value],
            span_labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanLabel {
    pub span: TextRange,
    pub msg: DiagnosticMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// The file identifier the spans point into, if known.
    pub source: Option<Arc<str>>,
    pub span: MultiSpan,
    /// Lines covered by the primary span.
    pub lines: Option<LineSpan>,
    pub msg: DiagnosticMessage,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(primary_span: TextRange, msg: DiagnosticMessage, severity: Severity) -> Self {
        Self {
            source: None,
            span: MultiSpan::from(primary_span),
            lines: None,
            msg,
            severity,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<str>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_lines(mut self, lines: LineSpan) -> Self {
        self.lines = Some(lines);
        self
    }

    #[must_use]
    pub fn with_label(mut self, span: TextRange, msg: impl Into<DiagnosticMessage>) -> Self {
        self.span.span_labels.push(SpanLabel {
            span,
            msg: msg.into(),
        });
        self
    }

    /// Returns the first primary span.
    pub fn primary_span(&self) -> Option<TextRange> {
        self.span.primary_spans.first().copied()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        if let Some(lines) = self.lines {
            write!(f, "{}:", lines.start)?;
        }
        write!(f, " {}: {}", self.severity, self.msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warning",
            Self::Error => "error",
        })
    }
}

pub trait DiagnosticCollector {
    fn emit(&self, diag: Diagnostic);
}

impl DiagnosticCollector for std::sync::Mutex<&mut Vec<Diagnostic>> {
    fn emit(&self, diag: Diagnostic) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(diag);
    }
}
impl DiagnosticCollector for std::sync::Mutex<Vec<Diagnostic>> {
    fn emit(&self, diag: Diagnostic) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(diag);
    }
}

#[cfg(feature = "parking_lot")]
impl DiagnosticCollector for parking_lot::Mutex<&mut Vec<Diagnostic>> {
    fn emit(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }
}
#[cfg(feature = "parking_lot")]
impl DiagnosticCollector for parking_lot::Mutex<Vec<Diagnostic>> {
    fn emit(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }
}

/// Forwards every diagnostic to [`tracing`] at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCollector;

impl DiagnosticCollector for TracingCollector {
    fn emit(&self, diag: Diagnostic) {
        let span = diag.primary_span();
        let source = diag.source.as_deref().unwrap_or("<unknown>");
        let line = diag.lines.map(|lines| lines.start);
        match diag.severity {
            Severity::Info => tracing::info!(source, ?span, ?line, "{}", diag.msg),
            Severity::Warn => tracing::warn!(source, ?span, ?line, "{}", diag.msg),
            Severity::Error => tracing::error!(source, ?span, ?line, "{}", diag.msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_with_source_and_line() {
        let diag = Diagnostic::new(
            TextRange::new(3, 7),
            Cow::Borrowed("unexpected `}`"),
            Severity::Warn,
        )
        .with_source(Arc::from("board.dts"))
        .with_lines(LineSpan::single(12));

        assert_eq!(diag.to_string(), "board.dts:12: warning: unexpected `}`");
    }

    #[test]
    fn mutex_collector() {
        let collector = std::sync::Mutex::new(Vec::new());
        collector.emit(Diagnostic::new(
            TextRange::new(0, 1),
            Cow::Borrowed("hello"),
            Severity::Info,
        ));
        let diags = collector.into_inner().unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].primary_span(), Some(TextRange::new(0, 1)));
    }
}
