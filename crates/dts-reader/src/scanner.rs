//! Node-boundary scanner.
//!
//! Walks the token stream once and yields an [`ScopeEvent::Open`] for every `{` with a node
//! header in front of it and an [`ScopeEvent::Close`] for every `};`. Braces inside strings and
//! comments are part of those tokens and never produce events.

use dt_diagnostic::{line_index::LineIndex, DiagnosticCollector};

use crate::{
    context::Context,
    error::ScanError,
    lexer::{significant, Lexer, Significant, TokenKind},
    options::ParseOptions,
    tree::SourceId,
    TextRange,
};

/// A node header, e.g. `uart0: serial@1000 {` or `&uart0 {`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenScope<'input> {
    /// `None` for overlay fragments and nameless blocks.
    pub name: Option<&'input str>,
    pub unit_address: Option<&'input str>,
    pub label: Option<&'input str>,
    /// The label of an overlay fragment without the `&`, e.g. `uart0` or `{/soc/uart}`.
    pub phandle_only_label: Option<&'input str>,
    /// From the start of the header to the end of the `{`.
    pub span: TextRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEvent<'input> {
    Open(OpenScope<'input>),
    /// From the `}` to the end of the `;`.
    Close { span: TextRange },
}

impl ScopeEvent<'_> {
    pub fn span(&self) -> TextRange {
        match self {
            Self::Open(open) => open.span,
            Self::Close { span } => *span,
        }
    }
}

/// Scans `text` into scope events.
///
/// ```
/// use dts_reader::scanner::{scan, ScopeEvent};
///
/// let events = scan("/ { uart0: serial@1000 { }; };", &dt_diagnostic::TracingCollector).unwrap();
/// let ScopeEvent::Open(serial) = events[1] else { panic!() };
/// assert_eq!(serial.name, Some("serial"));
/// assert_eq!(serial.unit_address, Some("1000"));
/// assert_eq!(serial.label, Some("uart0"));
/// assert_eq!(events.len(), 4);
/// ```
pub fn scan<'input>(
    text: &'input str,
    diag: &dyn DiagnosticCollector,
) -> Result<Vec<ScopeEvent<'input>>, ScanError> {
    let source = SourceId::from("<input>");
    let index = LineIndex::new(text);
    let options = ParseOptions::default();
    let ctx = Context {
        source: &source,
        text,
        index: &index,
        options: &options,
        diag,
    };

    let tokens: Vec<_> = Lexer::new(text).collect();
    let toks = significant(&tokens).map_err(|(error, range)| ScanError::Lex { error, range })?;
    Scanner::new(&ctx, text, &toks)?.collect()
}

/// Lazy scope event iterator. Stops after the first error.
pub(crate) struct Scanner<'a, 'input> {
    ctx: &'a Context<'a>,
    text: &'input str,
    toks: &'a [Significant<'input>],
    pos: usize,
    /// Index of the first token of the current statement or node header.
    boundary: usize,
    depth: usize,
    done: bool,
}

fn is_header_part(tok: &Significant) -> bool {
    tok.kind.is_name_part() || tok.kind == TokenKind::AtSign
}

impl<'a, 'input> Scanner<'a, 'input> {
    /// Fails with [`ScanError::RootNotFound`] unless the tokens contain `/ {`.
    pub(crate) fn new(
        ctx: &'a Context<'a>,
        text: &'input str,
        toks: &'a [Significant<'input>],
    ) -> Result<Self, ScanError> {
        let has_root = toks
            .windows(2)
            .any(|w| w[0].kind == TokenKind::Slash && w[1].kind == TokenKind::LCurly);
        if !has_root {
            return Err(ScanError::RootNotFound);
        }

        Ok(Self {
            ctx,
            text,
            toks,
            pos: 0,
            boundary: 0,
            depth: 0,
            done: false,
        })
    }

    fn slice(&self, range: TextRange) -> &'input str {
        range.text(self.text).unwrap_or_default()
    }

    fn advance(&mut self) -> Option<Result<ScopeEvent<'input>, ScanError>> {
        let toks = self.toks;
        while let Some(tok) = toks.get(self.pos) {
            let idx = self.pos;
            self.pos += 1;

            match tok.kind {
                TokenKind::Semicolon => self.boundary = self.pos,
                // `&{/path}`, either a value or an overlay fragment header
                TokenKind::Ampersand
                    if toks
                        .get(idx + 1)
                        .is_some_and(|t| t.joined && t.kind == TokenKind::LCurly) =>
                {
                    let Some(close) = toks[idx + 1..]
                        .iter()
                        .position(|t| t.kind == TokenKind::RCurly)
                    else {
                        continue;
                    };
                    let close = idx + 1 + close;
                    self.pos = close + 1;

                    if let Some(brace) = toks.get(self.pos).filter(|t| t.kind == TokenKind::LCurly)
                    {
                        self.pos += 1;
                        let label = self.slice(TextRange::new(
                            toks[idx + 1].text_range.start,
                            toks[close].text_range.end,
                        ));
                        return Some(self.open_overlay(tok, label, brace));
                    }
                }
                TokenKind::LCurly => return Some(self.open(idx)),
                TokenKind::RCurly => {
                    if let Some(event) = self.close(idx) {
                        return Some(Ok(event));
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn open_overlay(
        &mut self,
        ampersand: &Significant,
        label: &'input str,
        brace: &Significant,
    ) -> Result<ScopeEvent<'input>, ScanError> {
        self.boundary = self.pos;
        let span = ampersand.text_range.to(brace.text_range);
        if self.depth > 0 {
            return Err(ScanError::OverlayMustBeTopLevel {
                name: format!("&{label}"),
                range: span,
            });
        }
        self.depth += 1;
        tracing::trace!(label, offset = span.start, "open overlay fragment");
        Ok(ScopeEvent::Open(OpenScope {
            phandle_only_label: Some(label),
            span,
            ..OpenScope::default()
        }))
    }

    /// Reads the node header in front of the `{` at `brace_idx`.
    fn open(&mut self, brace_idx: usize) -> Result<ScopeEvent<'input>, ScanError> {
        let toks = self.toks;
        let header = &toks[self.boundary..brace_idx];
        let brace = &toks[brace_idx];
        self.boundary = brace_idx + 1;

        let Some(last) = header.len().checked_sub(1) else {
            self.ctx.warn(brace.text_range, "Block without a node name");
            self.depth += 1;
            return Ok(ScopeEvent::Open(OpenScope {
                span: brace.text_range,
                ..OpenScope::default()
            }));
        };

        let mut start = last;
        if header[last].kind == TokenKind::Slash {
            // Root node
        } else if is_header_part(&header[last]) {
            while start > 0 && header[start].joined && is_header_part(&header[start - 1]) {
                start -= 1;
            }
        } else {
            self.ctx.warn(
                header[last].text_range.to(brace.text_range),
                "Unrecognized node header",
            );
            self.depth += 1;
            return Ok(ScopeEvent::Open(OpenScope {
                span: header[last].text_range.to(brace.text_range),
                ..OpenScope::default()
            }));
        }

        let name_text = self.slice(header[start].text_range.to(header[last].text_range));

        if start > 0 && header[start - 1].kind == TokenKind::Ampersand && header[start].joined {
            return self.open_overlay(&header[start - 1], name_text, brace);
        }

        let (name, unit_address) = match name_text.split_once('@') {
            Some((name, addr)) => (name, Some(addr)),
            None => (name_text, None),
        };

        let mut header_start = start;
        let mut label = None;
        if start >= 2
            && header[start - 1].kind == TokenKind::Colon
            && header[start - 1].joined
            && header[start - 2].kind.is_name_part()
        {
            let label_end = start - 2;
            let mut label_start = label_end;
            while label_start > 0
                && header[label_start].joined
                && header[label_start - 1].kind.is_name_part()
            {
                label_start -= 1;
            }
            label = Some(self.slice(
                header[label_start]
                    .text_range
                    .to(header[label_end].text_range),
            ));
            header_start = label_start;
        }

        if header_start > 0 {
            tracing::trace!(
                skipped = self.slice(header[0].text_range.to(header[header_start - 1].text_range)),
                "ignoring tokens before node header"
            );
        }

        self.depth += 1;
        let span = header[header_start].text_range.to(brace.text_range);
        tracing::trace!(name, offset = span.start, depth = self.depth, "open scope");
        Ok(ScopeEvent::Open(OpenScope {
            name: Some(name),
            unit_address,
            label,
            phandle_only_label: None,
            span,
        }))
    }

    fn close(&mut self, rcurly_idx: usize) -> Option<ScopeEvent<'input>> {
        let toks = self.toks;
        let rcurly = &toks[rcurly_idx];
        self.boundary = rcurly_idx + 1;

        let Some(semicolon) = toks
            .get(rcurly_idx + 1)
            .filter(|t| t.kind == TokenKind::Semicolon)
        else {
            self.ctx.warn(rcurly.text_range, "Missing `;` after `}`");
            return None;
        };

        self.pos = rcurly_idx + 2;
        self.boundary = self.pos;
        self.depth = self.depth.saturating_sub(1);

        let span = rcurly.text_range.to(semicolon.text_range);
        tracing::trace!(offset = span.start, depth = self.depth, "close scope");
        Some(ScopeEvent::Close { span })
    }
}

impl<'input> Iterator for Scanner<'_, 'input> {
    type Item = Result<ScopeEvent<'input>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.advance();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
