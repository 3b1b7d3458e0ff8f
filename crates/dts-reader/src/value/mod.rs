//! Property value classification.
//!
//! A property's right-hand side is matched against the value grammars in a fixed order and the
//! first match wins:
//!
//! 1. a single string: `"okay"`
//! 2. a string list: `"a", "b"`
//! 3. a cell list: `<0x1 &gpio2 GPIO_ACTIVE_LOW (A | B)>`
//! 4. a bytestring: `[0x01 0x02]`
//! 5. an alias: `&gpio2`
//! 6. a mixed list of strings, cell lists and bytestrings: `"a", <1>, [0x02]`
//!
//! Once a grammar matches structurally, an error inside it is final. Nothing falls through to a
//! later grammar.

use std::fmt::Display;

use enum_as_inner::EnumAsInner;
use itertools::Itertools as _;

use crate::lexer::{significant, Lexer, Significant, TokenKind};
use crate::options::ParseOptions;
use crate::TextRange;

mod primitive;
mod string;

pub use primitive::{CellElement, Byte, Integer, MacroExpression, MacroRef, PhandleRef, Radix};
pub use string::{interpret_escaped_string, StringParseError};

/// A classified property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumAsInner)]
pub enum PropertyValue {
    /// e.g. `"okay"`
    String(String),
    /// e.g. `"ns16550a", "snps,dw-apb-uart"`
    StringList(Vec<String>),
    /// e.g. `<0x1000 &intc IRQ_TYPE_LEVEL_HIGH>`
    Cells(Vec<CellElement>),
    /// e.g. `[0x00 0x11 0x22]`
    Bytes(Vec<Byte>),
    /// A value that is a single reference, e.g. `&uart1`
    Alias(PhandleRef),
    /// e.g. `"a", <1 2>, [0x03]`
    Mixed(Vec<MixedElement>),
    /// A property without a value, e.g. `gpio-controller;`
    Marker,
    /// Raw text kept when classification failed and the options asked to keep going.
    Unparsed(String),
}

/// One comma-separated element of a [`PropertyValue::Mixed`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumAsInner)]
pub enum MixedElement {
    String(String),
    Cells(Vec<CellElement>),
    Bytes(Vec<Byte>),
}

/// The variant of a [`PropertyValue`] without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    StringList,
    Cells,
    Bytes,
    Alias,
    Mixed,
    Marker,
    Unparsed,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::String => "a string",
            Self::StringList => "a string list",
            Self::Cells => "a cell list",
            Self::Bytes => "a bytestring",
            Self::Alias => "an alias",
            Self::Mixed => "a mixed list",
            Self::Marker => "a marker",
            Self::Unparsed => "unparsed text",
        })
    }
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::StringList(_) => ValueKind::StringList,
            Self::Cells(_) => ValueKind::Cells,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Alias(_) => ValueKind::Alias,
            Self::Mixed(_) => ValueKind::Mixed,
            Self::Marker => ValueKind::Marker,
            Self::Unparsed(_) => ValueKind::Unparsed,
        }
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", string::escape_string(s))
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(&quoted(s)),
            Self::StringList(list) => write!(f, "{}", list.iter().map(|s| quoted(s)).join(", ")),
            Self::Cells(cells) => write!(f, "<{}>", cells.iter().join(" ")),
            Self::Bytes(bytes) => write!(f, "[{}]", bytes.iter().join(" ")),
            Self::Alias(phandle) => phandle.fmt(f),
            Self::Mixed(elements) => write!(f, "{}", elements.iter().join(", ")),
            Self::Marker => Ok(()),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Display for MixedElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(&quoted(s)),
            Self::Cells(cells) => write!(f, "<{}>", cells.iter().join(" ")),
            Self::Bytes(bytes) => write!(f, "[{}]", bytes.iter().join(" ")),
        }
    }
}

/// Value classification error.
///
/// Ranges are relative to the classified text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("value doesn't match any property value grammar")]
    UnclassifiableValue,
    #[error("unrecognized cell token `{token}`")]
    UnrecognizedCellToken { token: String, range: TextRange },
    #[error("invalid {radix} literal `{literal}`")]
    InvalidNumericLiteral {
        literal: String,
        radix: Radix,
        range: TextRange,
    },
    #[error("mixed value element `{element}` matches more than one value grammar")]
    AmbiguousMixedElement { element: String, range: TextRange },
    #[error("invalid string literal: {error}")]
    InvalidString {
        error: StringParseError,
        range: TextRange,
    },
}

impl ValueError {
    /// The offending range, if narrower than the whole value.
    pub fn range(&self) -> Option<TextRange> {
        match self {
            Self::UnclassifiableValue => None,
            Self::UnrecognizedCellToken { range, .. }
            | Self::InvalidNumericLiteral { range, .. }
            | Self::AmbiguousMixedElement { range, .. }
            | Self::InvalidString { range, .. } => Some(*range),
        }
    }

    /// Shifts the range by `by` bytes.
    #[must_use]
    pub fn offset(mut self, by: usize) -> Self {
        match &mut self {
            Self::UnclassifiableValue => {}
            Self::UnrecognizedCellToken { range, .. }
            | Self::InvalidNumericLiteral { range, .. }
            | Self::AmbiguousMixedElement { range, .. }
            | Self::InvalidString { range, .. } => *range = range.offset(by),
        }
        self
    }
}

/// Classifies a property value with the default options.
///
/// `text` is the trimmed right-hand side of the assignment, without the `;`.
///
/// ```
/// use dts_reader::value::{classify, PropertyValue};
///
/// assert_eq!(
///     classify(r#""a", "b""#).unwrap(),
///     PropertyValue::StringList(vec!["a".to_owned(), "b".to_owned()])
/// );
/// ```
pub fn classify(text: &str) -> Result<PropertyValue, ValueError> {
    classify_with(text, &ParseOptions::default())
}

/// Classifies a property value.
pub fn classify_with(text: &str, options: &ParseOptions) -> Result<PropertyValue, ValueError> {
    let tokens: Vec<_> = Lexer::new(text).collect();
    let toks = significant(&tokens).map_err(|_| ValueError::UnclassifiableValue)?;

    let value = Classifier {
        text,
        bare_byte_radix: options.bare_byte_radix,
    }
    .classify(&toks)?;

    tracing::trace!(kind = %value.kind(), text, "classified value");
    Ok(value)
}

struct Classifier<'input> {
    text: &'input str,
    bare_byte_radix: Radix,
}

type Toks<'a, 'input> = &'a [Significant<'input>];

/// `None` when the grammar doesn't apply, `Some(Err(_))` when it applies but is malformed.
type Attempt<T> = Option<Result<T, ValueError>>;

fn span_of(toks: Toks) -> TextRange {
    match (toks.first(), toks.last()) {
        (Some(first), Some(last)) => first.text_range.to(last.text_range),
        _ => TextRange::default(),
    }
}

/// Returns the index of the `)` matching the `(` at `open`.
fn paren_end(toks: Toks, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, tok) in toks.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

impl<'input> Classifier<'input> {
    fn slice(&self, range: TextRange) -> &'input str {
        range.text(self.text).unwrap_or_default()
    }

    fn classify(&self, toks: Toks) -> Result<PropertyValue, ValueError> {
        if let Some(string) = self.string(toks) {
            return string.map(PropertyValue::String);
        }
        if let Some(list) = self.string_list(toks) {
            return list.map(PropertyValue::StringList);
        }
        if let Some(cells) = self.cells(toks) {
            return cells.map(PropertyValue::Cells);
        }
        if let Some(bytes) = self.bytes(toks) {
            return bytes.map(PropertyValue::Bytes);
        }
        if let Some(alias) = self.alias(toks) {
            return Ok(PropertyValue::Alias(alias));
        }
        self.mixed(toks).map(PropertyValue::Mixed)
    }

    fn unquote(&self, tok: &Significant) -> Result<String, ValueError> {
        let inner = tok
            .text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or_default();
        interpret_escaped_string(inner).map_err(|error| ValueError::InvalidString {
            error,
            range: tok.text_range,
        })
    }

    fn string(&self, toks: Toks) -> Attempt<String> {
        match toks {
            [tok] if tok.kind == TokenKind::String => Some(self.unquote(tok)),
            _ => None,
        }
    }

    fn string_list(&self, toks: Toks) -> Attempt<Vec<String>> {
        let is_list = toks.len() >= 3
            && toks.len() % 2 == 1
            && toks.iter().enumerate().all(|(idx, tok)| {
                tok.kind
                    == if idx % 2 == 0 {
                        TokenKind::String
                    } else {
                        TokenKind::Comma
                    }
            });
        is_list.then(|| toks.iter().step_by(2).map(|tok| self.unquote(tok)).collect())
    }

    fn cells(&self, toks: Toks) -> Attempt<Vec<CellElement>> {
        if toks.first()?.kind != TokenKind::LAngle {
            return None;
        }
        let mut paren = 0usize;
        let close = toks.iter().enumerate().skip(1).find_map(|(idx, tok)| {
            match tok.kind {
                TokenKind::LParen => paren += 1,
                TokenKind::RParen => paren = paren.saturating_sub(1),
                TokenKind::RAngle if paren == 0 => return Some(idx),
                _ => {}
            }
            None
        })?;
        if close != toks.len() - 1 {
            return None;
        }
        Some(self.cell_elements(&toks[1..close]))
    }

    /// Splits the inside of `<...>` into elements.
    ///
    /// Elements are separated by trivia. A parenthesized group is always one element, even with
    /// whitespace inside, and glues onto a directly preceding name as a macro invocation.
    fn cell_elements(&self, inner: Toks) -> Result<Vec<CellElement>, ValueError> {
        let mut out = Vec::new();
        let mut idx = 0;
        while idx < inner.len() {
            let start = idx;
            let mut end = idx;
            if inner[start].kind == TokenKind::LParen {
                end = paren_end(inner, start).unwrap_or(inner.len() - 1);
            } else {
                while let Some(next) = inner.get(end + 1).filter(|next| next.joined) {
                    if next.kind == TokenKind::LParen {
                        end = paren_end(inner, end + 1).unwrap_or(inner.len() - 1);
                        break;
                    }
                    end += 1;
                }
            }

            let range = span_of(&inner[start..=end]);
            let element = CellElement::from_token(self.slice(range))
                .map_err(|err| err.offset(range.start))?;
            out.push(element);
            idx = end + 1;
        }
        Ok(out)
    }

    fn bytes(&self, toks: Toks) -> Attempt<Vec<Byte>> {
        if toks.first()?.kind != TokenKind::LBrack {
            return None;
        }
        let close = toks.iter().position(|tok| tok.kind == TokenKind::RBrack)?;
        if close != toks.len() - 1 {
            return None;
        }

        let inner = &toks[1..close];
        let words = inner.chunk_by(|_, next| next.joined);
        let mut out = Vec::new();
        for word in words {
            let range = span_of(word);
            match Byte::parse_token(self.slice(range), self.bare_byte_radix) {
                Ok(bytes) => out.extend(bytes),
                Err(err) => return Some(Err(err.offset(range.start))),
            }
        }
        Some(Ok(out))
    }

    fn alias(&self, toks: Toks) -> Option<PhandleRef> {
        let (first, rest) = toks.split_first()?;
        if first.kind != TokenKind::Ampersand || rest.is_empty() || !rest.iter().all(|t| t.joined)
        {
            return None;
        }
        PhandleRef::from_text(self.slice(span_of(toks)))
    }

    fn mixed(&self, toks: Toks) -> Result<Vec<MixedElement>, ValueError> {
        let mut elements = Vec::new();
        let mut start = 0;
        let (mut paren, mut angle, mut brack) = (0usize, 0usize, 0usize);
        for (idx, tok) in toks.iter().enumerate() {
            match tok.kind {
                TokenKind::LParen => paren += 1,
                TokenKind::RParen => paren = paren.saturating_sub(1),
                TokenKind::LAngle if paren == 0 => angle += 1,
                TokenKind::RAngle if paren == 0 => angle = angle.saturating_sub(1),
                TokenKind::LBrack => brack += 1,
                TokenKind::RBrack => brack = brack.saturating_sub(1),
                TokenKind::Comma if paren == 0 && angle == 0 && brack == 0 => {
                    elements.push(&toks[start..idx]);
                    start = idx + 1;
                }
                _ => {}
            }
        }
        elements.push(&toks[start..]);

        if elements.len() < 2 {
            return Err(ValueError::UnclassifiableValue);
        }
        elements
            .into_iter()
            .map(|element| self.mixed_element(element))
            .collect()
    }

    fn mixed_element(&self, element: Toks) -> Result<MixedElement, ValueError> {
        let mut matches = [
            self.string(element).map(|r| r.map(MixedElement::String)),
            self.cells(element).map(|r| r.map(MixedElement::Cells)),
            self.bytes(element).map(|r| r.map(MixedElement::Bytes)),
        ]
        .into_iter()
        .flatten();

        match (matches.next(), matches.next()) {
            (Some(only), None) => only,
            (Some(_), Some(_)) => {
                let range = span_of(element);
                Err(ValueError::AmbiguousMixedElement {
                    element: self.slice(range).to_owned(),
                    range,
                })
            }
            (None, _) => Err(ValueError::UnclassifiableValue),
        }
    }
}
