//! Token lexer shared by the scanner, the property extraction pass and the value classifier.
//!
//! Strings and comments are lexed as single tokens, so braces, semicolons and commas inside them
//! never show up as punctuation.

use logos::Logos;

use crate::TextRange;

#[derive(Debug, Clone)]
/// [`logos::Lexer`] wrapper for also returning the slice in the iterator
pub(crate) struct Lexer<'input> {
    inner: logos::Lexer<'input, TokenKind>,
}

impl<'input> Lexer<'input> {
    pub(crate) fn new(input: &'input str) -> Self {
        Self {
            inner: TokenKind::lexer(input),
        }
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Token<'input>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?;
        let text = self.inner.slice();
        let text_range = self.inner.span().into();

        Some(Token {
            kind,
            text,
            text_range,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token<'input> {
    pub(crate) kind: Result<TokenKind, LexError>,
    pub(crate) text: &'input str,
    pub(crate) text_range: TextRange,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexError {
    #[error("Unexpected EOF (hint: unterminated string literal)")]
    UnexpectedEofString,

    #[error("Unexpected EOF (hint: unterminated block comment)")]
    UnexpectedEofBlockComment,

    #[default]
    #[error("Unexpected input or EOF")]
    Default,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(error = LexError)]
pub(crate) enum TokenKind {
    #[regex("[ \t\r\n\x0c]+")]
    Whitespace,

    // Supports `/* /* */` but not `/* /* */ */` or `/* */ */`
    #[token("/*", callback = lex_block_comment)]
    BlockComment,

    #[regex(r"//[^\n\r]*")]
    LineComment,

    /// Names, labels, preprocessor words and anything else that isn't punctuation.
    ///
    /// `#address-cells`, `gpio-controller`, `PIN_FUNC`, `0b101` and `#include` are all single
    /// identifiers.
    #[regex(r#"[^ \t\r\n\x0c"/{}<>\[\]();:&=@]+"#)]
    Ident,

    #[token("=")]
    Equals,

    #[token(";")]
    Semicolon,

    #[token("&")]
    Ampersand,

    #[token(":")]
    Colon,

    #[token("@")]
    AtSign,

    #[token(",", priority = 3)]
    Comma,

    #[token("\"", callback = lex_string)]
    String,

    #[regex(r"\d+", priority = 5)]
    #[regex(r"0[xX][0-9a-fA-F]+", priority = 5)]
    Number,

    #[token("{")]
    LCurly,
    #[token("}")]
    RCurly,
    #[token("<")]
    LAngle,
    #[token(">")]
    RAngle,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("/")]
    Slash,
    #[token("+", priority = 3)]
    Plus,
    #[token("-", priority = 3)]
    Minus,
}

impl TokenKind {
    /// Returns true for comment and whitespace token kinds.
    #[inline(always)]
    pub(crate) fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Returns true for kinds that can be glued together into a node, label or property name.
    ///
    /// `@` is not included. Callers that read a node header split on it themselves.
    #[inline(always)]
    pub(crate) fn is_name_part(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Number
                | TokenKind::Comma
                | TokenKind::Minus
                | TokenKind::Plus
        )
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use TokenKind::*;
        f.write_str(match self {
            Whitespace => "whitespace",
            BlockComment => "block comment",
            LineComment => "line comment",
            Ident => "identifier",
            Equals => "‘=’",
            Semicolon => "‘;’",
            Ampersand => "‘&’",
            Colon => "‘:’",
            AtSign => "‘@’",
            Comma => "‘,’",
            String => "string literal",
            Number => "number literal",
            LCurly => "‘{’",
            RCurly => "‘}’",
            LAngle => "‘<’",
            RAngle => "‘>’",
            LBrack => "‘[’",
            RBrack => "‘]’",
            LParen => "‘(’",
            RParen => "‘)’",
            Slash => "‘/’",
            Plus => "‘+’",
            Minus => "‘-’",
        })
    }
}

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexError> {
    let remainder: &str = lex.remainder();
    let mut asterisk_found = false;
    let mut total_len = 0;

    for c in remainder.chars() {
        total_len += c.len_utf8();

        if c == '*' {
            asterisk_found = true;
            continue;
        }

        if c == '/' && asterisk_found {
            lex.bump(total_len);
            return Ok(());
        }

        asterisk_found = false;
    }
    lex.bump(total_len);
    Err(LexError::UnexpectedEofBlockComment)
}

fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> Result<(), LexError> {
    let remainder: &str = lex.remainder();
    let mut escaped = false;
    let mut total_len = 0;

    for c in remainder.chars() {
        total_len += c.len_utf8();

        if c == '\\' {
            escaped = !escaped;
            continue;
        }

        if c == '"' && !escaped {
            lex.bump(total_len);
            return Ok(());
        }

        escaped = false;
    }
    lex.bump(total_len);
    Err(LexError::UnexpectedEofString)
}

/// A non-trivia token, remembering whether trivia separated it from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Significant<'input> {
    pub(crate) kind: TokenKind,
    pub(crate) text: &'input str,
    pub(crate) text_range: TextRange,
    /// True when the previous significant token ends exactly where this one starts.
    pub(crate) joined: bool,
}

/// Drops trivia from `tokens`.
///
/// Returns the first lex error instead, if any.
pub(crate) fn significant<'t, 'input>(
    tokens: impl IntoIterator<Item = &'t Token<'input>>,
) -> Result<Vec<Significant<'input>>, (LexError, TextRange)>
where
    'input: 't,
{
    let mut out: Vec<Significant<'input>> = Vec::new();
    for token in tokens {
        let kind = token.kind.map_err(|err| (err, token.text_range))?;
        if kind.is_trivia() {
            continue;
        }
        let joined = out
            .last()
            .is_some_and(|prev| prev.text_range.end == token.text_range.start);
        out.push(Significant {
            kind,
            text: token.text,
            text_range: token.text_range,
            joined,
        });
    }
    Ok(out)
}
