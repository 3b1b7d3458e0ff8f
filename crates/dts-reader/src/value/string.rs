use std::{iter::Peekable, str::Chars};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringParseError {
    #[error("escape at end of string")]
    EscapeAtEndOfString,
    #[error("hex escape with no valid digits")]
    HexNoDigits,
    #[error("octal escape out of range, the maximum is `\\377`")]
    OctalOutOfRange,
}

struct InterpretEscapedString<'a> {
    s: Peekable<Chars<'a>>,
}

impl InterpretEscapedString<'_> {
    /// Consumes up to `max` more digits of `radix`, folding them into `acc`.
    fn digits(&mut self, mut acc: u32, radix: u32, max: usize) -> u32 {
        for _ in 0..max {
            let Some(digit) = self.s.peek().and_then(|c| c.to_digit(radix)) else {
                break;
            };
            self.s.next();
            acc = acc * radix + digit;
        }
        acc
    }
}

impl Iterator for InterpretEscapedString<'_> {
    type Item = Result<char, StringParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.s.next().map(|c| match c {
            '\\' => match self.s.next() {
                None => Err(StringParseError::EscapeAtEndOfString),
                Some('a') => Ok('\x07'),
                Some('b') => Ok('\x08'),
                Some('v') => Ok('\x0b'),
                Some('f') => Ok('\x0c'),
                Some('n') => Ok('\n'),
                Some('r') => Ok('\r'),
                Some('t') => Ok('\t'),
                Some('\\') => Ok('\\'),
                Some('x') => {
                    let Some(first) = self.s.next().and_then(|c| c.to_digit(16)) else {
                        return Err(StringParseError::HexNoDigits);
                    };
                    let num = self.digits(first, 16, 1);
                    u8::try_from(num)
                        .map(char::from)
                        .map_err(|_| StringParseError::HexNoDigits)
                }
                Some(c @ '0'..='7') => {
                    let num = self.digits(c.to_digit(8).unwrap_or_default(), 8, 2);
                    u8::try_from(num)
                        .map(char::from)
                        .map_err(|_| StringParseError::OctalOutOfRange)
                }
                Some(c) => Ok(c),
            },
            c => Ok(c),
        })
    }
}

/// Interprets C escapes (`\n`, `\"`, `\x41`, `\101`, ...) in the contents of a string literal.
pub fn interpret_escaped_string(s: &str) -> Result<String, StringParseError> {
    (InterpretEscapedString {
        s: s.chars().peekable(),
    })
    .collect()
}

/// Inverse of [`interpret_escaped_string`] for the characters that can't appear raw between
/// double quotes.
pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
