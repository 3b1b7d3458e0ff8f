//! Stateless parsers for the atoms found inside property values.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::ValueError;
use crate::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Radix {
    Hex,
    #[default]
    Dec,
    Bin,
}

impl Radix {
    pub const fn base(self) -> u32 {
        match self {
            Self::Hex => 16,
            Self::Dec => 10,
            Self::Bin => 2,
        }
    }

    /// Splits a `0x`/`0b` prefix off `text`, defaulting to decimal.
    fn detect(text: &str) -> (Self, &str) {
        if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            (Self::Hex, digits)
        } else if let Some(digits) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
            (Self::Bin, digits)
        } else {
            (Self::Dec, text)
        }
    }
}

impl Display for Radix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hex => "hexadecimal",
            Self::Dec => "decimal",
            Self::Bin => "binary",
        })
    }
}

/// Parses `digits` in `radix`, rejecting empty input and signs that `from_str_radix` would accept.
fn parse_digits(digits: &str, radix: Radix) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix.base())) {
        return None;
    }
    u64::from_str_radix(digits, radix.base()).ok()
}

/// Strips a C integer suffix (`U`, `L`, `UL`, `LL`, `ULL`, any case).
fn strip_int_suffix(text: &str) -> &str {
    let trimmed = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let suffix = &text[trimmed.len()..];
    if suffix.len() <= 3 {
        trimmed
    } else {
        text
    }
}

/// An integer cell, remembering the radix and exact literal it was written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integer {
    pub value: u64,
    pub radix: Radix,
    literal: String,
}

impl Integer {
    /// Creates an integer rendered canonically in `radix`.
    pub fn new(value: u64, radix: Radix) -> Self {
        let literal = match radix {
            Radix::Hex => format!("0x{value:x}"),
            Radix::Dec => value.to_string(),
            Radix::Bin => format!("0b{value:b}"),
        };
        Self {
            value,
            radix,
            literal,
        }
    }

    /// Parses an integer literal.
    ///
    /// The prefix picks the radix (`0x` hex, `0b` binary, decimal otherwise), so digits invalid
    /// for it are an error rather than a fallback to another radix.
    ///
    /// ```
    /// use dts_reader::value::{Integer, Radix};
    ///
    /// let int = Integer::from_text("0x1F").unwrap();
    /// assert_eq!((int.value, int.radix), (31, Radix::Hex));
    /// assert_eq!(int.to_string(), "0x1F");
    ///
    /// assert!(Integer::from_text("0x1G").is_err());
    /// ```
    pub fn from_text(text: &str) -> Result<Self, ValueError> {
        let (radix, digits) = Radix::detect(text);
        let value = parse_digits(strip_int_suffix(digits), radix).ok_or_else(|| {
            ValueError::InvalidNumericLiteral {
                literal: text.to_owned(),
                radix,
                range: TextRange::new(0, text.len()),
            }
        })?;
        Ok(Self {
            value,
            radix,
            literal: text.to_owned(),
        })
    }

    /// The literal as written in the source.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn hex_string(&self) -> String {
        format!("0x{:X}", self.value)
    }

    pub fn dec_string(&self) -> String {
        self.value.to_string()
    }

    pub fn bin_string(&self) -> String {
        format!("0b{:b}", self.value)
    }
}

impl Display for Integer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.literal)
    }
}

/// One byte of a bytestring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Byte {
    pub value: u8,
    pub radix: Radix,
}

impl Byte {
    pub const fn new(value: u8, radix: Radix) -> Self {
        Self { value, radix }
    }

    /// Parses one bytestring token, or several packed ones.
    ///
    /// `0x`-prefixed tokens are always hex. Bare tokens use `bare_radix`; in hex mode a bare token
    /// may pack several two-digit bytes (`[0a0b]`).
    pub(crate) fn parse_token(text: &str, bare_radix: Radix) -> Result<Vec<Self>, ValueError> {
        let invalid = |radix| ValueError::InvalidNumericLiteral {
            literal: text.to_owned(),
            radix,
            range: TextRange::new(0, text.len()),
        };

        let prefixed = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
        let (radix, digits) = match prefixed {
            Some(digits) => (Radix::Hex, digits),
            None => (bare_radix, text),
        };

        let packed = prefixed.is_none() && radix == Radix::Hex && digits.len() > 2;
        if packed && digits.is_ascii() && digits.len() % 2 == 0 {
            return (0..digits.len())
                .step_by(2)
                .map(|idx| {
                    let value = parse_digits(&digits[idx..idx + 2], Radix::Hex)
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(|| invalid(Radix::Hex))?;
                    Ok(Self::new(value, Radix::Hex))
                })
                .collect();
        }

        let value = parse_digits(digits, radix)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| invalid(radix))?;
        Ok(vec![Self::new(value, radix)])
    }
}

impl Display for Byte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.radix {
            Radix::Hex => write!(f, "0x{:02x}", self.value),
            Radix::Dec => write!(f, "{}", self.value),
            Radix::Bin => write!(f, "0b{:b}", self.value),
        }
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ',' | '.' | '+' | '-')
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A reference to a labeled node, e.g. `&gpio2`, or to a node path, e.g. `&{/soc/uart@1000}`.
///
/// The text keeps its leading `&`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhandleRef(String);

impl PhandleRef {
    pub fn from_text(text: &str) -> Option<Self> {
        let rest = text.strip_prefix('&')?;
        let valid = if let Some(path) = rest.strip_prefix('{') {
            path.strip_suffix('}')
                .is_some_and(|path| path.starts_with('/') && !path.contains(['{', '}']))
        } else {
            !rest.is_empty() && rest.chars().all(is_label_char)
        };
        valid.then(|| Self(text.to_owned()))
    }

    /// The reference as written, including the `&`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The label without `&`, or `None` for path references.
    pub fn label(&self) -> Option<&str> {
        let rest = &self.0[1..];
        (!rest.starts_with('{')).then_some(rest)
    }

    /// The path of a path reference, e.g. `/soc/uart@1000`.
    pub fn path(&self) -> Option<&str> {
        self.0[1..].strip_prefix('{')?.strip_suffix('}')
    }
}

impl Display for PhandleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bare preprocessor macro name, e.g. `GPIO_ACTIVE_LOW`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroRef(String);

impl MacroRef {
    pub fn from_text(text: &str) -> Option<Self> {
        is_c_identifier(text).then(|| Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MacroRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parenthesized expression or a macro invocation, captured unevaluated.
///
/// e.g. `(GIC_CPU_MASK_SIMPLE(4) | IRQ_TYPE_LEVEL_LOW)` or `IMX_PAD(1, 2)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroExpression {
    pub text: String,
    /// Identifiers used in the expression, in order of appearance.
    pub macros: Vec<String>,
}

impl MacroExpression {
    /// Captures `text` if it is a parenthesized group, optionally preceded by a macro name.
    ///
    /// Parentheses are only checked for balance, nothing is evaluated.
    pub fn from_text(text: &str) -> Option<Self> {
        let body_start = text.find('(')?;
        let head = &text[..body_start];
        if !(head.is_empty() || is_c_identifier(head)) || !text.ends_with(')') {
            return None;
        }
        if balanced_end(text, body_start) != Some(text.len() - 1) {
            return None;
        }
        Some(Self {
            text: text.to_owned(),
            macros: identifiers(text),
        })
    }
}

impl Display for MacroExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Returns the byte index of the `)` matching the `(` at `open`.
pub(crate) fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in text.char_indices().skip_while(|&(idx, _)| idx < open) {
        match c {
            '(' => depth += 1,
            ')' => {
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

/// C identifiers in `text`, skipping the tails of numeric literals like `0x2f`.
fn identifiers(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c.is_ascii_digit() {
            while chars
                .next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_')
                .is_some()
            {}
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some((idx, c)) =
                chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_')
            {
                end = idx + c.len_utf8();
            }
            out.push(text[start..end].to_owned());
        }
    }
    out
}

/// One element of a `<...>` cell list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellElement {
    Integer(Integer),
    Phandle(PhandleRef),
    Macro(MacroRef),
    Expression(MacroExpression),
}

impl CellElement {
    /// Classifies one whitespace-delimited cell token.
    ///
    /// Tokens starting with a digit must be valid integers. Otherwise a phandle reference is tried
    /// before a bare macro name.
    pub fn from_token(text: &str) -> Result<Self, ValueError> {
        if text.starts_with(|c: char| c.is_ascii_digit()) {
            return Integer::from_text(text).map(Self::Integer);
        }
        if let Some(phandle) = PhandleRef::from_text(text) {
            return Ok(Self::Phandle(phandle));
        }
        if let Some(name) = MacroRef::from_text(text) {
            return Ok(Self::Macro(name));
        }
        if let Some(expr) = MacroExpression::from_text(text) {
            return Ok(Self::Expression(expr));
        }
        Err(ValueError::UnrecognizedCellToken {
            token: text.to_owned(),
            range: TextRange::new(0, text.len()),
        })
    }
}

impl Display for CellElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(int) => int.fmt(f),
            Self::Phandle(phandle) => phandle.fmt(f),
            Self::Macro(name) => name.fmt(f),
            Self::Expression(expr) => expr.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_radix_is_remembered() {
        let hex = Integer::from_text("0x1F").unwrap();
        assert_eq!((hex.value, hex.radix), (31, Radix::Hex));
        let dec = Integer::from_text("31").unwrap();
        assert_eq!((dec.value, dec.radix), (31, Radix::Dec));
        let bin = Integer::from_text("0b11111").unwrap();
        assert_eq!((bin.value, bin.radix), (31, Radix::Bin));

        assert_eq!(hex.to_string(), "0x1F");
        assert_eq!(Integer::from_text("0x0001").unwrap().to_string(), "0x0001");
        assert_eq!(dec.hex_string(), "0x1F");
        assert_eq!(hex.bin_string(), "0b11111");
        assert_eq!(bin.dec_string(), "31");
    }

    #[test]
    fn integer_suffixes() {
        let int = Integer::from_text("0x10ULL").unwrap();
        assert_eq!(int.value, 16);
        assert_eq!(int.literal(), "0x10ULL");
    }

    #[test]
    fn invalid_integers() {
        for text in ["0x", "0xZZ", "0b102", "12ab", "0x+1", "99999999999999999999"] {
            assert!(
                matches!(
                    Integer::from_text(text),
                    Err(ValueError::InvalidNumericLiteral { .. })
                ),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn phandles() {
        let label = PhandleRef::from_text("&gpio2").unwrap();
        assert_eq!(label.label(), Some("gpio2"));
        assert_eq!(label.path(), None);

        let path = PhandleRef::from_text("&{/soc/uart@1000}").unwrap();
        assert_eq!(path.label(), None);
        assert_eq!(path.path(), Some("/soc/uart@1000"));

        assert_eq!(PhandleRef::from_text("gpio2"), None);
        assert_eq!(PhandleRef::from_text("&"), None);
        assert_eq!(PhandleRef::from_text("&a b"), None);
    }

    #[test]
    fn macros() {
        assert!(MacroRef::from_text("GPIO_ACTIVE_LOW").is_some());
        assert!(MacroRef::from_text("_x1").is_some());
        assert!(MacroRef::from_text("1X").is_none());
        assert!(MacroRef::from_text("A-B").is_none());
    }

    #[test]
    fn expressions() {
        let expr = MacroExpression::from_text("(BAZ | 0x2)").unwrap();
        assert_eq!(expr.macros, vec!["BAZ".to_owned()]);

        let nested = MacroExpression::from_text("((A << 2) | (B & 0xff) | c_d)").unwrap();
        assert_eq!(nested.macros, vec!["A", "B", "c_d"]);

        let call = MacroExpression::from_text("IMX_PAD(MUX, 0x1b0b0)").unwrap();
        assert_eq!(call.macros, vec!["IMX_PAD", "MUX"]);

        assert_eq!(MacroExpression::from_text("(A) | (B)"), None);
        assert_eq!(MacroExpression::from_text("(A"), None);
        assert_eq!(MacroExpression::from_text("1(A)"), None);
    }

    #[test]
    fn cell_tokens() {
        assert_eq!(
            CellElement::from_token("&foo").unwrap(),
            CellElement::Phandle(PhandleRef::from_text("&foo").unwrap())
        );
        assert!(matches!(
            CellElement::from_token("BAR").unwrap(),
            CellElement::Macro(_)
        ));
        assert!(matches!(
            CellElement::from_token("0xZZ"),
            Err(ValueError::InvalidNumericLiteral { .. })
        ));
        assert!(matches!(
            CellElement::from_token("'a'"),
            Err(ValueError::UnrecognizedCellToken { .. })
        ));
    }

    #[test]
    fn bytes() {
        assert_eq!(
            Byte::parse_token("0xAA", Radix::Dec).unwrap(),
            vec![Byte::new(0xaa, Radix::Hex)]
        );
        assert_eq!(
            Byte::parse_token("17", Radix::Dec).unwrap(),
            vec![Byte::new(17, Radix::Dec)]
        );
        assert_eq!(
            Byte::parse_token("0a0b", Radix::Hex).unwrap(),
            vec![Byte::new(0x0a, Radix::Hex), Byte::new(0x0b, Radix::Hex)]
        );
        assert!(Byte::parse_token("256", Radix::Dec).is_err());
        assert!(Byte::parse_token("ab", Radix::Dec).is_err());
    }
}
