//! Document-level directives: `/dts-v1/`, `/plugin/` and includes.

use std::borrow::Cow;

use dt_diagnostic::Severity;

use crate::{
    context::Context,
    lexer::{Significant, TokenKind},
    tree::{IncludeDirective, ParseOutcome},
    value::interpret_escaped_string,
    TextRange,
};

/// A line whose first token starts with `#`, e.g. `#ifdef CONFIG_FOO`.
pub(crate) struct PreprocessorLine<'a> {
    /// From the `#` to the end of the line.
    pub(crate) range: TextRange,
    /// The word after `#`, e.g. `ifdef`.
    pub(crate) word: &'a str,
    /// The rest of the line after the word, trimmed.
    pub(crate) rest: &'a str,
}

impl PreprocessorLine<'_> {
    /// Returns true for words cpp acts on, as opposed to properties like `#address-cells`.
    pub(crate) fn is_directive(&self) -> bool {
        matches!(
            self.word,
            "if" | "ifdef"
                | "ifndef"
                | "elif"
                | "else"
                | "endif"
                | "define"
                | "undef"
                | "include"
                | "error"
                | "warning"
                | "pragma"
                | "line"
        )
    }
}

/// Finds preprocessor lines among `toks`. Comments and strings never match.
pub(crate) fn preprocessor_lines<'a>(
    ctx: &Context<'a>,
    toks: &[Significant],
) -> Vec<PreprocessorLine<'a>> {
    let text = ctx.text;
    toks.iter()
        .filter(|tok| tok.text.starts_with('#'))
        .filter_map(|tok| {
            let start = tok.text_range.start;
            let line_start = text[..start].rfind('\n').map_or(0, |idx| idx + 1);
            if !text[line_start..start].trim().is_empty() {
                return None;
            }
            let line_end = text[start..].find('\n').map_or(text.len(), |idx| start + idx);
            let line = text[start..line_end].trim_end();

            let after_hash = line[1..].trim_start_matches([' ', '\t']);
            let word_len = after_hash
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(after_hash.len());
            Some(PreprocessorLine {
                range: TextRange::new(start, start + line.len()),
                word: &after_hash[..word_len],
                rest: after_hash[word_len..].trim(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum IncludeParseError {
    #[error("Nothing after `#include`")]
    NothingAfterInclude,
    #[error("Unexpected character after `#include`")]
    UnexpectedCharacter,
    #[error("Missing string terminator")]
    MissingStringTerminator,
}

/// Parses the text after `#include`.
fn parse_pp_include(
    ctx: &Context,
    line: &PreprocessorLine,
) -> Result<IncludeDirective, IncludeParseError> {
    let s = line.rest;
    let (relative, (path, rest)) = match s
        .as_bytes()
        .first()
        .ok_or(IncludeParseError::NothingAfterInclude)?
    {
        b'<' => (
            false,
            s[1..]
                .split_once('>')
                .ok_or(IncludeParseError::MissingStringTerminator)?,
        ),
        b'"' => (
            true,
            s[1..]
                .split_once('"')
                .ok_or(IncludeParseError::MissingStringTerminator)?,
        ),
        _ => return Err(IncludeParseError::UnexpectedCharacter),
    };

    let rest = rest.trim();
    if !rest.is_empty() && !rest.starts_with("//") && !rest.starts_with("/*") {
        let end = line.range.end;
        ctx.warn(
            TextRange::new(end - rest.len(), end),
            "Unexpected characters after include string",
        );
    }

    Ok(IncludeDirective {
        range: line.range,
        is_preprocessor: true,
        path: path.to_owned(),
        relative,
    })
}

/// Returns true if `toks` starts with `/word/`.
fn is_dts_directive(toks: &[Significant], word: &str) -> bool {
    matches!(
        toks,
        [slash, name, end, ..]
            if slash.kind == TokenKind::Slash
                && name.kind == TokenKind::Ident
                && name.text == word
                && name.joined
                && end.kind == TokenKind::Slash
                && end.joined
    )
}

/// Fills in the document header fields of `outcome`.
pub(crate) fn read_header(ctx: &Context, toks: &[Significant], outcome: &mut ParseOutcome) {
    for (idx, _) in toks
        .iter()
        .enumerate()
        .filter(|(_, tok)| tok.kind == TokenKind::Slash)
    {
        let rest = &toks[idx..];
        if is_dts_directive(rest, "dts-v1") {
            outcome.has_dts_version = true;
        } else if is_dts_directive(rest, "plugin") {
            outcome.is_plugin = true;
        } else if is_dts_directive(rest, "include") {
            let Some(string_tok) = rest.get(3).filter(|tok| tok.kind == TokenKind::String) else {
                ctx.warn(rest[0].text_range.to(rest[2].text_range), "Missing include path");
                continue;
            };
            let inner = &string_tok.text[1..string_tok.text.len() - 1];
            match interpret_escaped_string(inner) {
                Ok(path) => outcome.includes.push(IncludeDirective {
                    range: rest[0].text_range.to(string_tok.text_range),
                    is_preprocessor: false,
                    path,
                    relative: true,
                }),
                Err(err) => ctx.emit(
                    string_tok.text_range,
                    Cow::Owned(err.to_string()),
                    Severity::Error,
                ),
            }
        }
    }

    for line in preprocessor_lines(ctx, toks) {
        if line.word != "include" {
            continue;
        }
        match parse_pp_include(ctx, &line) {
            Ok(include) => outcome.includes.push(include),
            Err(err) => ctx.emit(line.range, Cow::Owned(err.to_string()), Severity::Error),
        }
    }
    outcome.includes.sort_by_key(|include| include.range.start);

    tracing::debug!(
        dts_v1 = outcome.has_dts_version,
        plugin = outcome.is_plugin,
        includes = outcome.includes.len(),
        "read header"
    );
}
