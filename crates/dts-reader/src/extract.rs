//! Property extraction.
//!
//! Re-scans each node's property block for `key = value;` and `key;` statements.

use crate::{
    context::Context,
    error::ParseError,
    header::{preprocessor_lines, PreprocessorLine},
    lexer::{Significant, TokenKind},
    options::UnclassifiablePolicy,
    tree::{ConditionalDirective, ConditionalKind, DeviceTreeNode, ValueRecord},
    value::{classify_with, PropertyValue},
    TextRange,
};

struct Statement<'a> {
    name: &'a str,
    record: ValueRecord,
}

/// Fills in the properties and conditionals of every node.
pub(crate) fn extract_properties(
    ctx: &Context,
    toks: &[Significant],
    nodes: &mut [DeviceTreeNode],
) -> Result<(), ParseError> {
    warn_late_statements(ctx, toks, nodes);

    for node in nodes {
        let _span = tracing::debug_span!("extract", node = %node.full_name()).entered();

        let block = node.property_block_span.range;
        let from = toks.partition_point(|t| t.text_range.start < block.start);
        let to = toks.partition_point(|t| t.text_range.start < block.end);
        let block_toks = &toks[from..to];

        node.conditionals = conditionals(ctx, block_toks);

        for statement in block_toks.split_inclusive(|t| t.kind == TokenKind::Semicolon) {
            let Some((terminator, body)) = statement.split_last() else {
                continue;
            };
            if terminator.kind != TokenKind::Semicolon {
                if let Some(range) = span_of(&without_directive_lines(ctx, statement)) {
                    ctx.warn(range, "Missing `;` after property");
                }
                continue;
            }
            if let Some(Statement { name, record }) = parse_statement(ctx, body)? {
                let key = record.key_span.range;
                node.insert_property(name, record)
                    .map_err(|err| ctx.error(err, key))?;
            }
        }
    }
    Ok(())
}

fn span_of(toks: &[Significant]) -> Option<TextRange> {
    Some(toks.first()?.text_range.to(toks.last()?.text_range))
}

/// Drops the tokens of `#ifdef`-style lines.
fn without_directive_lines<'i>(ctx: &Context, toks: &[Significant<'i>]) -> Vec<Significant<'i>> {
    let lines: Vec<_> = preprocessor_lines(ctx, toks)
        .into_iter()
        .filter(PreprocessorLine::is_directive)
        .map(|line| line.range)
        .collect();
    toks.iter()
        .filter(|tok| !lines.iter().any(|line| line.contains_range(tok.text_range)))
        .copied()
        .collect()
}

/// Warns about statements between a node's children or after its last child.
///
/// Only the property block before the first child is read, so these would otherwise be lost
/// silently.
fn warn_late_statements(ctx: &Context, toks: &[Significant], nodes: &[DeviceTreeNode]) {
    for node in nodes {
        // Each gap starts at the `};` closing the previous child
        let mut gaps = Vec::with_capacity(node.children.len());
        for pair in node.children.windows(2) {
            let (prev, next) = (&nodes[pair[0].index()], &nodes[pair[1].index()]);
            gaps.push(TextRange::new(
                prev.node_span.range.end,
                next.header_span.range.start,
            ));
        }
        if let Some(last) = node.children.last() {
            gaps.push(TextRange::new(
                nodes[last.index()].node_span.range.end,
                node.node_span.range.end,
            ));
        }

        for gap in gaps {
            let from = toks.partition_point(|t| t.text_range.start < gap.start);
            let to = toks.partition_point(|t| t.text_range.start < gap.end);
            let gap_toks = match &toks[from..to] {
                [close, semicolon, rest @ ..]
                    if close.kind == TokenKind::RCurly && semicolon.kind == TokenKind::Semicolon =>
                {
                    rest
                }
                other => other,
            };

            let gap_toks = without_directive_lines(ctx, gap_toks);
            for statement in gap_toks.split_inclusive(|t| t.kind == TokenKind::Semicolon) {
                if has_directive(statement) {
                    continue;
                }
                if let Some(range) = span_of(statement) {
                    ctx.warn(
                        range,
                        format!(
                            "Statement after a child node of `{}` is not read",
                            node.full_name()
                        ),
                    );
                }
            }
        }
    }
}

/// Returns true if `toks` contains `/word/`, e.g. `/delete-property/`.
fn has_directive(toks: &[Significant]) -> bool {
    toks.windows(3).any(|w| {
        w[0].kind == TokenKind::Slash
            && w[1].kind == TokenKind::Ident
            && w[1].joined
            && w[2].kind == TokenKind::Slash
            && w[2].joined
    })
}

fn parse_statement<'a>(
    ctx: &Context<'a>,
    body: &[Significant],
) -> Result<Option<Statement<'a>>, ParseError> {
    let (Some(first), Some(last)) = (body.first(), body.last()) else {
        return Ok(None);
    };
    let whole = first.text_range.to(last.text_range);

    let eq = body.iter().position(|t| t.kind == TokenKind::Equals);
    let key_end = eq.unwrap_or(body.len());
    let Some(last_key) = key_end
        .checked_sub(1)
        .filter(|&idx| body[idx].kind.is_name_part())
    else {
        if !has_directive(body) {
            ctx.warn(whole, "Statement is neither a property nor a directive");
        }
        return Ok(None);
    };

    let mut key_start = last_key;
    while key_start > 0 && body[key_start].joined && body[key_start - 1].kind.is_name_part() {
        key_start -= 1;
    }

    let prefix = &body[..key_start];
    if has_directive(prefix) {
        tracing::trace!(statement = ctx.slice(whole), "skipping directive");
        return Ok(None);
    }
    if eq.is_none()
        && prefix
            .last()
            .is_some_and(|t| t.kind == TokenKind::Ampersand && body[key_start].joined)
    {
        ctx.warn(whole, "Reference outside of a property value");
        return Ok(None);
    }
    if let (Some(first), Some(last)) = (prefix.first(), prefix.last()) {
        tracing::debug!(
            skipped = ctx.slice(first.text_range.to(last.text_range)),
            "ignoring tokens before property"
        );
    }

    let key = body[key_start].text_range.to(body[last_key].text_range);
    let name = ctx.slice(key);

    let (value, value_range) = match eq {
        Some(eq) => {
            let value_range = match &body[eq + 1..] {
                [] => TextRange::empty(body[eq].text_range.end),
                [first, .., last] => first.text_range.to(last.text_range),
                [only] => only.text_range,
            };
            let text = ctx.slice(value_range);
            let value = match classify_with(text, ctx.options) {
                Ok(value) => value,
                Err(err) => match ctx.options.unclassifiable {
                    UnclassifiablePolicy::Abort => {
                        return Err(ctx.error(err.offset(value_range.start), value_range));
                    }
                    UnclassifiablePolicy::KeepRaw => {
                        ctx.warn(value_range, format!("Keeping `{name}` unparsed: {err}"));
                        PropertyValue::Unparsed(text.to_owned())
                    }
                },
            };
            (value, value_range)
        }
        None => (PropertyValue::Marker, key),
    };

    tracing::debug!(property = name, kind = %value.kind(), "extracted property");
    Ok(Some(Statement {
        name,
        record: ValueRecord {
            value,
            source: ctx.source.clone(),
            lines: ctx.index.lines(key.to(value_range)),
            key_span: ctx.span(key),
            value_span: ctx.span(value_range),
        },
    }))
}

fn conditionals(ctx: &Context, toks: &[Significant]) -> Vec<ConditionalDirective> {
    preprocessor_lines(ctx, toks)
        .into_iter()
        .filter_map(|line| {
            let kind = ConditionalKind::from_directive(line.word)?;
            let directive = ConditionalDirective {
                kind,
                expression: line.rest.to_owned(),
                line: ctx.index.line(line.range.start),
                range: line.range,
            };
            if ctx.options.warn_on_conditionals {
                ctx.warn(
                    line.range,
                    format!("`{kind}` is not evaluated, both branches are read"),
                );
            }
            Some(directive)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{options::ParseOptions, tree::SourceId, value::ValueKind};
    use dt_diagnostic::{line_index::LineIndex, Diagnostic};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn statements(body: &str, options: &ParseOptions) -> (Vec<(String, ValueKind)>, usize) {
        let source = SourceId::from("test.dts");
        let index = LineIndex::new(body);
        let diag = Mutex::new(Vec::<Diagnostic>::new());
        let ctx = Context {
            source: &source,
            text: body,
            index: &index,
            options,
            diag: &diag,
        };
        let tokens: Vec<_> = crate::lexer::Lexer::new(body).collect();
        let toks = crate::lexer::significant(&tokens).unwrap();

        let out = toks
            .split_inclusive(|t| t.kind == TokenKind::Semicolon)
            .filter_map(|stmt| parse_statement(&ctx, &stmt[..stmt.len() - 1]).unwrap())
            .map(|stmt| (stmt.name.to_owned(), stmt.record.value.kind()))
            .collect();
        (out, diag.into_inner().unwrap().len())
    }

    #[test]
    fn statement_shapes() {
        let (found, warnings) = statements(
            "compatible = \"a\", \"b\";\n\
             gpio-controller;\n\
             /delete-property/ status;\n\
             #gpio-cells = <2>;\n\
             empty-string = \"\";\n",
            &ParseOptions::default(),
        );
        assert_eq!(
            found,
            vec![
                ("compatible".to_owned(), ValueKind::StringList),
                ("gpio-controller".to_owned(), ValueKind::Marker),
                ("#gpio-cells".to_owned(), ValueKind::Cells),
                ("empty-string".to_owned(), ValueKind::String),
            ]
        );
        assert_eq!(warnings, 0);
    }

    #[test]
    fn conditional_lines_are_skipped_over() {
        let (found, _) = statements(
            "#ifdef CONFIG_FOO\n\tfoo = <1>;\n#else\n\tbar;\n#endif\n",
            &ParseOptions::default(),
        );
        assert_eq!(
            found,
            vec![
                ("foo".to_owned(), ValueKind::Cells),
                ("bar".to_owned(), ValueKind::Marker),
            ]
        );
    }

    #[test]
    fn keep_raw() {
        let options = ParseOptions {
            unclassifiable: UnclassifiablePolicy::KeepRaw,
            ..ParseOptions::default()
        };
        let (found, warnings) = statements("clocks = /bits/ 8 <1>;", &options);
        assert_eq!(found, vec![("clocks".to_owned(), ValueKind::Unparsed)]);
        assert_eq!(warnings, 1);
    }
}
