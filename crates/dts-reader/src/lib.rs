//! Span-preserving Device Tree Source reader.
//!
//! Parses one DTS/DTSI buffer into a tree of nodes with classified property values, keeping the
//! byte and line span of every node and every property assignment.
//!
//! ```
//! use dts_reader::value::PropertyValue;
//!
//! let outcome = dts_reader::parse(r#"/ { a { x = "s"; }; b@0 { }; };"#, "board.dts").unwrap();
//! let root = outcome.root().unwrap();
//! let a = outcome.child(root, "a").unwrap();
//! assert_eq!(
//!     outcome[a].property("x").unwrap().value(),
//!     &PropertyValue::String("s".to_owned())
//! );
//! assert_eq!(outcome.path(outcome.child(root, "b@0").unwrap()), "/b@0");
//! ```

use dt_diagnostic::{line_index::LineIndex, DiagnosticCollector, TracingCollector};

mod builder;
mod context;
pub mod error;
mod extract;
mod header;
mod lexer;
pub mod options;
pub mod registry;
pub mod scanner;
pub mod source;
mod span;
pub mod tree;
pub mod value;

pub use dt_diagnostic::text_range::TextRange;
pub use error::{ParseError, ParseErrorKind, PropertyError, ReadError, ScanError, ScopeImbalance};
pub use lexer::LexError;
pub use options::{ParseOptions, UnclassifiablePolicy};
pub use registry::{NodeRef, TreeRegistry};
pub use source::{parse_file, parse_files, SourceKind};
pub use span::SourceSpan;
pub use tree::{
    ConditionalDirective, ConditionalKind, DeviceTreeNode, DeviceTreeProperty, IncludeDirective,
    NodeId, ParseOutcome, SourceId, ValueRecord,
};

use crate::{context::Context, lexer::Lexer, scanner::Scanner};

/// Parses a buffer with the default options, logging diagnostics through [`tracing`].
pub fn parse(text: &str, source: impl Into<SourceId>) -> Result<ParseOutcome, ParseError> {
    parse_with(text, source, &ParseOptions::default(), &TracingCollector)
}

/// Parses a buffer.
///
/// `source` only tags spans and diagnostics, nothing is opened. Warnings go to `diag`; the first
/// fatal error aborts the parse and no tree is returned.
pub fn parse_with(
    text: &str,
    source: impl Into<SourceId>,
    options: &ParseOptions,
    diag: &dyn DiagnosticCollector,
) -> Result<ParseOutcome, ParseError> {
    let source: SourceId = source.into();
    let _span = tracing::info_span!("parse", source = %source).entered();

    let index = LineIndex::new(text);
    let ctx = Context {
        source: &source,
        text,
        index: &index,
        options,
        diag,
    };

    let tokens: Vec<_> = Lexer::new(text).collect();
    let toks = lexer::significant(&tokens).map_err(|(error, range)| {
        ctx.error(ScanError::Lex { error, range }, range)
    })?;

    let root_missing = TextRange::empty(0);
    let scanner = Scanner::new(&ctx, text, &toks).map_err(|err| ctx.error(err, root_missing))?;
    let built = builder::build(&ctx, scanner).map_err(|err| ctx.error(err, root_missing))?;

    let mut outcome = ParseOutcome::new(source.clone(), built.nodes, built.roots);
    extract::extract_properties(&ctx, &toks, outcome.nodes_mut())?;
    header::read_header(&ctx, &toks, &mut outcome);

    tracing::debug!(nodes = outcome.len(), "parsed");
    Ok(outcome)
}
