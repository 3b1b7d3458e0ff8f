//! Reading sources from disk.

use std::path::Path;

use dt_diagnostic::DiagnosticCollector;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{error::ReadError, options::ParseOptions, parse_with, tree::ParseOutcome};

/// Kind of a device tree related file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `.dts` or `.dtso`
    Dts,
    /// `.dtsi`
    Dtsi,
    /// `.h`, usually included for macro definitions
    Header,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        Some(match path.extension()?.to_str()? {
            "dts" | "dtso" => Self::Dts,
            "dtsi" => Self::Dtsi,
            "h" => Self::Header,
            _ => return None,
        })
    }
}

/// Reads and parses one file.
pub fn parse_file(
    path: &Path,
    options: &ParseOptions,
    diag: &dyn DiagnosticCollector,
) -> Result<ParseOutcome, ReadError> {
    let metadata = match fs_err::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReadError::FileNotFound(path.to_owned()));
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_file() {
        return Err(ReadError::NotAFile(path.to_owned()));
    }

    tracing::debug!(path = %path.display(), kind = ?SourceKind::from_path(path), "reading source");
    let text = fs_err::read_to_string(path)?;
    Ok(parse_with(&text, path.display().to_string(), options, diag)?)
}

/// Parses independent files in parallel.
///
/// Results are in the same order as `paths`.
pub fn parse_files<P: AsRef<Path> + Sync>(
    paths: &[P],
    options: &ParseOptions,
    diag: &(dyn DiagnosticCollector + Sync),
) -> Vec<Result<ParseOutcome, ReadError>> {
    // Passthrough the span to the Rayon worker threads
    let span = tracing::Span::current();

    paths
        .par_iter()
        .map(|path| {
            let _span = span.clone().entered();
            parse_file(path.as_ref(), options, diag)
        })
        .collect()
}
