use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Radix;

/// What to do with a property value that no value grammar accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnclassifiablePolicy {
    /// Fail the whole parse.
    #[default]
    Abort,
    /// Store the raw text as [`PropertyValue::Unparsed`](crate::value::PropertyValue::Unparsed)
    /// and emit a warning.
    KeepRaw,
}

/// Parser options, threaded through every pass.
///
/// ```toml
/// unclassifiable = "keep-raw"
/// bare-byte-radix = "hex"
/// warn-on-conditionals = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParseOptions {
    pub unclassifiable: UnclassifiablePolicy,
    /// Radix of bytestring tokens written without a `0x` prefix.
    pub bare_byte_radix: Radix,
    /// Emit a warning for every `#if`-style directive found inside a node.
    pub warn_on_conditionals: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            unclassifiable: UnclassifiablePolicy::default(),
            bare_byte_radix: Radix::Dec,
            warn_on_conditionals: true,
        }
    }
}

impl ParseOptions {
    /// Loads options from a TOML file
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        toml::from_str(&fs_err::read_to_string(path)?).map_err(OptionsError::Toml)
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read options")]
    Io(#[from] std::io::Error),

    #[error("Failed to deserialize options")]
    Toml(#[from] toml::de::Error),
}
