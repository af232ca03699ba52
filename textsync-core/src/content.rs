//! Content transform: turns a source file into the payload stored remotely.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ConfigError;
use crate::rst;

/// Largest content body the remote store accepts.
pub const LENGTH_CONTENT: usize = 1 << 18;
/// Most tags a single document may carry.
pub const MAX_TAGS: usize = 8;

/// Text formats known to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Svg,
    Css,
    Html,
    Md,
    Rst,
    #[serde(alias = "tEx")]
    Tex,
    Txt,
    Docs,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Svg => "svg",
            Format::Css => "css",
            Format::Html => "html",
            Format::Md => "md",
            Format::Rst => "rst",
            Format::Tex => "tex",
            Format::Txt => "txt",
            Format::Docs => "docs",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `text` object stored as a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub format: Format,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TextContent {
    /// Wrap as the remote content payload, `{"text": {...}}`.
    pub fn to_payload(&self) -> Value {
        json!({ "text": self })
    }

    /// Extract from a remote content payload.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.get("text")?.clone()).ok()
    }
}

/// Whether `from -> to` is a conversion this system can perform.
pub fn is_supported(from: Format, to: Format) -> bool {
    matches!(
        (from, to),
        (Format::Rst, Format::Rst)
            | (Format::Css, Format::Css)
            | (Format::Svg, Format::Svg)
            | (Format::Rst, Format::Html)
    )
}

/// Convert `source` from `from` to `to`.
pub fn transform(
    source: &str,
    from: Format,
    to: Format,
    tags: &[String],
) -> Result<TextContent, ConfigError> {
    let content = match (from, to) {
        (Format::Rst, Format::Html) => rst::to_html_body(source),
        _ if is_supported(from, to) => source.to_owned(),
        _ => return Err(ConfigError::UnsupportedConversion { from, to }),
    };

    Ok(TextContent {
        format: to,
        content,
        tags: tags.to_vec(),
    })
}

/// Read `path` and transform it. The conversion pair is checked before the
/// file is touched.
pub fn load_content(
    path: &Path,
    from: Format,
    to: Format,
    tags: &[String],
) -> Result<TextContent, ConfigError> {
    if !is_supported(from, to) {
        return Err(ConfigError::UnsupportedConversion { from, to });
    }

    debug!(path = %path.display(), %from, %to, "Building content");
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    transform(&source, from, to, tags)
}
