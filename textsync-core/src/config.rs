use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::{self, Format, TextContent, LENGTH_CONTENT, MAX_TAGS};
use crate::error::ConfigError;

/// Name of the status file, kept next to the documents it describes.
pub const STATUS_FILE_NAME: &str = ".text.status.yaml";

/// A single document to keep in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Relative to `path_docs`, or absolute.
    pub content_file: PathBuf,
    pub description: String,
    pub format_in: Format,
    pub format_out: Format,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentConfig {
    pub fn source_path(&self, path_docs: &Path) -> PathBuf {
        path_docs.join(&self.content_file)
    }

    /// Read and transform the source of document `name`.
    pub fn create_content(&self, name: &str, path_docs: &Path) -> Result<TextContent, ConfigError> {
        let text = content::load_content(
            &self.source_path(path_docs),
            self.format_in,
            self.format_out,
            &self.tags,
        )?;
        if text.content.len() > LENGTH_CONTENT {
            return Err(ConfigError::ContentTooLarge {
                name: name.to_owned(),
                size: text.content.len(),
                limit: LENGTH_CONTENT,
            });
        }
        Ok(text)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !content::is_supported(self.format_in, self.format_out) {
            return Err(ConfigError::UnsupportedConversion {
                from: self.format_in,
                to: self.format_out,
            });
        }
        if self.tags.len() > MAX_TAGS {
            return Err(ConfigError::TooManyTags {
                name: name.to_owned(),
                count: self.tags.len(),
                limit: MAX_TAGS,
            });
        }
        Ok(())
    }
}

/// The collection grouping every document of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Logical name; the remote name has the identifier appended.
    pub name: String,
    pub description: String,
}

/// Desired state: one collection, its documents, and the identifier that
/// namespaces every remote name derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Stable random token; changing it orphans everything created before.
    pub identifier: String,
    pub collection: CollectionConfig,
    pub documents: BTreeMap<String, DocumentConfig>,
    pub path_docs: PathBuf,
    /// Template to render `html` documents into, relative to `path_docs`.
    #[serde(default)]
    pub template_file: Option<PathBuf>,
}

impl DataConfig {
    pub fn get(&self, name: &str) -> Option<&DocumentConfig> {
        self.documents.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&DocumentConfig, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownDocument(name.to_owned()))
    }

    pub fn status_path(&self) -> PathBuf {
        self.path_docs.join(STATUS_FILE_NAME)
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template_file.as_ref().map(|t| self.path_docs.join(t))
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::MissingIdentifier);
        }
        if self.documents.is_empty() {
            return Err(ConfigError::EmptyDocumentSet);
        }
        for (name, document) in &self.documents {
            document.validate(name)?;
        }
        debug!(identifier = %self.identifier, "Configuration validated");
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            identifier = %self.identifier,
            collection = %self.collection.name,
            documents_count = self.documents.len(),
            path_docs = %self.path_docs.display(),
            "Loaded DataConfig"
        );
        debug!(?self, "DataConfig loaded (full debug)");
    }
}
