//! Error taxonomy for reconciliation passes.
//!
//! Every failure is fatal for the pass it occurs in; nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

use crate::content::Format;
use crate::contract::{ClientError, EntityKind};

/// Problems with the desired-state configuration. These are always reported
/// before any remote call is issued.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported conversion `{from} -> {to}`")]
    UnsupportedConversion { from: Format, to: Format },

    #[error("Failed to read source '{path}': {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration is missing an identifier")]
    MissingIdentifier,

    #[error("Configuration declares no documents")]
    EmptyDocumentSet,

    #[error("No such document `{0}`")]
    UnknownDocument(String),

    #[error("Content of `{name}` is {size} bytes, the limit is {limit}")]
    ContentTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    #[error("Document `{name}` has {count} tags, at most {limit} are allowed")]
    TooManyTags {
        name: String,
        count: usize,
        limit: usize,
    },

    #[error("Identifier changed from `{recorded}` to `{configured}`; remote entities would be orphaned")]
    IdentifierChanged { recorded: String, configured: String },
}

/// Errors reading or writing the status file.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read status file '{path}': {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse status file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize status: {0}")]
    SerializeError(#[source] serde_yaml::Error),

    #[error("Failed to write status file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error of a reconciliation pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discovery of {kind} `{pattern}` matched {count} entities; resolve the naming collision by hand")]
    AmbiguousDiscovery {
        kind: EntityKind,
        pattern: String,
        count: usize,
    },

    #[error("Remote rejected {operation}: expected status {expected}, got {status}: {detail}")]
    RemoteRejection {
        operation: &'static str,
        expected: u16,
        status: u16,
        detail: String,
    },

    #[error("Remote call {operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("No status yet. Run `up` first.")]
    StatusUnavailable,

    #[error("`{operation}` cannot filter by names")]
    PartialFilterUnsupported { operation: &'static str },

    #[error("{kind} `{name}` was already destroyed")]
    AlreadyDestroyed { kind: EntityKind, name: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SyncError {
    pub(crate) fn transport(operation: &'static str, source: ClientError) -> Self {
        SyncError::Transport { operation, source }
    }
}
