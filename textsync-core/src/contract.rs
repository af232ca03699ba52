//! # contract: the remote document-store facade
//!
//! This module defines the single trait ([`RemoteClient`]) through which every
//! reconciliation step talks to the remote store, plus the payload types it
//! exchanges. The trait is deliberately thin: each call hands back the raw
//! HTTP-style status and JSON body, and the caller decides which status it
//! expects (see [`check_status`]).
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests script remote replies and
//!   assert exact call counts (e.g. zero creates on an idempotent re-run).
//!
//! ## Implementors
//! - The CLI crate provides a `reqwest` client against the live API.

use std::fmt;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Error type for facade calls that never produced a response.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

pub const EXPECT_READ: u16 = 200;
pub const EXPECT_UPDATE: u16 = 200;
pub const EXPECT_DELETE: u16 = 200;
pub const EXPECT_CREATE: u16 = 201;

/// The two kinds of remote entity this system manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Document,
    Collection,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Document => "document",
            EntityKind::Collection => "collection",
        }
    }

    /// Path segment used by the remote API for this kind.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Document => "documents",
            EntityKind::Collection => "collections",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw reply from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Every payload from the remote store is wrapped as `{kind, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub kind: Option<String>,
    pub data: T,
}

/// Search replies carry `kind: null` (and possibly no data) when nothing matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub kind: Option<String>,
    pub data: Option<Vec<RemoteEntity>>,
}

/// A document or collection as the remote store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub content: Option<Value>,
}

/// A link between one collection and one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub uuid_collection: String,
    pub uuid_document: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Data needed to create a document or collection.
#[derive(Debug)]
pub struct NewEntity<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    pub description: &'a str,
    /// Stored content; collections have none.
    pub content: Option<&'a Value>,
    pub public: bool,
}

/// Partial update of an existing entity. `None` fields are left alone.
#[derive(Debug, Default)]
pub struct EntityPatch<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub content: Option<&'a Value>,
}

/// Facade over the remote document store.
///
/// Implementations only move bytes: a non-2xx reply is still `Ok` with its
/// status, and `Err` is reserved for calls that never got a reply.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Account that owns everything this client creates; searches are scoped to it.
    fn owner(&self) -> String;

    /// Search the owner's entities of `kind` whose name is like `name_like`.
    async fn search(
        &self,
        owner: &str,
        kind: EntityKind,
        name_like: &str,
    ) -> Result<RemoteResponse, ClientError>;

    async fn create<'a>(&self, req: NewEntity<'a>) -> Result<RemoteResponse, ClientError>;

    async fn read(&self, kind: EntityKind, id: &str) -> Result<RemoteResponse, ClientError>;

    async fn update<'a>(
        &self,
        kind: EntityKind,
        id: &str,
        patch: EntityPatch<'a>,
    ) -> Result<RemoteResponse, ClientError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<RemoteResponse, ClientError>;

    /// Link documents to a collection. Links that already exist are not an error.
    async fn create_assignments(
        &self,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<RemoteResponse, ClientError>;

    async fn read_assignments(
        &self,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<RemoteResponse, ClientError>;
}

/// Assert the reply status and decode the body into `T`.
///
/// Both a status mismatch and a body that does not fit `T` are remote
/// rejections.
pub fn check_status<T: DeserializeOwned>(
    operation: &'static str,
    res: RemoteResponse,
    expected: u16,
) -> Result<T, SyncError> {
    if res.status != expected {
        tracing::error!(
            operation,
            expected,
            status = res.status,
            body = %res.body,
            "Unexpected status from remote"
        );
        return Err(SyncError::RemoteRejection {
            operation,
            expected,
            status: res.status,
            detail: res.body.to_string(),
        });
    }

    serde_json::from_value(res.body).map_err(|e| {
        tracing::error!(operation, error = %e, "Remote payload did not match expected shape");
        SyncError::RemoteRejection {
            operation,
            expected,
            status: res.status,
            detail: format!("payload mismatch: {e}"),
        }
    })
}
