//! # HTTP client for the remote document store
//!
//! Implements [`RemoteClient`] over `reqwest` against the live API.
//!
//! - Construct [`HttpClient`] with [`HttpClient::new_from_env`] (`TEXTSYNC_HOST`,
//!   `TEXTSYNC_TOKEN`, `TEXTSYNC_USER`).
//! - Every call returns the reply status and JSON body untouched; deciding
//!   whether a status is acceptable is left to the core.

use std::env;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};

use textsync_core::contract::{
    ClientError, EntityKind, EntityPatch, NewEntity, RemoteClient, RemoteResponse,
};

pub const ENV_HOST: &str = "TEXTSYNC_HOST";
pub const ENV_TOKEN: &str = "TEXTSYNC_TOKEN";
pub const ENV_USER: &str = "TEXTSYNC_USER";

/// Non-secret connection settings, as printed by `textsync config --client`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSettings {
    pub host: String,
    pub owner: String,
    pub token_set: bool,
}

pub struct HttpClient {
    http: reqwest::Client,
    host: String,
    token: String,
    owner: String,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>, owner: impl Into<String>) -> Self {
        let host: String = host.into();
        HttpClient {
            http: reqwest::Client::new(),
            host: host.trim_end_matches('/').to_string(),
            token: token.into(),
            owner: owner.into(),
        }
    }

    /// Reads the process environment only; `.env` is loaded once, by the binary.
    pub fn new_from_env() -> Result<Self, ClientError> {
        match (env::var(ENV_HOST), env::var(ENV_TOKEN), env::var(ENV_USER)) {
            (Ok(host), Ok(token), Ok(owner)) => {
                tracing::info!(
                    host = %host,
                    owner = %owner,
                    token_set = !token.is_empty(),
                    "Initialized HttpClient from environment"
                );
                Ok(HttpClient::new(host, token, owner))
            }
            (Err(e), _, _) => {
                tracing::error!(error = ?e, "{ENV_HOST} missing in environment");
                Err(format!("{ENV_HOST} is not set").into())
            }
            (_, Err(e), _) => {
                tracing::error!(error = ?e, "{ENV_TOKEN} missing in environment");
                Err(format!("{ENV_TOKEN} is not set").into())
            }
            (_, _, Err(e)) => {
                tracing::error!(error = ?e, "{ENV_USER} missing in environment");
                Err(format!("{ENV_USER} is not set").into())
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn settings(&self) -> ClientSettings {
        ClientSettings {
            host: self.host.clone(),
            owner: self.owner.clone(),
            token_set: !self.token.is_empty(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.host, path))
            .bearer_auth(&self.token)
    }

    async fn send(&self, operation: &str, req: RequestBuilder) -> Result<RemoteResponse, ClientError> {
        let res = req.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Request to remote failed");
            e
        })?;
        let status = res.status().as_u16();
        let text = res.text().await?;
        // Error pages are not always JSON; keep them readable.
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        tracing::debug!(operation, status, "Remote replied");
        Ok(RemoteResponse::new(status, body))
    }
}

fn uuid_document_query(document_ids: &[String]) -> Vec<(&'static str, &str)> {
    document_ids
        .iter()
        .map(|id| ("uuid_document", id.as_str()))
        .collect()
}

#[async_trait]
impl RemoteClient for HttpClient {
    fn owner(&self) -> String {
        self.owner.clone()
    }

    async fn search(
        &self,
        owner: &str,
        kind: EntityKind,
        name_like: &str,
    ) -> Result<RemoteResponse, ClientError> {
        tracing::info!(%kind, owner, name_like, "Searching remote entities");
        let req = self
            .request(Method::GET, &format!("/users/{owner}/{}", kind.plural()))
            .query(&[("name_like", name_like)]);
        self.send("search", req).await
    }

    async fn create<'a>(&self, req: NewEntity<'a>) -> Result<RemoteResponse, ClientError> {
        tracing::info!(kind = %req.kind, name = req.name, "Creating remote entity");
        let mut body = json!({
            "name": req.name,
            "description": req.description,
            "public": req.public,
        });
        if let Some(content) = req.content {
            body["content"] = content.clone();
        }
        let http = self
            .request(Method::POST, &format!("/{}", req.kind.plural()))
            .json(&body);
        self.send("create", http).await
    }

    async fn read(&self, kind: EntityKind, id: &str) -> Result<RemoteResponse, ClientError> {
        let req = self.request(Method::GET, &format!("/{}/{id}", kind.plural()));
        self.send("read", req).await
    }

    async fn update<'a>(
        &self,
        kind: EntityKind,
        id: &str,
        patch: EntityPatch<'a>,
    ) -> Result<RemoteResponse, ClientError> {
        tracing::info!(%kind, id, "Updating remote entity");
        let mut body = serde_json::Map::new();
        if let Some(name) = patch.name {
            body.insert("name".into(), Value::from(name));
        }
        if let Some(description) = patch.description {
            body.insert("description".into(), Value::from(description));
        }
        if let Some(content) = patch.content {
            body.insert("content".into(), content.clone());
        }
        let req = self
            .request(Method::PATCH, &format!("/{}/{id}", kind.plural()))
            .json(&body);
        self.send("update", req).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<RemoteResponse, ClientError> {
        tracing::info!(%kind, id, "Deleting remote entity");
        let req = self.request(Method::DELETE, &format!("/{}/{id}", kind.plural()));
        self.send("delete", req).await
    }

    async fn create_assignments(
        &self,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<RemoteResponse, ClientError> {
        tracing::info!(
            collection_id,
            count = document_ids.len(),
            "Creating assignments"
        );
        let req = self
            .request(
                Method::POST,
                &format!("/assignments/collections/{collection_id}/documents"),
            )
            .query(&uuid_document_query(document_ids));
        self.send("create_assignments", req).await
    }

    async fn read_assignments(
        &self,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<RemoteResponse, ClientError> {
        let req = self
            .request(
                Method::GET,
                &format!("/assignments/collections/{collection_id}/documents"),
            )
            .query(&uuid_document_query(document_ids));
        self.send("read_assignments", req).await
    }
}
