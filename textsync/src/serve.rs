//! Rendering endpoint.
//!
//! Serves the documents recorded in the status ledger:
//! - `GET /{name}` renders the document by its stored format
//! - `GET /{name}/json` returns the remote entity as stored

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use textsync_core::contract::{RemoteClient, RemoteEntity};
use textsync_core::render::{fetch, render, RenderError};
use textsync_core::status::DataStatus;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn RemoteClient>,
    pub status: Arc<DataStatus>,
    pub template: Arc<String>,
    /// Remote host, reported in error details.
    pub host: String,
}

/// A render failure, carrying the remote host for the error detail.
#[derive(Debug)]
pub struct ServeError {
    error: RenderError,
    host: String,
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.error {
            RenderError::UnknownDocument(_) => (StatusCode::NOT_FOUND, json!(self.error.to_string())),
            RenderError::Destroyed(_) => (StatusCode::GONE, json!(self.error.to_string())),
            RenderError::Remote { status, body } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                json!({
                    "msg": format!("Remote request to {} failed", self.host),
                    "host": self.host,
                    "remote": body,
                }),
            ),
            RenderError::MissingContent(_) | RenderError::Sync(_) => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "msg": self.error.to_string(),
                    "host": self.host,
                }),
            ),
        };
        tracing::warn!(status = %status, error = %self.error, "Render request failed");
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{name}", get(rendered_document))
        .route("/{name}/json", get(document_json))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, documents = state.status.documents.len(), "Serving documents");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn load(state: &AppState, name: &str) -> Result<RemoteEntity, ServeError> {
    fetch(state.client.as_ref(), &state.status, name)
        .await
        .map_err(|error| ServeError {
            error,
            host: state.host.clone(),
        })
}

async fn rendered_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ServeError> {
    let document = load(&state, &name).await?;
    let rendered = render(&document, &state.template).map_err(|error| ServeError {
        error,
        host: state.host.clone(),
    })?;
    tracing::debug!(name = %name, content_type = %rendered.content_type(), "Rendered document");
    Ok((
        [(header::CONTENT_TYPE, rendered.content_type())],
        rendered.into_body(),
    )
        .into_response())
}

async fn document_json(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RemoteEntity>, ServeError> {
    load(&state, &name).await.map(Json)
}
