//! Rendering view: resolve a logical document name through the ledger, fetch
//! its content, and shape it for serving.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::content::{Format, TextContent};
use crate::contract::{check_status, EntityKind, Envelope, RemoteClient, RemoteEntity, EXPECT_READ};
use crate::error::SyncError;
use crate::rst::escape;
use crate::status::DataStatus;

/// Used when the configuration names no template. `{title}` and `{body}` are
/// substituted.
pub const DEFAULT_TEMPLATE: &str = r#"<html>
  <head>
    <link rel="stylesheet" type="text/css" href="/index.css">
    <title>{title}</title>
  </head>
  <body>
    {body}
  </body>
</html>
"#;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No such document `{0}`")]
    UnknownDocument(String),

    #[error("Document `{0}` was destroyed")]
    Destroyed(String),

    #[error("Remote returned status {status}")]
    Remote { status: u16, body: Value },

    #[error("Document `{0}` has no text content")]
    MissingContent(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// A document ready to serve.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Wrapped in the page template.
    Html(String),
    Svg(String),
    Text { format: Format, content: String },
}

impl Rendered {
    pub fn content_type(&self) -> String {
        match self {
            Rendered::Html(_) => "text/html; charset=utf-8".to_string(),
            Rendered::Svg(_) => "image/svg+xml".to_string(),
            Rendered::Text { format, .. } => format!("text/{format}"),
        }
    }

    pub fn into_body(self) -> String {
        match self {
            Rendered::Html(body) | Rendered::Svg(body) => body,
            Rendered::Text { content, .. } => content,
        }
    }
}

/// Look `name` up in `status` and read the recorded document remotely.
pub async fn fetch<C>(client: &C, status: &DataStatus, name: &str) -> Result<RemoteEntity, RenderError>
where
    C: RemoteClient + ?Sized,
{
    let record = status
        .get(name)
        .ok_or_else(|| RenderError::UnknownDocument(name.to_owned()))?;
    if record.deleted {
        return Err(RenderError::Destroyed(name.to_owned()));
    }

    debug!(name, uuid = %record.uuid, "Fetching document for rendering");
    let res = client
        .read(EntityKind::Document, &record.uuid)
        .await
        .map_err(|e| SyncError::transport("read", e))?;
    if !(200..300).contains(&res.status) {
        error!(name, status = res.status, "Remote refused document read");
        return Err(RenderError::Remote {
            status: res.status,
            body: res.body,
        });
    }
    let found: Envelope<RemoteEntity> = check_status("read", res, EXPECT_READ)?;
    Ok(found.data)
}

/// Shape `document` by its stored format.
pub fn render(document: &RemoteEntity, template: &str) -> Result<Rendered, RenderError> {
    let text = document
        .content
        .as_ref()
        .and_then(TextContent::from_payload)
        .ok_or_else(|| RenderError::MissingContent(document.name.clone()))?;

    Ok(match text.format {
        Format::Html => Rendered::Html(fill_template(
            template,
            &escape(&document.description),
            &text.content,
        )),
        Format::Svg => Rendered::Svg(text.content),
        format => Rendered::Text {
            format,
            content: text.content,
        },
    })
}

/// Substitute `{title}` and `{body}` in one left-to-right pass, so text taken
/// from either value is never substituted again.
fn fill_template(template: &str, title: &str, body: &str) -> String {
    let mut out = String::with_capacity(template.len() + title.len() + body.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{title}") {
            out.push_str(title);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{body}") {
            out.push_str(body);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
