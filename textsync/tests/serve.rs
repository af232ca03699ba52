use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use textsync::serve::{router, AppState};
use textsync_core::content::Format;
use textsync_core::contract::{EntityKind, MockRemoteClient, RemoteResponse};
use textsync_core::render::DEFAULT_TEMPLATE;
use textsync_core::status::{CollectionStatus, DataStatus, DocumentStatus};

fn record(name: &str, uuid: &str, format_out: Format, deleted: bool) -> DocumentStatus {
    DocumentStatus {
        name: name.into(),
        name_remote: format!("{name}-xyz-{format_out}"),
        uuid: uuid.into(),
        deleted,
        description: format!("{name} description"),
        content_file: format!("{name}.src").into(),
        format_in: format_out,
        format_out,
        tags: Vec::new(),
    }
}

fn status() -> DataStatus {
    let mut documents = BTreeMap::new();
    documents.insert("resume".into(), record("resume", "d-1", Format::Html, false));
    documents.insert("logo".into(), record("logo", "d-2", Format::Svg, false));
    documents.insert("style".into(), record("style", "d-3", Format::Css, false));
    documents.insert("old".into(), record("old", "d-4", Format::Css, true));
    DataStatus {
        identifier: "xyz".into(),
        path_docs: "docs".into(),
        collection: CollectionStatus {
            name: "cv".into(),
            name_remote: "cv-xyz".into(),
            uuid: "c-1".into(),
            deleted: false,
            description: "Curriculum vitae".into(),
            assignments: vec!["d-1".into(), "d-2".into(), "d-3".into()],
        },
        documents,
    }
}

fn stored(uuid: &str, format: &str, content: &str) -> RemoteResponse {
    RemoteResponse::new(
        200,
        json!({"kind": "document", "data": {
            "uuid": uuid,
            "name": "stored",
            "description": "My resume",
            "content": {"text": {"format": format, "content": content, "tags": []}}
        }}),
    )
}

fn app(client: MockRemoteClient) -> axum::Router {
    router(AppState {
        client: Arc::new(client),
        status: Arc::new(status()),
        template: Arc::new(DEFAULT_TEMPLATE.to_string()),
        host: "https://text.example.com".into(),
    })
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn html_document_is_wrapped_in_template() {
    let mut client = MockRemoteClient::new();
    client
        .expect_read()
        .withf(|kind, id| *kind == EntityKind::Document && id.to_string() == "d-1")
        .times(1)
        .returning(|_, id| Ok(stored(id, "html", "<p>Hello</p>")));

    let (status, content_type, body) = get(app(client), "/resume").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/html; charset=utf-8");
    assert!(body.contains("<title>My resume</title>"));
    assert!(body.contains("<p>Hello</p>"));
}

#[tokio::test]
async fn svg_and_text_use_their_media_types() {
    let mut client = MockRemoteClient::new();
    client.expect_read().returning(|_, id| match id {
        "d-2" => Ok(stored(id, "svg", "<svg/>")),
        _ => Ok(stored(id, "css", "body {}")),
    });
    let app = app(client);

    let (status, content_type, body) = get(app.clone(), "/logo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/svg+xml");
    assert_eq!(body, "<svg/>");

    let (status, content_type, body) = get(app, "/style").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/css");
    assert_eq!(body, "body {}");
}

#[tokio::test]
async fn json_route_returns_stored_entity() {
    let mut client = MockRemoteClient::new();
    client
        .expect_read()
        .returning(|_, id| Ok(stored(id, "html", "<p>Hello</p>")));

    let (status, _, body) = get(app(client), "/resume/json").await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["uuid"], "d-1");
    assert_eq!(value["content"]["text"]["format"], "html");
}

#[tokio::test]
async fn unknown_and_destroyed_documents_are_not_fetched() {
    let mut client = MockRemoteClient::new();
    client.expect_read().times(0);
    let app = app(client);

    let (status, _, _) = get(app.clone(), "/cover-letter").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(app, "/old").await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn remote_errors_are_forwarded_with_host() {
    let mut client = MockRemoteClient::new();
    client
        .expect_read()
        .returning(|_, _| Ok(RemoteResponse::new(503, json!({"detail": "maintenance"}))));

    let (status, _, body) = get(app(client), "/resume").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["detail"]["host"], "https://text.example.com");
    assert_eq!(value["detail"]["remote"]["detail"], "maintenance");
}
