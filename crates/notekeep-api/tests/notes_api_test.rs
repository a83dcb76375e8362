//! HTTP contract tests for the notes API.
//!
//! Requests go through the full router (middleware included) with
//! `tower::ServiceExt::oneshot`; storage is in memory.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use notekeep_api::config::{ServerConfig, StorageBackendKind};
use notekeep_api::services::NoteService;
use notekeep_api::{router, AppState};
use notekeep_core::{Error, Note, NoteRepository, Result};
use notekeep_db::test_fixtures::{pdf_bytes, png_bytes};
use notekeep_db::InMemoryAttachmentStore;

const BOUNDARY: &str = "notekeep-test-boundary";
const MIB: usize = 1024 * 1024;

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn form_request(method: Method, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn test_config() -> ServerConfig {
    ServerConfig {
        storage_backend: StorageBackendKind::Memory,
        ..ServerConfig::default()
    }
}

fn app_with(service: NoteService) -> Router {
    router(AppState::new(service, test_config()).unwrap())
}

fn app() -> Router {
    app_with(NoteService::in_memory())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn create(app: &Router, parts: &[Part<'_>]) -> Value {
    let (status, json) = send_json(app, form_request(Method::POST, "/api/notes", parts)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    json
}

#[tokio::test]
async fn test_health() {
    let (status, json) = send_json(&app(), empty_request(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory");
}

#[tokio::test]
async fn test_create_with_image_returns_view() {
    let app = app();
    let png = png_bytes(2 * MIB);
    let json = create(
        &app,
        &[
            Part::Text("title", "Groceries"),
            Part::Text("content", "milk, eggs"),
            Part::File {
                filename: "list.png",
                content_type: "image/png",
                data: &png,
            },
        ],
    )
    .await;

    assert_eq!(json["title"], "Groceries");
    assert_eq!(json["content"], "milk, eggs");
    assert_eq!(json["hasFile"], true);
    assert_eq!(json["fileName"], "list.png");
    assert_eq!(json["fileType"], "image/png");
    assert_eq!(json["fileSize"], 2 * MIB);
    assert_eq!(json["previewable"], true);
    assert_eq!(json["createdAt"], json["updatedAt"]);
    let id = json["id"].as_str().unwrap();
    assert_eq!(json["attachmentUrl"], format!("/api/notes/{}/file", id));
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_create_without_file_and_content() {
    let json = create(&app(), &[Part::Text("title", "Bare")]).await;
    assert_eq!(json["content"], "");
    assert_eq!(json["hasFile"], false);
    assert_eq!(json["previewable"], false);
    assert!(json["attachmentUrl"].is_null());
}

#[tokio::test]
async fn test_empty_file_part_counts_as_no_file() {
    let json = create(
        &app(),
        &[
            Part::Text("title", "No file chosen"),
            Part::File {
                filename: "",
                content_type: "application/octet-stream",
                data: b"",
            },
        ],
    )
    .await;
    assert_eq!(json["hasFile"], false);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let app = app();

    let (status, json) = send_json(
        &app,
        form_request(Method::POST, "/api/notes", &[Part::Text("content", "no title")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");
    assert_eq!(json["retryable"], false);

    let (status, json) = send_json(
        &app,
        form_request(Method::POST, "/api/notes", &[Part::Text("title", "   ")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");

    let long_title = "x".repeat(201);
    let (status, _) = send_json(
        &app,
        form_request(Method::POST, "/api/notes", &[Part::Text("title", &long_title)]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_rejects_non_multipart_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/notes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title":"json"}"#))
        .unwrap();
    let (status, json) = send_json(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");
}

#[tokio::test]
async fn test_oversized_file_is_rejected_and_nothing_stored() {
    let app = app();
    let pdf = pdf_bytes(6 * MIB);
    let (status, json) = send_json(
        &app,
        form_request(
            Method::POST,
            "/api/notes",
            &[
                Part::Text("title", "Resume"),
                Part::File {
                    filename: "resume.pdf",
                    content_type: "application/pdf",
                    data: &pdf,
                },
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["kind"], "payload_too_large");
    assert_eq!(json["retryable"], false);

    let (_, list) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_oversized_body_with_content_length_gets_json_error() {
    let app = app();
    let pdf = pdf_bytes(7 * MIB);
    let body = multipart_body(&[
        Part::Text("title", "Resume"),
        Part::File {
            filename: "resume.pdf",
            content_type: "application/pdf",
            data: &pdf,
        },
    ]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/notes")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], "payload_too_large");

    let (_, list) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_interrupted_upload_is_retryable() {
    let app = app();
    let mut head = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nPartial\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.png\"\r\n\
         Content-Type: image/png\r\n\r\n",
        b = BOUNDARY
    )
    .into_bytes();
    head.extend_from_slice(&png_bytes(1024));

    let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from(head)),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        )),
    ];
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/notes")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();

    let (status, json) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "storage_failure");
    assert_eq!(json["retryable"], true);

    let (_, list) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_nul_in_title_is_invalid_argument() {
    let (status, json) = send_json(
        &app(),
        form_request(Method::POST, "/api/notes", &[Part::Text("title", "Groceries\0")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");
}

#[tokio::test]
async fn test_get_unknown_or_malformed_id_is_not_found() {
    let app = app();
    let (status, json) = send_json(
        &app,
        empty_request(Method::GET, &format!("/api/notes/{}", Uuid::now_v7())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, _) = send_json(&app, empty_request(Method::GET, "/api/notes/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_is_most_recently_updated_first() {
    let app = app();
    let a = create(&app, &[Part::Text("title", "A")]).await;
    create(&app, &[Part::Text("title", "B")]).await;
    create(&app, &[Part::Text("title", "C")]).await;

    let (status, _) = send_json(
        &app,
        form_request(
            Method::PUT,
            &format!("/api/notes/{}", a["id"].as_str().unwrap()),
            &[Part::Text("title", "A"), Part::Text("content", "touched")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, list) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["A", "C", "B"]);
}

#[tokio::test]
async fn test_update_keep_replace_and_remove() {
    let app = app();
    let png = png_bytes(1024);
    let created = create(
        &app,
        &[
            Part::Text("title", "Photo"),
            Part::File {
                filename: "photo.png",
                content_type: "image/png",
                data: &png,
            },
        ],
    )
    .await;
    let uri = format!("/api/notes/{}", created["id"].as_str().unwrap());

    // No file and no removal signal keeps the attachment
    let (status, kept) = send_json(
        &app,
        form_request(Method::PUT, &uri, &[Part::Text("title", "Photo (kept)")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["hasFile"], true);
    assert_eq!(kept["fileName"], "photo.png");
    assert_eq!(kept["createdAt"], created["createdAt"]);
    assert_ne!(kept["updatedAt"], created["updatedAt"]);

    let pdf = pdf_bytes(2048);
    let (status, replaced) = send_json(
        &app,
        form_request(
            Method::PUT,
            &uri,
            &[
                Part::Text("title", "Photo (replaced)"),
                Part::Text("removeFile", "true"),
                Part::File {
                    filename: "scan.pdf",
                    content_type: "application/pdf",
                    data: &pdf,
                },
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["fileName"], "scan.pdf");
    assert_eq!(replaced["fileType"], "application/pdf");
    assert_eq!(replaced["previewable"], false);

    let (status, removed) = send_json(
        &app,
        form_request(
            Method::PUT,
            &uri,
            &[
                Part::Text("title", "Photo (removed)"),
                Part::Text("keepExistingFile", "false"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["hasFile"], false);
    assert!(removed["attachmentUrl"].is_null());

    let (status, _, _) = send(&app, empty_request(Method::GET, &format!("{}/file", uri))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_remove_file_flag() {
    let app = app();
    let png = png_bytes(64);
    let created = create(
        &app,
        &[
            Part::Text("title", "Flag"),
            Part::File {
                filename: "f.png",
                content_type: "image/png",
                data: &png,
            },
        ],
    )
    .await;
    let uri = format!("/api/notes/{}", created["id"].as_str().unwrap());

    let (status, json) = send_json(
        &app,
        form_request(
            Method::PUT,
            &uri,
            &[Part::Text("title", "Flag"), Part::Text("removeFile", "maybe")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_argument");

    let (status, json) = send_json(
        &app,
        form_request(
            Method::PUT,
            &uri,
            &[Part::Text("title", "Flag"), Part::Text("removeFile", "true")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hasFile"], false);
}

#[tokio::test]
async fn test_update_unknown_note_is_not_found() {
    let (status, json) = send_json(
        &app(),
        form_request(
            Method::PUT,
            &format!("/api/notes/{}", Uuid::now_v7()),
            &[Part::Text("title", "Ghost")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let app = app();
    let created = create(&app, &[Part::Text("title", "Short-lived")]).await;
    let uri = format!("/api/notes/{}", created["id"].as_str().unwrap());

    let (status, _, body) = send(&app, empty_request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _) = send_json(&app, empty_request(Method::DELETE, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_image_inline() {
    let app = app();
    let png = png_bytes(4096);
    let created = create(
        &app,
        &[
            Part::Text("title", "Image"),
            Part::File {
                filename: "list.png",
                content_type: "image/png",
                data: &png,
            },
        ],
    )
    .await;

    let (status, headers, body) = send(
        &app,
        empty_request(Method::GET, created["attachmentUrl"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"list.png\""
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(body, png);
}

#[tokio::test]
async fn test_download_document_as_attachment() {
    let app = app();
    let pdf = pdf_bytes(512);
    let created = create(
        &app,
        &[
            Part::Text("title", "Document"),
            Part::File {
                filename: "résumé.pdf",
                content_type: "application/pdf",
                data: &pdf,
            },
        ],
    )
    .await;
    assert_eq!(created["fileName"], "résumé.pdf");

    let uri = format!("/notes/{}/file", created["id"].as_str().unwrap());
    let (status, headers, body) = send(&app, empty_request(Method::GET, &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"r_sum_.pdf\""));
    assert!(disposition.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    assert_eq!(body, pdf);
}

#[tokio::test]
async fn test_svg_download_is_not_inline() {
    let app = app();
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#;
    let created = create(
        &app,
        &[
            Part::Text("title", "Diagram"),
            Part::File {
                filename: "diagram.svg",
                content_type: "image/svg+xml",
                data: svg,
            },
        ],
    )
    .await;
    assert_eq!(created["fileType"], "image/svg+xml");
    assert_eq!(created["previewable"], true);

    let (status, headers, _) = send(
        &app,
        empty_request(Method::GET, created["attachmentUrl"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"diagram.svg\""
    );
}

#[tokio::test]
async fn test_short_prefix_serves_same_notes() {
    let app = app();
    let created = create(&app, &[Part::Text("title", "Shared")]).await;

    let (status, json) = send_json(
        &app,
        empty_request(
            Method::GET,
            &format!("/notes/{}", created["id"].as_str().unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, created);
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_by_default() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/notes")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app(), request).await;

    assert!(status.is_success());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "PUT", "DELETE"] {
        assert!(methods.contains(method), "{} missing from {}", method, methods);
    }
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let config = ServerConfig {
        allowed_origins: vec!["https://notes.example.com".to_string()],
        ..test_config()
    };
    let app = router(AppState::new(NoteService::in_memory(), config).unwrap());

    let request = |origin: &str| {
        Request::builder()
            .method(Method::GET)
            .uri("/api/notes")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    };

    let (_, headers, _) = send(&app, request("https://notes.example.com")).await;
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://notes.example.com"
    );

    let (_, headers, _) = send(&app, request("https://evil.example.com")).await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let (_, headers, _) = send(&app(), empty_request(Method::GET, "/api/notes")).await;
    let id = headers["x-request-id"].to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_openapi_document() {
    let (status, headers, body) = send(&app(), empty_request(Method::GET, "/openapi.yaml")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/yaml");
    assert!(String::from_utf8(body).unwrap().contains("/api/notes"));
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let config = ServerConfig {
        rate_limit_enabled: true,
        rate_limit_requests: 2,
        rate_limit_period_secs: 3600,
        ..test_config()
    };
    let app = router(AppState::new(NoteService::in_memory(), config).unwrap());

    for _ in 0..2 {
        let (status, _) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, json) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["retryable"], true);
}

/// Note repository that is always down.
struct UnavailableNotes;

#[async_trait]
impl NoteRepository for UnavailableNotes {
    async fn insert(&self, _note: &Note) -> Result<()> {
        Err(Error::Storage("connection refused: db-internal:5432".into()))
    }
    async fn fetch(&self, _id: Uuid) -> Result<Note> {
        Err(Error::Storage("connection refused: db-internal:5432".into()))
    }
    async fn list(&self) -> Result<Vec<Note>> {
        Err(Error::Storage("connection refused: db-internal:5432".into()))
    }
    async fn update(&self, _note: &Note) -> Result<()> {
        Err(Error::Storage("connection refused: db-internal:5432".into()))
    }
    async fn delete(&self, _id: Uuid) -> Result<()> {
        Err(Error::Storage("connection refused: db-internal:5432".into()))
    }
}

#[tokio::test]
async fn test_storage_failure_is_retryable_500_without_details() {
    let service = NoteService::new(
        Arc::new(UnavailableNotes),
        Arc::new(InMemoryAttachmentStore::new()),
    );
    let app = app_with(service);

    let (status, json) = send_json(&app, empty_request(Method::GET, "/api/notes")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "storage_failure");
    assert_eq!(json["retryable"], true);
    assert!(!json["error"].as_str().unwrap().contains("db-internal"));

    let png = png_bytes(64);
    let (status, _) = send_json(
        &app,
        form_request(
            Method::POST,
            "/api/notes",
            &[
                Part::Text("title", "Lost"),
                Part::File {
                    filename: "lost.png",
                    content_type: "image/png",
                    data: &png,
                },
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
