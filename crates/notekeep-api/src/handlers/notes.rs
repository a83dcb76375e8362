//! Note CRUD and attachment download handlers.
//!
//! Create and update take `multipart/form-data` so a browser form can send
//! the note fields and the file in one request.
//!
//! # Multipart Fields
//! - `title`: required
//! - `content`: optional, defaults to empty
//! - `file`: optional; an empty part counts as no file
//! - `removeFile` / `keepExistingFile`: update only, drop the current file
//!   when `removeFile=true` or `keepExistingFile=false`

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use notekeep_core::defaults::{FALLBACK_CONTENT_TYPE, MAX_ATTACHMENT_BYTES};
use notekeep_core::{
    content_disposition, serves_inline, AttachmentChange, NewNote, NoteRecord, NoteUpdate,
    NoteView, Upload,
};

use crate::{ApiError, AppState};

/// Parsed note form.
#[derive(Debug, Default)]
struct NoteForm {
    title: Option<String>,
    content: Option<String>,
    file: Option<Upload>,
    remove_file: bool,
}

impl NoteForm {
    fn title(&mut self) -> Result<String, ApiError> {
        self.title
            .take()
            .ok_or_else(|| ApiError::BadRequest("Missing 'title' field".into()))
    }
}

/// List all notes, most recently updated first.
#[utoipa::path(get, path = "/api/notes", tag = "Notes",
    responses((status = 200, description = "All notes", body = [NoteView])))]
pub async fn list_notes(State(state): State<AppState>) -> Result<Json<Vec<NoteView>>, ApiError> {
    let records = state.notes.list().await?;
    let views = records.iter().map(|r| state.view(r)).collect();
    Ok(Json(views))
}

/// Get one note.
#[utoipa::path(get, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note", body = NoteView),
        (status = 404, description = "Unknown note", body = ErrorBody)
    ))]
pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NoteView>, ApiError> {
    let id = parse_note_id(&id)?;
    let record = state.notes.get(id).await?;
    Ok(Json(state.view(&record)))
}

/// Create a note, optionally with a file.
#[utoipa::path(post, path = "/api/notes", tag = "Notes",
    responses(
        (status = 201, description = "Note created", body = NoteView),
        (status = 400, description = "Invalid title, content or form", body = ErrorBody),
        (status = 413, description = "File larger than 5 MiB", body = ErrorBody)
    ))]
pub async fn create_note(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<NoteView>), ApiError> {
    let mut form = read_note_form(multipart).await?;
    let request = NewNote {
        title: form.title()?,
        content: form.content.unwrap_or_default(),
        file: form.file,
    };

    let record = state.notes.create(request).await?;
    Ok((StatusCode::CREATED, Json(state.view(&record))))
}

/// Replace a note's title and content and optionally its file.
#[utoipa::path(put, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note updated", body = NoteView),
        (status = 400, description = "Invalid title, content or form", body = ErrorBody),
        (status = 404, description = "Unknown note", body = ErrorBody),
        (status = 413, description = "File larger than 5 MiB", body = ErrorBody)
    ))]
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<NoteView>, ApiError> {
    let id = parse_note_id(&id)?;
    let mut form = read_note_form(multipart).await?;
    let request = NoteUpdate {
        title: form.title()?,
        content: form.content.unwrap_or_default(),
        attachment: AttachmentChange::from_parts(form.file, form.remove_file),
    };

    let record = state.notes.update(id, request).await?;
    Ok(Json(state.view(&record)))
}

/// Delete a note and its file.
#[utoipa::path(delete, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 404, description = "Unknown note", body = ErrorBody)
    ))]
pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_note_id(&id)?;
    state.notes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download a note's file.
///
/// Images other than SVG are served `inline` so they can be previewed;
/// everything else as an `attachment` download.
#[utoipa::path(get, path = "/api/notes/{id}/file", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "File bytes with the stored content type"),
        (status = 404, description = "Unknown note or no file", body = ErrorBody)
    ))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_note_id(&id)?;
    let content = state.notes.fetch_attachment(id).await?;
    let attachment = &content.attachment;

    let content_type = HeaderValue::from_str(&attachment.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let inline = serves_inline(&attachment.mime_type);
    let disposition = HeaderValue::from_str(&content_disposition(&attachment.filename, inline))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        content.data,
    )
        .into_response())
}

/// Error body returned by every failing endpoint.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// `invalid_argument`, `payload_too_large`, `not_found` or `storage_failure`.
    pub kind: String,
    /// Whether retrying the same request may succeed.
    pub retryable: bool,
}

impl AppState {
    fn view(&self, record: &NoteRecord) -> NoteView {
        NoteView::from_record(record, &self.config.api_base_path)
    }
}

/// An id that is not a UUID cannot name an existing note.
fn parse_note_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Note not found: {}", raw)))
}

async fn read_note_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<NoteForm, ApiError> {
    let mut multipart =
        multipart.map_err(|e| ApiError::BadRequest(format!("Expected multipart/form-data: {}", e)))?;
    let mut form = NoteForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("title") => form.title = Some(field.text().await.map_err(multipart_error)?),
            Some("content") => form.content = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => form.file = read_upload(field).await?,
            Some("removeFile") => {
                let raw = field.text().await.map_err(multipart_error)?;
                form.remove_file |= parse_flag("removeFile", &raw)?;
            }
            Some("keepExistingFile") => {
                let raw = field.text().await.map_err(multipart_error)?;
                form.remove_file |= !parse_flag("keepExistingFile", &raw)?;
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Read the file part, giving up as soon as it passes the size limit.
async fn read_upload(mut field: Field<'_>) -> Result<Option<Upload>, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(|c| c.to_string());

    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = (data.len() + chunk.len()) as u64;
        if size > MAX_ATTACHMENT_BYTES {
            return Err(notekeep_core::Error::PayloadTooLarge {
                size,
                limit: MAX_ATTACHMENT_BYTES,
            }
            .into());
        }
        data.extend_from_slice(&chunk);
    }

    // Browsers send an empty part when no file was chosen
    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(Upload {
        filename,
        content_type,
        data,
    }))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ApiError::BadRequest(format!(
            "'{}' must be true or false, got '{}'",
            name, raw
        ))),
    }
}

/// Body limit hits become 413, read failures a retryable 500, anything
/// else malformed input.
fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!(
            "Request body too large; files are limited to {} bytes",
            MAX_ATTACHMENT_BYTES
        ))
    } else if status.is_server_error() {
        ApiError::Core(notekeep_core::Error::Internal(format!(
            "Reading request body failed: {}",
            e.body_text()
        )))
    } else {
        ApiError::BadRequest(format!("Multipart error: {}", e.body_text()))
    }
}
