//! Domain models for notes and attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// NOTE TYPES
// =============================================================================

/// Note metadata as persisted by a [`crate::NoteRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Owned attachment, if any. Always resolves to a stored attachment.
    pub attachment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note together with the metadata of its attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub note: Note,
    pub attachment: Option<Attachment>,
}

impl NoteRecord {
    pub fn has_file(&self) -> bool {
        self.attachment.is_some()
    }
}

/// Input for creating a note.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub file: Option<Upload>,
}

/// Input for updating a note. Title and content are always replaced.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: String,
    pub content: String,
    pub attachment: AttachmentChange,
}

/// What an update does to the note's attachment.
///
/// An update without a new file is ambiguous between "keep" and "remove",
/// so callers must say which one they mean.
#[derive(Debug, Clone, Default)]
pub enum AttachmentChange {
    /// Store the upload and free the previous attachment.
    Replace(Upload),
    /// Leave the current attachment reference untouched.
    #[default]
    Keep,
    /// Free the current attachment and clear the reference.
    Remove,
}

impl AttachmentChange {
    /// Build the change from form-style inputs: a supplied file always
    /// replaces, otherwise `remove` decides between Remove and Keep.
    pub fn from_parts(file: Option<Upload>, remove: bool) -> Self {
        match file {
            Some(upload) => AttachmentChange::Replace(upload),
            None if remove => AttachmentChange::Remove,
            None => AttachmentChange::Keep,
        }
    }
}

// =============================================================================
// ATTACHMENT TYPES
// =============================================================================

/// A file as received from a client, before MIME resolution.
#[derive(Clone, Default)]
pub struct Upload {
    /// Name supplied by the client (unsanitized).
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Input for [`crate::AttachmentStore::put`].
#[derive(Clone)]
pub struct NewAttachment {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for NewAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAttachment")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Attachment metadata. The bytes live only in the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    /// Original client filename, used for download naming only.
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// `blake3:{hex}` digest of the payload.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Whether the presentation layer may render this attachment inline.
    pub fn is_previewable(&self) -> bool {
        is_previewable_mime(&self.mime_type)
    }
}

/// Attachment metadata plus its bytes.
#[derive(Clone)]
pub struct AttachmentContent {
    pub attachment: Attachment,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for AttachmentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentContent")
            .field("attachment", &self.attachment)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// `image/*` types are previewed inline; everything else is a download link.
pub fn is_previewable_mime(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

// =============================================================================
// API VIEW
// =============================================================================

/// Note summary exposed to clients. Never contains attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub has_file: bool,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    /// True when `file_type` is an `image/*` type.
    pub previewable: bool,
    /// Fetch URL of the attachment bytes.
    pub attachment_url: Option<String>,
}

impl NoteView {
    /// Build the client view. `base_path` is the public notes prefix,
    /// e.g. `/api/notes`.
    pub fn from_record(record: &NoteRecord, base_path: &str) -> Self {
        let note = &record.note;
        let attachment = record.attachment.as_ref();
        Self {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            has_file: attachment.is_some(),
            file_name: attachment.map(|a| a.filename.clone()),
            file_type: attachment.map(|a| a.mime_type.clone()),
            file_size: attachment.map(|a| a.size_bytes),
            previewable: attachment.is_some_and(Attachment::is_previewable),
            attachment_url: attachment
                .map(|_| format!("{}/{}/file", base_path.trim_end_matches('/'), note.id)),
        }
    }
}
