//! Note lifecycle: validation, attachment ownership and ordering of writes.
//!
//! Writes are ordered so that a failure at any step leaves at worst an
//! orphaned attachment, never a note pointing at a missing one:
//!
//! - create / replace: put new attachment, commit note, free old attachment
//! - remove / delete: commit note, free attachment
//!
//! When committing the note fails after a new attachment was stored, that
//! attachment is deleted again before the error is returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use notekeep_core::{
    detect_content_type, sanitize_filename, validate_attachment_size, validate_content,
    validate_title, Attachment, AttachmentChange, AttachmentContent, AttachmentStore, Error,
    NewAttachment, NewNote, Note, NoteRecord, NoteRepository, NoteUpdate, Result, Upload,
};
use notekeep_db::{InMemoryAttachmentStore, InMemoryNoteRepository};

use super::clock::MonotonicClock;
use super::note_locks::NoteLocks;

/// Entry point for every note operation.
#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
    attachments: Arc<dyn AttachmentStore>,
    locks: NoteLocks,
    clock: Arc<MonotonicClock>,
}

impl NoteService {
    pub fn new(notes: Arc<dyn NoteRepository>, attachments: Arc<dyn AttachmentStore>) -> Self {
        Self {
            notes,
            attachments,
            locks: NoteLocks::new(),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Service over fresh in-memory repositories.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryNoteRepository::new()),
            Arc::new(InMemoryAttachmentStore::new()),
        )
    }

    /// All notes, most recently updated first.
    pub async fn list(&self) -> Result<Vec<NoteRecord>> {
        let notes = self.notes.list().await?;
        let ids: Vec<Uuid> = notes.iter().filter_map(|n| n.attachment_id).collect();
        let mut attachments: HashMap<Uuid, Attachment> = self
            .attachments
            .describe(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        Ok(notes
            .into_iter()
            .map(|note| {
                let attachment = note.attachment_id.and_then(|id| {
                    let found = attachments.remove(&id);
                    if found.is_none() {
                        warn_missing_attachment(note.id, id);
                    }
                    found
                });
                NoteRecord { note, attachment }
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<NoteRecord> {
        let note = self.notes.fetch(id).await?;
        let attachment = self.describe_one(&note).await?;
        Ok(NoteRecord { note, attachment })
    }

    pub async fn create(&self, request: NewNote) -> Result<NoteRecord> {
        let start = Instant::now();
        let title = validate_title(&request.title)?;
        validate_content(&request.content)?;
        if let Some(file) = &request.file {
            validate_attachment_size(file.data.len())?;
        }

        let attachment = match request.file {
            Some(upload) => Some(self.store_upload(upload).await?),
            None => None,
        };

        let now = self.clock.now();
        let note = Note {
            id: Uuid::now_v7(),
            title,
            content: request.content,
            attachment_id: attachment.as_ref().map(|a| a.id),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.notes.insert(&note).await {
            if let Some(orphan) = &attachment {
                self.release_attachment(note.id, orphan.id).await;
            }
            return Err(e);
        }

        info!(
            subsystem = "notes",
            op = "create",
            note_id = %note.id,
            has_file = attachment.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note created"
        );
        Ok(NoteRecord { note, attachment })
    }

    pub async fn update(&self, id: Uuid, request: NoteUpdate) -> Result<NoteRecord> {
        let start = Instant::now();
        let title = validate_title(&request.title)?;
        validate_content(&request.content)?;
        if let AttachmentChange::Replace(file) = &request.attachment {
            validate_attachment_size(file.data.len())?;
        }

        let _guard = self.locks.acquire(id).await;
        let current = self.notes.fetch(id).await?;

        // (new reference, newly stored attachment, attachment to free after commit)
        let (attachment_id, stored, superseded) = match request.attachment {
            AttachmentChange::Replace(upload) => {
                let stored = self.store_upload(upload).await?;
                (Some(stored.id), Some(stored), current.attachment_id)
            }
            AttachmentChange::Keep => (current.attachment_id, None, None),
            AttachmentChange::Remove => (None, None, current.attachment_id),
        };

        let note = Note {
            title,
            content: request.content,
            attachment_id,
            updated_at: self.clock.now(),
            ..current
        };

        if let Err(e) = self.notes.update(&note).await {
            if let Some(orphan) = &stored {
                self.release_attachment(id, orphan.id).await;
            }
            return Err(e);
        }

        if let Some(old) = superseded {
            self.release_attachment(id, old).await;
        }

        let attachment = match stored {
            Some(attachment) => Some(attachment),
            None => self.describe_one(&note).await?,
        };

        info!(
            subsystem = "notes",
            op = "update",
            note_id = %id,
            has_file = attachment.is_some(),
            freed_attachment = superseded.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note updated"
        );
        Ok(NoteRecord { note, attachment })
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        let note = self.notes.fetch(id).await?;
        self.notes.delete(id).await?;

        if let Some(attachment_id) = note.attachment_id {
            self.release_attachment(id, attachment_id).await;
        }

        info!(subsystem = "notes", op = "delete", note_id = %id, "Note deleted");
        Ok(())
    }

    /// Bytes and metadata of a note's attachment.
    ///
    /// `NotFound` when the note is unknown or has no attachment.
    pub async fn fetch_attachment(&self, note_id: Uuid) -> Result<AttachmentContent> {
        let note = self.notes.fetch(note_id).await?;
        let attachment_id = note
            .attachment_id
            .ok_or_else(|| Error::NotFound(format!("Note {} has no attachment", note_id)))?;
        self.attachments.get(attachment_id).await
    }

    /// Number of stored attachments.
    pub async fn attachment_count(&self) -> Result<u64> {
        self.attachments.count().await
    }

    async fn store_upload(&self, upload: Upload) -> Result<Attachment> {
        let filename = sanitize_filename(&upload.filename);
        let mime_type = detect_content_type(&filename, &upload.data, upload.content_type.as_deref());
        self.attachments
            .put(NewAttachment {
                filename,
                mime_type,
                data: upload.data,
            })
            .await
    }

    async fn describe_one(&self, note: &Note) -> Result<Option<Attachment>> {
        let Some(id) = note.attachment_id else {
            return Ok(None);
        };
        let found = self.attachments.describe(&[id]).await?.into_iter().next();
        if found.is_none() {
            warn_missing_attachment(note.id, id);
        }
        Ok(found)
    }

    /// Free an attachment the note no longer references. Failures only leave
    /// an orphan behind, so they are logged rather than returned.
    async fn release_attachment(&self, note_id: Uuid, attachment_id: Uuid) {
        match self.attachments.delete(attachment_id).await {
            Ok(()) => debug!(
                subsystem = "notes",
                op = "release_attachment",
                note_id = %note_id,
                attachment_id = %attachment_id,
                "Attachment freed"
            ),
            Err(e) if e.is_not_found() => debug!(
                subsystem = "notes",
                op = "release_attachment",
                note_id = %note_id,
                attachment_id = %attachment_id,
                "Attachment already gone"
            ),
            Err(e) => warn!(
                subsystem = "notes",
                op = "release_attachment",
                note_id = %note_id,
                attachment_id = %attachment_id,
                error = %e,
                "Failed to free attachment; it is now orphaned"
            ),
        }
    }
}

fn warn_missing_attachment(note_id: Uuid, attachment_id: Uuid) {
    warn!(
        subsystem = "notes",
        note_id = %note_id,
        attachment_id = %attachment_id,
        "Note references an attachment that no longer exists"
    );
}
