//! In-memory repositories.
//!
//! Used for `STORAGE_BACKEND=memory` and for service-level tests that
//! should not need PostgreSQL. Same contracts as the PostgreSQL
//! implementations, nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use notekeep_core::{
    validate_attachment_size, Attachment, AttachmentContent, AttachmentStore, Error,
    NewAttachment, Note, NoteRepository, Result,
};

use crate::file_storage::compute_content_hash;

/// Notes held in a shared map.
#[derive(Clone, Default)]
pub struct InMemoryNoteRepository {
    notes: Arc<RwLock<HashMap<Uuid, Note>>>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn insert(&self, note: &Note) -> Result<()> {
        let mut notes = self.notes.write().await;
        if notes.contains_key(&note.id) {
            return Err(Error::InvalidInput(format!("note {} already exists", note.id)));
        }
        notes.insert(note.id, note.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Note> {
        self.notes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::NoteNotFound(id))
    }

    async fn list(&self) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = self.notes.read().await.values().cloned().collect();
        notes.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(notes)
    }

    async fn update(&self, note: &Note) -> Result<()> {
        let mut notes = self.notes.write().await;
        let stored = notes.get_mut(&note.id).ok_or(Error::NoteNotFound(note.id))?;
        stored.title = note.title.clone();
        stored.content = note.content.clone();
        stored.attachment_id = note.attachment_id;
        stored.updated_at = note.updated_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.notes
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::NoteNotFound(id))
    }
}

/// Attachments and their bytes held in a shared map.
#[derive(Clone, Default)]
pub struct InMemoryAttachmentStore {
    attachments: Arc<RwLock<HashMap<Uuid, AttachmentContent>>>,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an attachment with this id is currently stored.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.attachments.read().await.contains_key(&id)
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn put(&self, attachment: NewAttachment) -> Result<Attachment> {
        validate_attachment_size(attachment.data.len())?;

        let stored = Attachment {
            id: Uuid::now_v7(),
            filename: attachment.filename,
            mime_type: attachment.mime_type,
            size_bytes: attachment.data.len() as i64,
            content_hash: compute_content_hash(&attachment.data),
            created_at: Utc::now(),
        };

        self.attachments.write().await.insert(
            stored.id,
            AttachmentContent {
                attachment: stored.clone(),
                data: attachment.data,
            },
        );
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<AttachmentContent> {
        self.attachments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::AttachmentNotFound(id))
    }

    async fn describe(&self, ids: &[Uuid]) -> Result<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| attachments.get(id))
            .map(|content| content.attachment.clone())
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.attachments
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::AttachmentNotFound(id))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.attachments.read().await.len() as u64)
    }
}
