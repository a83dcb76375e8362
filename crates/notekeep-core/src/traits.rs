//! Core traits for notekeep storage abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Repository for note metadata.
///
/// Implementations store notes verbatim; validation and attachment lifecycle
/// belong to the service layer.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note.
    async fn insert(&self, note: &Note) -> Result<()>;

    /// Fetch a note by ID. Fails with `Error::NoteNotFound` when absent.
    async fn fetch(&self, id: Uuid) -> Result<Note>;

    /// All notes, most recently updated first, ties broken by id descending.
    async fn list(&self) -> Result<Vec<Note>>;

    /// Replace title, content, attachment reference and `updated_at`.
    /// Fails with `Error::NoteNotFound` when absent.
    async fn update(&self, note: &Note) -> Result<()>;

    /// Permanently delete a note. Fails with `Error::NoteNotFound` when absent.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// ATTACHMENT STORE
// =============================================================================

/// Blob store for attachments, keyed by opaque ids that are never reused.
///
/// The store has no notion of notes.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist bytes and metadata under a fresh id.
    ///
    /// Fails with `Error::PayloadTooLarge` when the payload exceeds
    /// [`crate::defaults::MAX_ATTACHMENT_BYTES`].
    async fn put(&self, attachment: NewAttachment) -> Result<Attachment>;

    /// Fetch metadata and bytes. Fails with `Error::AttachmentNotFound`.
    async fn get(&self, id: Uuid) -> Result<AttachmentContent>;

    /// Metadata for the given ids. Unknown ids are skipped.
    async fn describe(&self, ids: &[Uuid]) -> Result<Vec<Attachment>>;

    /// Remove metadata and bytes. Fails with `Error::AttachmentNotFound`.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Number of stored attachments.
    async fn count(&self) -> Result<u64>;
}
