//! # notekeep-db
//!
//! Storage layer for notekeep.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL note repository
//! - Attachment store with PostgreSQL metadata and filesystem blobs
//! - In-memory implementations of both for tests and ephemeral deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use notekeep_db::{create_pool, Database, FilesystemBackend, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("postgres://localhost/notekeep", 10).await?;
//!     let db = Database::new(pool, FilesystemBackend::new("./uploads"));
//!     for note in db.notes.list().await? {
//!         println!("{} {}", note.id, note.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod file_storage;
pub mod memory;
pub mod notes;
pub mod pool;

// Always compiled so integration tests (in tests/) can use it
pub mod test_fixtures;

// Re-export core types
pub use notekeep_core::*;

pub use file_storage::{
    compute_content_hash, generate_storage_path, FilesystemBackend, PgAttachmentStore,
    StorageBackend,
};
pub use memory::{InMemoryAttachmentStore, InMemoryNoteRepository};
pub use notes::PgNoteRepository;
pub use pool::{create_pool, log_pool_metrics};

/// PostgreSQL-backed repositories sharing one pool.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note metadata.
    pub notes: PgNoteRepository,
    /// Attachment metadata and blobs.
    pub attachments: PgAttachmentStore,
}

impl Database {
    /// Create a new Database from a pool and a blob backend.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, backend: impl StorageBackend + 'static) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            attachments: PgAttachmentStore::new(pool.clone(), backend),
            pool,
        }
    }

    /// Apply pending schema migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}
