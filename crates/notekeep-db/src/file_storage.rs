//! Attachment storage: metadata in PostgreSQL, bytes in a blob backend.
//!
//! Every attachment gets a fresh UUIDv7 and its own blob path, so ids are
//! never reused and blobs are never shared between notes. Bytes are checked
//! against their BLAKE3 hash on read.
//!
//! ## Example
//!
//! ```rust,ignore
//! use notekeep_db::file_storage::{FilesystemBackend, PgAttachmentStore};
//!
//! let backend = FilesystemBackend::new("./uploads");
//! let store = PgAttachmentStore::new(pool, backend);
//!
//! let attachment = store.put(NewAttachment { filename, mime_type, data }).await?;
//! let content = store.get(attachment.id).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use notekeep_core::{
    validate_attachment_size, Attachment, AttachmentContent, AttachmentStore, Error,
    NewAttachment, Result,
};

/// Where attachment bytes physically live.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path, replacing it atomically.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing data is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Filesystem storage backend.
///
/// Path format: `{base_path}/blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Write, read back and delete a probe file under the base directory.
    ///
    /// Run at startup so a missing or read-only upload directory fails fast
    /// instead of on the first upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let probe_dir = self.base_path.join("blobs/.health-check");
        let probe_file = probe_dir.join("probe.bin");
        let probe = b"notekeep-storage-probe";

        fs::create_dir_all(&probe_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", probe_dir, e))?;
        fs::write(&probe_file, probe)
            .await
            .map_err(|e| format!("write({:?}): {}", probe_file, e))?;

        let read_back = fs::read(&probe_file)
            .await
            .map_err(|e| format!("read({:?}): {}", probe_file, e))?;
        if read_back != probe {
            return Err(format!("read-back mismatch at {:?}", probe_file));
        }

        fs::remove_file(&probe_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", probe_file, e))?;
        let _ = fs::remove_dir(&probe_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(
            subsystem = "storage",
            component = "filesystem",
            op = "write",
            storage_path = %path,
            size = data.len(),
            "Writing blob"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(subsystem = "storage", parent = %parent.display(), error = %e, "create_dir_all failed");
                e
            })?;
        }

        // Temp file + rename so readers never observe a partial blob
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            warn!(
                subsystem = "storage",
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "rename failed"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        match fs::read(self.full_path(path)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::Storage(format!("blob missing at {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// BLAKE3 digest in the form `blake3:{64-char-hex}`.
pub fn compute_content_hash(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// Blob path for an attachment id, fanned out by the first four hex digits.
///
/// Example: `blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin`
pub fn generate_storage_path(id: &Uuid) -> String {
    let simple = id.simple().to_string();
    format!(
        "blobs/{}/{}/{}.bin",
        &simple[0..2],
        &simple[2..4],
        id.as_hyphenated()
    )
}

/// PostgreSQL-backed [`AttachmentStore`].
#[derive(Clone)]
pub struct PgAttachmentStore {
    pool: PgPool,
    backend: Arc<dyn StorageBackend>,
}

impl PgAttachmentStore {
    pub fn new(pool: PgPool, backend: impl StorageBackend + 'static) -> Self {
        Self {
            pool,
            backend: Arc::new(backend),
        }
    }

    /// Remove the blob of an attachment row that is already gone.
    async fn discard_blob(&self, id: Uuid, storage_path: &str) {
        if let Err(e) = self.backend.delete(storage_path).await {
            warn!(
                subsystem = "storage",
                component = "attachments",
                attachment_id = %id,
                storage_path = %storage_path,
                error = %e,
                "Failed to remove blob; it is now orphaned"
            );
        }
    }
}

#[async_trait]
impl AttachmentStore for PgAttachmentStore {
    async fn put(&self, attachment: NewAttachment) -> Result<Attachment> {
        validate_attachment_size(attachment.data.len())?;

        let id = Uuid::now_v7();
        let storage_path = generate_storage_path(&id);
        let content_hash = compute_content_hash(&attachment.data);
        let size_bytes = attachment.data.len() as i64;
        let created_at = Utc::now();

        self.backend.write(&storage_path, &attachment.data).await?;

        let inserted = sqlx::query(
            r#"INSERT INTO attachment (id, filename, mime_type, size_bytes, content_hash, storage_path, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(&attachment.filename)
        .bind(&attachment.mime_type)
        .bind(size_bytes)
        .bind(&content_hash)
        .bind(&storage_path)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            self.discard_blob(id, &storage_path).await;
            return Err(e.into());
        }

        debug!(
            subsystem = "storage",
            component = "attachments",
            op = "put",
            attachment_id = %id,
            size_bytes,
            mime_type = %attachment.mime_type,
            "Stored attachment"
        );

        Ok(Attachment {
            id,
            filename: attachment.filename,
            mime_type: attachment.mime_type,
            size_bytes,
            content_hash,
            created_at,
        })
    }

    async fn get(&self, id: Uuid) -> Result<AttachmentContent> {
        let row = sqlx::query(
            r#"SELECT id, filename, mime_type, size_bytes, content_hash, storage_path, created_at
               FROM attachment WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::AttachmentNotFound(id))?;

        let storage_path: String = row.get("storage_path");
        let attachment = attachment_from_row(&row);
        let data = self.backend.read(&storage_path).await?;

        if compute_content_hash(&data) != attachment.content_hash {
            warn!(
                subsystem = "storage",
                component = "attachments",
                attachment_id = %id,
                storage_path = %storage_path,
                "Blob content does not match recorded hash"
            );
            return Err(Error::Storage(format!(
                "attachment {} failed integrity check",
                id
            )));
        }

        Ok(AttachmentContent { attachment, data })
    }

    async fn describe(&self, ids: &[Uuid]) -> Result<Vec<Attachment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"SELECT id, filename, mime_type, size_bytes, content_hash, created_at
               FROM attachment WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(attachment_from_row).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let storage_path: String =
            sqlx::query_scalar("DELETE FROM attachment WHERE id = $1 RETURNING storage_path")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(Error::AttachmentNotFound(id))?;

        self.discard_blob(id, &storage_path).await;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attachment")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn attachment_from_row(row: &sqlx::postgres::PgRow) -> Attachment {
    Attachment {
        id: row.get("id"),
        filename: row.get("filename"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
    }
}
