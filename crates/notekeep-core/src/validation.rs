//! Server-side input validation.
//!
//! The presentation layer performs the same checks for responsiveness, but
//! these are the authoritative ones: every create and update passes through
//! them before anything is written.

use crate::defaults::{CONTENT_MAX_CHARS, MAX_ATTACHMENT_BYTES, TITLE_MAX_CHARS};
use crate::error::{Error, Result};

/// Validate a note title and return it trimmed.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Title is required".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars > TITLE_MAX_CHARS {
        return Err(Error::InvalidInput(format!(
            "Title must be at most {} characters (got {})",
            TITLE_MAX_CHARS, chars
        )));
    }
    if trimmed.contains('\0') {
        return Err(Error::InvalidInput(
            "Title must not contain NUL characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate note content. Empty content is allowed.
pub fn validate_content(content: &str) -> Result<()> {
    let chars = content.chars().count();
    if chars > CONTENT_MAX_CHARS {
        return Err(Error::InvalidInput(format!(
            "Content must be at most {} characters (got {})",
            CONTENT_MAX_CHARS, chars
        )));
    }
    if content.contains('\0') {
        return Err(Error::InvalidInput(
            "Content must not contain NUL characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate an attachment payload length.
pub fn validate_attachment_size(len: usize) -> Result<()> {
    let size = len as u64;
    if size > MAX_ATTACHMENT_BYTES {
        return Err(Error::PayloadTooLarge {
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}
