//! # notekeep-core
//!
//! Core types, traits, and validation rules for notekeep.
//!
//! This crate provides the entity model shared by the storage layer and the
//! HTTP service: notes, attachments, the client-facing note view, and the
//! repository traits that concrete backends implement.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod models;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use file_safety::{
    content_disposition, detect_content_type, is_valid_mime_type, normalize_mime,
    sanitize_filename, serves_inline,
};
pub use models::*;
pub use traits::*;
pub use validation::{validate_attachment_size, validate_content, validate_title};
