//! Centralized default constants for notekeep.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// NOTES
// =============================================================================

/// Maximum title length in characters (after trimming).
pub const TITLE_MAX_CHARS: usize = 200;

/// Maximum content length in characters.
pub const CONTENT_MAX_CHARS: usize = 50_000;

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Maximum attachment size: 5 MiB.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Allowance for multipart framing and text fields on top of the attachment.
pub const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Request body limit for note create/update.
pub const MAX_BODY_SIZE_BYTES: usize = MAX_ATTACHMENT_BYTES as usize + FORM_OVERHEAD_BYTES;

/// Content type used when nothing better is known.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Default blob directory (relative to the working directory).
pub const FILE_STORAGE_PATH: &str = "./uploads";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP listen port.
pub const SERVER_PORT: u16 = 8080;

/// Default listen address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Public path prefix used to build attachment URLs.
pub const API_BASE_PATH: &str = "/api/notes";

/// Default request timeout (covers slow uploads).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default rate limit: requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default CORS preflight cache duration.
pub const CORS_MAX_AGE_SECS: u64 = 3600;

// =============================================================================
// DATABASE
// =============================================================================

/// Default PostgreSQL URL when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "postgres://localhost/notekeep";
