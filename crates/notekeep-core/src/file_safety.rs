//! Filename and content-type handling for uploaded attachments.
//!
//! - Magic byte detection decides the stored MIME type where possible
//! - Filenames are reduced to a safe display name
//! - Download headers never carry raw client input

use crate::defaults::FALLBACK_CONTENT_TYPE;
use crate::models::is_previewable_mime;

/// Decide the content type to store for an upload.
///
/// Magic bytes win over the client's claim. Text formats have no magic
/// bytes, so they fall back to the extension, then to the claim. A claimed
/// binary media type whose magic bytes are missing is downgraded to
/// `application/octet-stream`.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: Option<&str>) -> String {
    // 1. Magic byte detection via infer
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    // 2. Extension-based detection for text formats
    if let Some(mime) = extension(filename).and_then(mime_from_extension) {
        return mime.to_string();
    }

    let claimed = claimed.map(normalize_mime).filter(|m| is_valid_mime_type(m));
    match claimed {
        // 3. Binary claim without matching magic bytes
        Some(ref mime) if claimed_is_binary(mime) => FALLBACK_CONTENT_TYPE.to_string(),
        // 4. Trust text-like claims
        Some(mime) => mime,
        None => FALLBACK_CONTENT_TYPE.to_string(),
    }
}

/// Strip parameters and lowercase: `Text/Plain; charset=utf-8` -> `text/plain`.
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Binary formats that always carry recognizable magic bytes.
fn claimed_is_binary(claimed: &str) -> bool {
    if claimed == "image/svg+xml" {
        return false;
    }
    if claimed.starts_with("image/")
        || claimed.starts_with("audio/")
        || claimed.starts_with("video/")
    {
        return true;
    }
    matches!(
        claimed,
        "application/pdf"
            | "application/zip"
            | "application/gzip"
            | "application/x-tar"
            | "application/x-7z-compressed"
            | "application/x-rar-compressed"
            | "application/wasm"
    )
}

/// Text-only extensions. Binary media formats are left to magic bytes.
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "tsv" => Some("text/tab-separated-values"),
        "md" | "markdown" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "xml" => Some("application/xml"),
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("application/yaml"),
        "toml" => Some("application/toml"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Validate MIME type format per RFC 2045 (type/subtype).
pub fn is_valid_mime_type(mime: &str) -> bool {
    let Some((media_type, subtype)) = mime.split_once('/') else {
        return false;
    };
    if media_type.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return false;
    }
    let is_token_char = |c: char| -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '!' | '#' | '$' | '&' | '-' | '^' | '_' | '.' | '+')
    };
    media_type.chars().all(is_token_char) && subtype.chars().all(is_token_char)
}

/// Maximum stored filename length in characters.
const MAX_FILENAME_CHARS: usize = 255;

/// Reduce a client filename to a safe display name.
///
/// Path components are dropped and reserved or control characters replaced.
/// The result is never empty and at most 255 characters, keeping the
/// extension when truncating.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "unnamed_file".to_string();
    }

    if sanitized.chars().count() <= MAX_FILENAME_CHARS {
        return sanitized.to_string();
    }

    match sanitized.rsplit_once('.') {
        Some((stem, ext)) if ext.chars().count() < 16 => {
            let keep = MAX_FILENAME_CHARS - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{}.{}", stem, ext)
        }
        _ => sanitized.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}

/// Whether a download may be served `inline`.
///
/// Previewable images qualify, except SVG, which can carry script.
pub fn serves_inline(mime_type: &str) -> bool {
    let mime = normalize_mime(mime_type);
    is_previewable_mime(&mime) && mime != "image/svg+xml"
}

/// Build a `Content-Disposition` value for a download.
///
/// `inline` for previewable types so browsers render them, `attachment`
/// otherwise. The quoted `filename` is ASCII-only; non-ASCII names are also
/// sent as RFC 5987 `filename*`.
pub fn content_disposition(filename: &str, inline: bool) -> String {
    let disposition = if inline { "inline" } else { "attachment" };
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_ascii_control()) {
        return format!("{}; filename=\"{}\"", disposition, ascii);
    }

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition,
        ascii,
        urlencoding::encode(filename)
    )
}
