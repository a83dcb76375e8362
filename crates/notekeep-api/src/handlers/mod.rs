//! HTTP handler modules for notekeep-api.

pub mod notes;

pub use notes::{
    create_note, delete_note, download_file, get_note, list_notes, update_note, ErrorBody,
};
