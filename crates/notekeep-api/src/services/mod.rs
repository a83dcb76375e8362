//! Service layer for business logic.

pub mod clock;
pub mod note_locks;
pub mod note_service;

pub use clock::MonotonicClock;
pub use note_locks::{NoteLockGuard, NoteLocks};
pub use note_service::NoteService;
