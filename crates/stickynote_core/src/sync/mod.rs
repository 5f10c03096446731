//! Note synchronization layer.
//!
//! # Responsibility
//! - Keep the in-memory note list consistent with the remote store.
//! - Own the optimistic positioning policy for drag gestures.
//!
//! # Invariants
//! - `NoteRepository` is the only writer of its note list.
//! - Feed snapshots are applied only on the owner's task, through
//!   `pump_feed` or `next_feed_update`.

mod note_repository;

pub use note_repository::{
    FeedPump, FeedUpdate, NoteRepository, PositionWrite, SyncError, SyncMode, SyncResult,
};
