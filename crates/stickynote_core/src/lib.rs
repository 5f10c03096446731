//! Core domain logic for the sticky-note board.
//! This crate owns note state, its synchronization with the document store,
//! and the optimistic positioning policy.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod store;
pub mod sync;

pub use config::{ConfigError, StoreConfig};
pub use gateway::{
    FeedListener, FeedSlot, GatewayError, GatewayResult, NoteGateway, StoreNoteGateway,
    Subscription, NOTES_COLLECTION,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{Note, NoteDocument, NoteDraft, NoteId};
pub use store::{StoreClient, StoreError, StoreResult, StoredDocument};
pub use sync::{
    FeedPump, FeedUpdate, NoteRepository, PositionWrite, SyncError, SyncMode, SyncResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
