//! Remote store gateway contracts.
//!
//! # Responsibility
//! - Define the boundary between the sync layer and the document store.
//! - Normalize stored documents into full `Note` values at that boundary.
//!
//! # Invariants
//! - `subscribe` delivers an initial snapshot promptly, then one complete
//!   snapshot per change.
//! - `update_position` writes only `x` and `y`, and only finite values.
//! - Write failures propagate to the caller; feed read failures go to the
//!   listener's error callback.

use crate::model::note::{Note, NoteDraft, NoteId};
use crate::store::StoreError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod store_gateway;
mod subscription;

pub use store_gateway::{StoreNoteGateway, NOTES_COLLECTION};
pub use subscription::{FeedListener, FeedSlot, Subscription};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway-level error for note operations.
#[derive(Debug)]
pub enum GatewayError {
    Store(StoreError),
    NotFound(NoteId),
    /// A stored document that cannot be read as a note.
    InvalidDocument { id: NoteId, message: String },
    /// A coordinate that a JSON number cannot represent.
    InvalidPosition { x: f64, y: f64 },
    /// Transport or permission failure reported by a remote backend.
    Remote(String),
    NoRuntime,
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidDocument { id, message } => {
                write!(f, "note document `{id}` has an invalid shape: {message}")
            }
            Self::InvalidPosition { x, y } => {
                write!(f, "note position ({x}, {y}) is not a finite number pair")
            }
            Self::Remote(message) => write!(f, "remote store failure: {message}"),
            Self::NoRuntime => write!(f, "live feed requires a running tokio runtime"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DocumentNotFound { id, .. } => Self::NotFound(NoteId::new(id)),
            StoreError::NoRuntime => Self::NoRuntime,
            other => Self::Store(other),
        }
    }
}

/// Repository-facing operations over the notes collection.
#[async_trait]
pub trait NoteGateway: Send + Sync {
    /// Inserts one note and returns it with its store-assigned id.
    async fn create(&self, draft: NoteDraft) -> GatewayResult<Note>;
    /// Reads every note once, normalized.
    async fn read_all(&self) -> GatewayResult<Vec<Note>>;
    /// Opens a live feed of complete collection snapshots.
    fn subscribe(&self, listener: FeedListener) -> GatewayResult<Subscription>;
    /// Overwrites only the coordinates of one note.
    async fn update_position(&self, id: &NoteId, x: f64, y: f64) -> GatewayResult<()>;
    /// Deletes one note; deleting a missing note succeeds.
    async fn delete(&self, id: &NoteId) -> GatewayResult<()>;
}
