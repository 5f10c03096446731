//! Note gateway backed by the document store client.
//!
//! # Responsibility
//! - Map note intents onto document operations in the `notes` collection.
//! - Drive live feeds from the store's revision channel.
//!
//! # Invariants
//! - Documents that fail to decode are skipped with a warning, never
//!   surfaced as partially-filled notes.
//! - A feed task re-reads the whole collection after every revision change.

use crate::gateway::{FeedListener, GatewayError, GatewayResult, NoteGateway, Subscription};
use crate::model::note::{
    is_finite_position, position_patch, Note, NoteDocument, NoteDraft, NoteId,
};
use crate::store::{StoreClient, StoredDocument};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Collection holding note documents.
pub const NOTES_COLLECTION: &str = "notes";

/// `NoteGateway` implementation over a shared `StoreClient`.
pub struct StoreNoteGateway {
    client: Arc<StoreClient>,
    collection: String,
}

impl StoreNoteGateway {
    /// Creates a gateway over the default `notes` collection.
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self::with_collection(client, NOTES_COLLECTION)
    }

    pub fn with_collection(client: Arc<StoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn client(&self) -> &Arc<StoreClient> {
        &self.client
    }

    pub fn collection(&self) -> &str {
        self.collection.as_str()
    }
}

#[async_trait]
impl NoteGateway for StoreNoteGateway {
    async fn create(&self, draft: NoteDraft) -> GatewayResult<Note> {
        if !draft.has_finite_position() {
            return Err(GatewayError::InvalidPosition {
                x: draft.x.unwrap_or_default(),
                y: draft.y.unwrap_or_default(),
            });
        }
        let document = draft.to_document();
        let stored = match self
            .client
            .add_document(&self.collection, document.to_fields())
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                error!(
                    "event=note_create module=gateway status=error collection={} error={}",
                    self.collection, err
                );
                return Err(err.into());
            }
        };

        info!(
            "event=note_create module=gateway status=ok note_id={}",
            stored.id
        );
        Ok(document.into_note(NoteId::new(stored.id)))
    }

    async fn read_all(&self) -> GatewayResult<Vec<Note>> {
        let notes = read_notes(&self.client, &self.collection).await?;
        debug!(
            "event=note_read_all module=gateway status=ok count={}",
            notes.len()
        );
        Ok(notes)
    }

    fn subscribe(&self, listener: FeedListener) -> GatewayResult<Subscription> {
        let runtime = Handle::try_current().map_err(|_| GatewayError::NoRuntime)?;
        let mut revisions = self.client.watch_revisions()?;
        let client = Arc::clone(&self.client);
        let collection = self.collection.clone();
        let (subscription, slot) = Subscription::open(listener);

        let task = runtime.spawn(async move {
            loop {
                let still_open = match read_notes(&client, &collection).await {
                    Ok(notes) => slot.deliver(notes),
                    Err(err) => {
                        warn!(
                            "event=feed_read module=gateway status=error collection={} error={}",
                            collection, err
                        );
                        slot.report(err)
                    }
                };
                if !still_open {
                    break;
                }
                if revisions.changed().await.is_err() {
                    debug!(
                        "event=feed_end module=gateway status=ok collection={} reason=store_closed",
                        collection
                    );
                    slot.finish();
                    break;
                }
            }
        });

        info!(
            "event=feed_open module=gateway status=ok collection={}",
            self.collection
        );
        Ok(subscription.with_task(task))
    }

    async fn update_position(&self, id: &NoteId, x: f64, y: f64) -> GatewayResult<()> {
        if !is_finite_position(x, y) {
            return Err(GatewayError::InvalidPosition { x, y });
        }
        self.client
            .update_fields(&self.collection, id.as_str(), position_patch(x, y))
            .await?;
        debug!(
            "event=note_move module=gateway status=ok note_id={}",
            id
        );
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> GatewayResult<()> {
        let existed = self
            .client
            .delete_document(&self.collection, id.as_str())
            .await?;
        info!(
            "event=note_delete module=gateway status=ok note_id={} existed={}",
            id, existed
        );
        Ok(())
    }
}

async fn read_notes(client: &StoreClient, collection: &str) -> GatewayResult<Vec<Note>> {
    let documents = client.list_documents(collection).await?;
    Ok(normalize_documents(documents))
}

fn normalize_documents(documents: Vec<StoredDocument>) -> Vec<Note> {
    documents
        .into_iter()
        .filter_map(|document| match decode_note(document) {
            Ok(note) => Some(note),
            Err(err) => {
                warn!(
                    "event=note_normalize module=gateway status=skipped error={}",
                    err
                );
                None
            }
        })
        .collect()
}

fn decode_note(document: StoredDocument) -> GatewayResult<Note> {
    let id = NoteId::new(document.id);
    match NoteDocument::from_fields(&document.fields) {
        Ok(decoded) => Ok(decoded.into_note(id)),
        Err(err) => Err(GatewayError::InvalidDocument {
            id,
            message: err.to_string(),
        }),
    }
}
