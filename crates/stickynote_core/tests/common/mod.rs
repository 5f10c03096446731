#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stickynote_core::{
    FeedListener, FeedSlot, GatewayError, GatewayResult, Note, NoteDraft, NoteGateway, NoteId,
    NoteRepository, StoreConfig, Subscription,
};
use tokio::sync::Semaphore;

pub fn test_config() -> StoreConfig {
    let env = HashMap::from([
        ("STICKYNOTE_API_KEY", "test-key"),
        ("STICKYNOTE_AUTH_DOMAIN", "board.test"),
        ("STICKYNOTE_PROJECT_ID", "board-test"),
        ("STICKYNOTE_STORAGE_BUCKET", "board-test.bucket"),
        ("STICKYNOTE_MESSAGING_SENDER_ID", "42"),
        ("STICKYNOTE_APP_ID", "1:42:web:test"),
    ]);
    StoreConfig::from_lookup(|key| env.get(key).map(|value| value.to_string()))
        .expect("test config should load")
}

/// Awaits `future` or panics after a few seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

/// Applies feed updates until `done` holds for the repository.
pub async fn wait_for_feed<G, F>(repo: &mut NoteRepository<G>, done: F)
where
    G: NoteGateway + 'static,
    F: Fn(&[Note]) -> bool,
{
    within(async {
        while !done(repo.notes()) {
            repo.next_feed_update()
                .await
                .expect("feed ended before condition held");
        }
    })
    .await;
}

#[derive(Default)]
struct ScriptState {
    notes: Vec<Note>,
    next_id: u64,
    fail_create: bool,
    fail_read: bool,
    fail_update: bool,
    fail_delete: bool,
    position_calls: Vec<(NoteId, f64, f64)>,
    delete_calls: Vec<NoteId>,
    feeds: Vec<FeedSlot>,
    position_gate: Option<Arc<Semaphore>>,
}

/// In-memory gateway with scripted failures and a manually driven feed.
#[derive(Default)]
pub struct ScriptedGateway {
    state: Mutex<ScriptState>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_notes(notes: Vec<Note>) -> Arc<Self> {
        let gateway = Self::default();
        gateway.state.lock().unwrap().notes = notes;
        Arc::new(gateway)
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn fail_read(&self, fail: bool) {
        self.state.lock().unwrap().fail_read = fail;
    }

    pub fn fail_update(&self, fail: bool) {
        self.state.lock().unwrap().fail_update = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    /// Holds every position write until permits are added to the gate.
    pub fn gate_position_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().position_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn stored(&self) -> Vec<Note> {
        self.state.lock().unwrap().notes.clone()
    }

    pub fn position_calls(&self) -> Vec<(NoteId, f64, f64)> {
        self.state.lock().unwrap().position_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<NoteId> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn open_feeds(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .feeds
            .iter()
            .filter(|slot| !slot.is_cancelled())
            .count()
    }

    /// Delivers the current stored collection to every open feed.
    pub fn push_snapshot(&self) -> usize {
        let notes = self.stored();
        self.deliver(notes)
    }

    /// Delivers an arbitrary snapshot to every open feed.
    pub fn deliver(&self, notes: Vec<Note>) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.deliver(notes.clone()))
            .count()
    }

    pub fn report_error(&self, message: &str) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.report(GatewayError::Remote(message.to_string())))
            .count()
    }

    fn slots(&self) -> Vec<FeedSlot> {
        self.state.lock().unwrap().feeds.clone()
    }
}

#[async_trait]
impl NoteGateway for ScriptedGateway {
    async fn create(&self, draft: NoteDraft) -> GatewayResult<Note> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(GatewayError::Remote("permission denied".to_string()));
        }
        state.next_id += 1;
        let note = draft
            .to_document()
            .into_note(NoteId::new(format!("doc-{}", state.next_id)));
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn read_all(&self) -> GatewayResult<Vec<Note>> {
        let state = self.state.lock().unwrap();
        if state.fail_read {
            return Err(GatewayError::Remote("network unreachable".to_string()));
        }
        Ok(state.notes.clone())
    }

    fn subscribe(&self, listener: FeedListener) -> GatewayResult<Subscription> {
        let (subscription, slot) = Subscription::open(listener);
        let initial = {
            let mut state = self.state.lock().unwrap();
            state.feeds.push(slot.clone());
            state.notes.clone()
        };
        slot.deliver(initial);
        Ok(subscription)
    }

    async fn update_position(&self, id: &NoteId, x: f64, y: f64) -> GatewayResult<()> {
        let gate = self.state.lock().unwrap().position_gate.clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let mut state = self.state.lock().unwrap();
        state.position_calls.push((id.clone(), x, y));
        if state.fail_update {
            return Err(GatewayError::Remote("write rejected".to_string()));
        }
        match state.notes.iter_mut().find(|note| &note.id == id) {
            Some(note) => {
                note.x = x;
                note.y = y;
                Ok(())
            }
            None => Err(GatewayError::NotFound(id.clone())),
        }
    }

    async fn delete(&self, id: &NoteId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(id.clone());
        if state.fail_delete {
            return Err(GatewayError::Remote("delete rejected".to_string()));
        }
        state.notes.retain(|note| &note.id != id);
        Ok(())
    }
}
