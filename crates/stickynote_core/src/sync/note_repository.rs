//! Note repository: in-memory note state mediated against a gateway.
//!
//! # Responsibility
//! - Load notes by bulk read or keep them current from a live feed.
//! - Apply drag displacements optimistically and persist them in the
//!   background.
//! - Release the live feed exactly once on shutdown.
//!
//! # Invariants
//! - Note ids are unique within `notes`; snapshots are deduplicated keeping
//!   the first occurrence.
//! - A drag is written to memory before its remote write is spawned.
//! - Failed position writes are logged and never rolled back. A feed
//!   snapshot landing before the write completes may show the old position
//!   until a later snapshot arrives.
//! - Concurrent writers are not merged; the last state observed via the
//!   feed wins.

use crate::gateway::{FeedListener, GatewayError, NoteGateway, Subscription};
use crate::model::note::{is_finite_position, Note, NoteDraft, NoteId};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type SyncResult<T> = Result<T, SyncError>;

/// How the repository keeps its note list current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One bulk read at start; creates are appended from their return value.
    ManualFetch,
    /// Every feed snapshot replaces memory; creates show up via the feed.
    LiveFeed,
    /// `LiveFeed` plus optimistic drag positioning.
    LiveFeedWithDrag,
}

impl SyncMode {
    pub fn is_live(self) -> bool {
        matches!(self, Self::LiveFeed | Self::LiveFeedWithDrag)
    }

    pub fn allows_drag(self) -> bool {
        matches!(self, Self::LiveFeedWithDrag)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ManualFetch => "manual_fetch",
            Self::LiveFeed => "live_feed",
            Self::LiveFeedWithDrag => "live_feed_with_drag",
        }
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Sync-layer error.
#[derive(Debug)]
pub enum SyncError {
    Gateway(GatewayError),
    AlreadyStarted,
    ModeMismatch {
        mode: SyncMode,
        operation: &'static str,
    },
    DragDisabled(SyncMode),
    /// Rejected before memory or the store was touched.
    InvalidPosition { x: f64, y: f64 },
    NoRuntime,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway(err) => write!(f, "{err}"),
            Self::AlreadyStarted => write!(f, "note repository already started"),
            Self::ModeMismatch { mode, operation } => {
                write!(f, "`{operation}` is not available in {mode} mode")
            }
            Self::DragDisabled(mode) => write!(f, "dragging notes is disabled in {mode} mode"),
            Self::InvalidPosition { x, y } => {
                write!(f, "note position ({x}, {y}) is not a finite number pair")
            }
            Self::NoRuntime => write!(f, "position writes require a running tokio runtime"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for SyncError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

/// Result of applying one feed event.
#[derive(Debug)]
pub enum FeedUpdate {
    /// A snapshot replaced memory. `count` is the resulting note count.
    Snapshot { changed: bool, count: usize },
    /// The feed reported an error; the subscription stays open.
    Error(GatewayError),
}

/// Summary of one non-blocking `pump_feed` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedPump {
    pub snapshots: usize,
    pub errors: usize,
    pub changed: bool,
}

/// Background position write spawned by `move_note`.
pub struct PositionWrite {
    pub id: NoteId,
    pub x: f64,
    pub y: f64,
    task: JoinHandle<()>,
}

impl PositionWrite {
    pub fn is_settled(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the remote write has succeeded or been logged as failed.
    pub async fn settled(self) {
        if let Err(err) = self.task.await {
            warn!(
                "event=note_move module=sync status=error note_id={} error_code=write_task_failed error={}",
                self.id, err
            );
        }
    }
}

enum FeedEvent {
    Snapshot(Vec<Note>),
    Error(GatewayError),
}

struct LiveFeed {
    subscription: Subscription,
    events: mpsc::UnboundedReceiver<FeedEvent>,
}

/// In-memory note list kept consistent with a `NoteGateway`.
///
/// Dropping the repository cancels any open live feed.
pub struct NoteRepository<G: NoteGateway + 'static> {
    gateway: Arc<G>,
    mode: SyncMode,
    notes: Vec<Note>,
    started: bool,
    feed: Option<LiveFeed>,
}

impl<G: NoteGateway + 'static> NoteRepository<G> {
    pub fn new(gateway: Arc<G>, mode: SyncMode) -> Self {
        Self {
            gateway,
            mode,
            notes: Vec::new(),
            started: false,
            feed: None,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Current notes in display order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Owned copy of the current notes for rendering off-task.
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.clone()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns whether a live feed is currently open.
    pub fn is_live(&self) -> bool {
        self.feed
            .as_ref()
            .is_some_and(|feed| feed.subscription.is_active())
    }

    /// Loads initial state: bulk read in manual mode, live feed otherwise.
    ///
    /// # Errors
    /// - `AlreadyStarted` on a second call.
    /// - Gateway read or subscribe failures, unchanged.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.started {
            return Err(SyncError::AlreadyStarted);
        }

        if self.mode.is_live() {
            self.open_feed()?;
        } else {
            self.load_all().await?;
        }
        self.started = true;
        info!(
            "event=sync_start module=sync status=ok mode={} count={}",
            self.mode,
            self.notes.len()
        );
        Ok(())
    }

    /// Re-reads every note. Manual-fetch mode only.
    pub async fn refresh(&mut self) -> SyncResult<bool> {
        if self.mode.is_live() {
            return Err(SyncError::ModeMismatch {
                mode: self.mode,
                operation: "refresh",
            });
        }
        self.load_all().await
    }

    /// Creates one note remotely.
    ///
    /// In manual mode the returned note is appended to memory. In live modes
    /// memory is left to the next feed snapshot.
    ///
    /// # Errors
    /// - `InvalidPosition` for a NaN or infinite coordinate; nothing is sent.
    /// - Gateway create failures propagate; memory is unchanged.
    pub async fn add_note(&mut self, draft: NoteDraft) -> SyncResult<Note> {
        if !draft.has_finite_position() {
            return Err(SyncError::InvalidPosition {
                x: draft.x.unwrap_or_default(),
                y: draft.y.unwrap_or_default(),
            });
        }
        let created = match self.gateway.create(draft).await {
            Ok(note) => note,
            Err(err) => {
                error!(
                    "event=note_add module=sync status=error mode={} error={}",
                    self.mode, err
                );
                return Err(err.into());
            }
        };

        if !self.mode.is_live() {
            self.upsert(created.clone());
        }
        info!(
            "event=note_add module=sync status=ok mode={} note_id={}",
            self.mode, created.id
        );
        Ok(created)
    }

    /// Applies a drag displacement to one note.
    ///
    /// Memory is updated before this returns; the remote write runs in the
    /// background and its failure is only logged. Returns `Ok(None)` when
    /// `id` is not in memory.
    ///
    /// # Errors
    /// - `DragDisabled` outside `LiveFeedWithDrag` mode.
    /// - `NoRuntime` when called outside a tokio runtime; memory is unchanged.
    /// - `InvalidPosition` when the displaced position is not finite; memory
    ///   is unchanged and no write is spawned.
    pub fn move_note(
        &mut self,
        id: &NoteId,
        dx: f64,
        dy: f64,
    ) -> SyncResult<Option<PositionWrite>> {
        if !self.mode.allows_drag() {
            return Err(SyncError::DragDisabled(self.mode));
        }
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let Some(note) = self.notes.iter_mut().find(|note| &note.id == id) else {
            debug!(
                "event=note_move module=sync status=skipped note_id={} reason=not_in_memory",
                id
            );
            return Ok(None);
        };
        let (x, y) = note.displaced(dx, dy);
        if !is_finite_position(x, y) {
            warn!(
                "event=note_move module=sync status=rejected note_id={} reason=non_finite",
                id
            );
            return Err(SyncError::InvalidPosition { x, y });
        }
        note.x = x;
        note.y = y;

        let gateway = Arc::clone(&self.gateway);
        let target = id.clone();
        let task = runtime.spawn(async move {
            match gateway.update_position(&target, x, y).await {
                Ok(()) => debug!(
                    "event=note_move module=sync status=ok note_id={}",
                    target
                ),
                Err(err) => warn!(
                    "event=note_move module=sync status=error note_id={} rollback=none error={}",
                    target, err
                ),
            }
        });

        Ok(Some(PositionWrite {
            id: id.clone(),
            x,
            y,
            task,
        }))
    }

    /// Deletes one note remotely, then removes it from memory.
    ///
    /// Returns `Ok(false)` without a remote call when `id` is not in memory.
    ///
    /// # Errors
    /// - Gateway delete failures propagate; memory is unchanged.
    pub async fn delete_note(&mut self, id: &NoteId) -> SyncResult<bool> {
        if self.get(id).is_none() {
            debug!(
                "event=note_delete module=sync status=skipped note_id={} reason=not_in_memory",
                id
            );
            return Ok(false);
        }

        if let Err(err) = self.gateway.delete(id).await {
            warn!(
                "event=note_delete module=sync status=error note_id={} error={}",
                id, err
            );
            return Err(err.into());
        }

        self.notes.retain(|note| &note.id != id);
        info!(
            "event=note_delete module=sync status=ok note_id={}",
            id
        );
        Ok(true)
    }

    /// Replaces memory with `notes`. Returns whether anything changed.
    pub fn apply_snapshot(&mut self, notes: Vec<Note>) -> bool {
        let mut seen = HashSet::with_capacity(notes.len());
        let deduped: Vec<Note> = notes
            .into_iter()
            .filter(|note| seen.insert(note.id.clone()))
            .collect();
        if deduped == self.notes {
            return false;
        }
        self.notes = deduped;
        true
    }

    /// Applies every queued feed event without waiting.
    pub fn pump_feed(&mut self) -> FeedPump {
        let mut pump = FeedPump::default();
        while let Some(event) = self.feed.as_mut().and_then(|feed| feed.events.try_recv().ok()) {
            match self.apply_event(event) {
                FeedUpdate::Snapshot { changed, .. } => {
                    pump.snapshots += 1;
                    pump.changed |= changed;
                }
                FeedUpdate::Error(_) => pump.errors += 1,
            }
        }
        pump
    }

    /// Waits for the next feed event and applies it.
    ///
    /// Returns `None` when no feed is open or the feed has ended.
    pub async fn next_feed_update(&mut self) -> Option<FeedUpdate> {
        let event = self.feed.as_mut()?.events.recv().await?;
        Some(self.apply_event(event))
    }

    /// Cancels the live feed. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.subscription.cancel();
            info!(
                "event=sync_shutdown module=sync status=ok mode={}",
                self.mode
            );
        }
    }

    async fn load_all(&mut self) -> SyncResult<bool> {
        match self.gateway.read_all().await {
            Ok(notes) => Ok(self.apply_snapshot(notes)),
            Err(err) => {
                error!(
                    "event=note_read_all module=sync status=error error={}",
                    err
                );
                Err(err.into())
            }
        }
    }

    fn open_feed(&mut self) -> SyncResult<()> {
        let (sender, events) = mpsc::unbounded_channel();
        let error_sender = sender.clone();
        // Sends fail only after the repository dropped its receiver.
        let listener = FeedListener::new(
            move |notes| {
                let _ = sender.send(FeedEvent::Snapshot(notes));
            },
            move |err| {
                let _ = error_sender.send(FeedEvent::Error(err));
            },
        );
        let subscription = self.gateway.subscribe(listener)?;
        self.feed = Some(LiveFeed {
            subscription,
            events,
        });
        Ok(())
    }

    fn apply_event(&mut self, event: FeedEvent) -> FeedUpdate {
        match event {
            FeedEvent::Snapshot(notes) => {
                let changed = self.apply_snapshot(notes);
                debug!(
                    "event=feed_snapshot module=sync status=ok changed={} count={}",
                    changed,
                    self.notes.len()
                );
                FeedUpdate::Snapshot {
                    changed,
                    count: self.notes.len(),
                }
            }
            FeedEvent::Error(err) => {
                warn!("event=feed_error module=sync status=error error={}", err);
                FeedUpdate::Error(err)
            }
        }
    }

    fn upsert(&mut self, note: Note) {
        match self.notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => *existing = note,
            None => self.notes.push(note),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteRepository, SyncError, SyncMode};
    use crate::gateway::{FeedListener, GatewayError, GatewayResult, NoteGateway, Subscription};
    use crate::model::note::{Note, NoteDraft, NoteId};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct OfflineGateway;

    #[async_trait]
    impl NoteGateway for OfflineGateway {
        async fn create(&self, _draft: NoteDraft) -> GatewayResult<Note> {
            Err(GatewayError::Remote("offline".to_string()))
        }

        async fn read_all(&self) -> GatewayResult<Vec<Note>> {
            Err(GatewayError::Remote("offline".to_string()))
        }

        fn subscribe(&self, listener: FeedListener) -> GatewayResult<Subscription> {
            Ok(Subscription::open(listener).0)
        }

        async fn update_position(&self, _id: &NoteId, _x: f64, _y: f64) -> GatewayResult<()> {
            Err(GatewayError::Remote("offline".to_string()))
        }

        async fn delete(&self, _id: &NoteId) -> GatewayResult<()> {
            Err(GatewayError::Remote("offline".to_string()))
        }
    }

    fn repo(mode: SyncMode) -> NoteRepository<OfflineGateway> {
        NoteRepository::new(Arc::new(OfflineGateway), mode)
    }

    #[test]
    fn snapshot_replay_is_idempotent() {
        let mut repo = repo(SyncMode::LiveFeed);
        let snapshot = vec![
            Note::new("1", "one", 1.0, 2.0),
            Note::new("2", "two", 0.0, 0.0),
        ];

        assert!(repo.apply_snapshot(snapshot.clone()));
        let first = repo.snapshot();
        assert!(!repo.apply_snapshot(snapshot));
        assert_eq!(repo.snapshot(), first);
    }

    #[test]
    fn snapshot_keeps_first_note_per_id() {
        let mut repo = repo(SyncMode::LiveFeed);
        repo.apply_snapshot(vec![
            Note::new("1", "first", 0.0, 0.0),
            Note::new("1", "duplicate", 9.0, 9.0),
            Note::new("2", "second", 0.0, 0.0),
        ]);

        assert_eq!(repo.len(), 2);
        assert_eq!(repo.notes()[0].text, "first");
    }

    #[test]
    fn drag_is_rejected_outside_drag_mode() {
        let mut repo = repo(SyncMode::LiveFeed);
        repo.apply_snapshot(vec![Note::new("1", "one", 0.0, 0.0)]);

        let err = repo
            .move_note(&NoteId::new("1"), 1.0, 1.0)
            .err()
            .expect("live feed without drag must reject moves");
        assert!(matches!(err, SyncError::DragDisabled(SyncMode::LiveFeed)));
        assert_eq!(repo.notes()[0].x, 0.0);
    }

    #[test]
    fn drag_outside_runtime_leaves_memory_untouched() {
        let mut repo = repo(SyncMode::LiveFeedWithDrag);
        repo.apply_snapshot(vec![Note::new("1", "one", 0.0, 0.0)]);

        let err = repo
            .move_note(&NoteId::new("1"), 1.0, 1.0)
            .err()
            .expect("no runtime must be reported");
        assert!(matches!(err, SyncError::NoRuntime));
        assert_eq!((repo.notes()[0].x, repo.notes()[0].y), (0.0, 0.0));
    }

    #[test]
    fn mode_flags() {
        assert!(!SyncMode::ManualFetch.is_live());
        assert!(SyncMode::LiveFeed.is_live());
        assert!(!SyncMode::LiveFeed.allows_drag());
        assert!(SyncMode::LiveFeedWithDrag.allows_drag());
    }
}
