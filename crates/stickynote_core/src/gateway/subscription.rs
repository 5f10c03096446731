//! Live feed subscription handle.
//!
//! # Responsibility
//! - Hold the listener callbacks for one live feed.
//! - Give gateway implementations a producer side (`FeedSlot`) and callers a
//!   consumer side (`Subscription`) with a single cancel path.
//!
//! # Invariants
//! - No listener callback starts after `Subscription::cancel` returns.
//! - Cancellation happens at most once; `Drop` cancels if `cancel` was not
//!   called.
//! - Listener callbacks must not call back into the owning `Subscription`;
//!   the slot lock is held while they run.

use crate::gateway::GatewayError;
use crate::model::note::Note;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

type ChangeFn = Box<dyn FnMut(Vec<Note>) + Send>;
type ErrorFn = Box<dyn FnMut(GatewayError) + Send>;

/// Callbacks invoked by a live feed.
pub struct FeedListener {
    on_change: ChangeFn,
    on_error: ErrorFn,
}

impl FeedListener {
    pub fn new<C, E>(on_change: C, on_error: E) -> Self
    where
        C: FnMut(Vec<Note>) + Send + 'static,
        E: FnMut(GatewayError) + Send + 'static,
    {
        Self {
            on_change: Box::new(on_change),
            on_error: Box::new(on_error),
        }
    }
}

/// Producer side of a subscription, held by the feed task.
#[derive(Clone)]
pub struct FeedSlot {
    listener: Arc<Mutex<Option<FeedListener>>>,
}

impl FeedSlot {
    /// Delivers one full-collection snapshot.
    ///
    /// Returns `false` once the subscription is cancelled; the feed task
    /// should stop.
    pub fn deliver(&self, notes: Vec<Note>) -> bool {
        match lock_slot(&self.listener).as_mut() {
            Some(listener) => {
                (listener.on_change)(notes);
                true
            }
            None => false,
        }
    }

    /// Reports a feed error without ending the subscription.
    ///
    /// Returns `false` once the subscription is cancelled.
    pub fn report(&self, err: GatewayError) -> bool {
        match lock_slot(&self.listener).as_mut() {
            Some(listener) => {
                (listener.on_error)(err);
                true
            }
            None => false,
        }
    }

    /// Ends the feed from the producer side, releasing the listener.
    pub fn finish(&self) {
        lock_slot(&self.listener).take();
    }

    pub fn is_cancelled(&self) -> bool {
        lock_slot(&self.listener).is_none()
    }
}

/// Cancellation handle for one live feed.
pub struct Subscription {
    slot: FeedSlot,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Creates a subscription around `listener` and returns its producer.
    pub fn open(listener: FeedListener) -> (Self, FeedSlot) {
        let slot = FeedSlot {
            listener: Arc::new(Mutex::new(Some(listener))),
        };
        let subscription = Self {
            slot: slot.clone(),
            task: None,
        };
        (subscription, slot)
    }

    /// Attaches the task driving this feed so cancel can abort it.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.slot.is_cancelled()
    }

    /// Stops the feed. No callback runs after this returns.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let listener = lock_slot(&self.slot.listener).take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if listener.is_some() {
            debug!("event=feed_cancel module=gateway status=ok");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock_slot(
    listener: &Mutex<Option<FeedListener>>,
) -> MutexGuard<'_, Option<FeedListener>> {
    // A panicking listener must not wedge cancellation.
    listener
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
