//! Per-sender work queues.
//!
//! Every sender gets a FIFO queue and a drain lock. Whoever enqueues into an
//! idle sender wins a [`DrainPermit`] and runs the drain loop; later arrivals
//! only append and are picked up by that same loop. Once the queue empties the
//! sender's entry is removed under the same mutex that guards enqueueing, so a
//! late arrival either lands before teardown (and is drained) or after it (and
//! wins a fresh permit).
//!
//! A permit dropped before its loop tears the sender down (an aborted drain
//! task, for instance) unlocks the sender again. Items still queued stay there
//! and the sender's next enqueue wins a permit that drains them.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::{
    conversation::ConversationState,
    domain::SenderId,
    errors::Error,
    ports::{CompletionClient, DeliverySink},
    processor::MessageProcessor,
};

/// One pending unit of work for a sender.
///
/// Carries the collaborator handles bound when the event was enqueued.
#[derive(Clone)]
pub struct WorkItem {
    pub sender: SenderId,
    pub body: String,
    pub conversation: Arc<ConversationState>,
    pub sink: Arc<dyn DeliverySink>,
    pub completion: Arc<dyn CompletionClient>,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("sender", &self.sender)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SenderLock {
    Unlocked,
    Locked,
}

/// Queue and lock for one sender. Both live in one map entry so they are
/// created and torn down together.
struct SenderEntry {
    queue: VecDeque<WorkItem>,
    lock: SenderLock,
}

impl SenderEntry {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            lock: SenderLock::Unlocked,
        }
    }
}

type Entries = Mutex<HashMap<SenderId, SenderEntry>>;

// Critical sections never panic, so a poisoned map is still consistent.
fn lock_entries(entries: &Entries) -> MutexGuard<'_, HashMap<SenderId, SenderEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Proof that the holder owns the drain loop for `sender`.
///
/// Dropping a permit whose loop has not finished unlocks the sender.
#[must_use = "dropping the permit unlocks the sender without draining it"]
#[derive(Debug)]
pub struct DrainPermit {
    sender: SenderId,
    entries: Weak<Entries>,
    released: bool,
}

impl DrainPermit {
    pub fn sender(&self) -> &SenderId {
        &self.sender
    }
}

impl Drop for DrainPermit {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let mut state = lock_entries(&entries);
        let pending = match state.get_mut(&self.sender) {
            Some(entry) if entry.lock == SenderLock::Locked => {
                entry.lock = SenderLock::Unlocked;
                entry.queue.len()
            }
            _ => return,
        };
        if pending == 0 {
            state.remove(&self.sender);
        } else {
            warn!(sender = %self.sender, pending, "drain abandoned, next enqueue restarts it");
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Outcome of one drain loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct QueueRegistry {
    entries: Arc<Entries>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<SenderId, SenderEntry>> {
        lock_entries(&self.entries)
    }

    /// Append `item` to its sender's queue, creating the queue if absent.
    pub fn enqueue(&self, item: WorkItem) {
        let mut state = self.state();
        push(&mut state, item);
    }

    /// Lock `sender` for draining if nobody else is draining it.
    ///
    /// Succeeds only while the sender is unlocked with pending work, i.e. for
    /// the first caller after the queue went from empty to non-empty.
    pub fn try_start_drain(&self, sender: &SenderId) -> Option<DrainPermit> {
        let mut state = self.state();
        self.try_lock(&mut state, sender)
    }

    /// [`enqueue`](Self::enqueue) and [`try_start_drain`](Self::try_start_drain)
    /// as one critical section.
    pub fn enqueue_and_try_start(&self, item: WorkItem) -> Option<DrainPermit> {
        let sender = item.sender.clone();
        let mut state = self.state();
        push(&mut state, item);
        self.try_lock(&mut state, &sender)
    }

    fn try_lock(
        &self,
        state: &mut HashMap<SenderId, SenderEntry>,
        sender: &SenderId,
    ) -> Option<DrainPermit> {
        let entry = state.get_mut(sender)?;
        if entry.lock == SenderLock::Locked || entry.queue.is_empty() {
            return None;
        }
        entry.lock = SenderLock::Locked;
        Some(DrainPermit {
            sender: sender.clone(),
            entries: Arc::downgrade(&self.entries),
            released: false,
        })
    }

    /// Pop the next item for the permit's sender, or tear the sender down.
    ///
    /// Emptiness is checked under the same lock as [`enqueue`](Self::enqueue),
    /// so an item is never stranded between the last pop and the teardown.
    fn next_or_release(&self, permit: &mut DrainPermit) -> Option<WorkItem> {
        let mut state = self.state();
        let sender = &permit.sender;

        let Some(entry) = state.get_mut(sender) else {
            report_inconsistency(sender, "draining a sender with no queue entry");
            permit.released = true;
            return None;
        };
        if entry.lock != SenderLock::Locked {
            report_inconsistency(sender, "draining a sender that is not locked");
            permit.released = true;
            return None;
        }

        if let Some(item) = entry.queue.pop_front() {
            return Some(item);
        }

        state.remove(sender);
        permit.released = true;
        None
    }

    /// Run the drain loop for the permit's sender until its queue is empty.
    ///
    /// Each item runs in its own task and is awaited to completion before the
    /// next one is popped. A failing or panicking item is logged and skipped.
    /// If this future is dropped mid-item, the item's task is aborted and the
    /// permit unlocks the sender.
    pub async fn drain(
        &self,
        mut permit: DrainPermit,
        processor: Arc<MessageProcessor>,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        debug!(sender = %permit.sender(), "drain started");

        while let Some(item) = self.next_or_release(&mut permit) {
            let processor = processor.clone();
            let task = tokio::spawn(async move { processor.process(&item).await });
            let _abort = AbortOnDrop(task.abort_handle());
            let outcome = task.await;

            match outcome {
                Ok(Ok(())) => report.processed += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(sender = %permit.sender(), error = %e, "message processing failed");
                }
                Err(join) => {
                    report.failed += 1;
                    error!(sender = %permit.sender(), error = %join, "message processing task aborted");
                }
            }
        }

        info!(
            sender = %permit.sender(),
            processed = report.processed,
            failed = report.failed,
            "queue drained"
        );
        report
    }

    pub fn is_tracked(&self, sender: &SenderId) -> bool {
        self.state().contains_key(sender)
    }

    pub fn is_draining(&self, sender: &SenderId) -> bool {
        self.state()
            .get(sender)
            .is_some_and(|e| e.lock == SenderLock::Locked)
    }

    /// Items waiting behind the one currently being processed.
    pub fn pending(&self, sender: &SenderId) -> usize {
        self.state().get(sender).map_or(0, |e| e.queue.len())
    }

    pub fn active_senders(&self) -> Vec<SenderId> {
        let mut senders: Vec<SenderId> = self.state().keys().cloned().collect();
        senders.sort();
        senders
    }

    pub fn len(&self) -> usize {
        self.state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().is_empty()
    }
}

fn push(state: &mut HashMap<SenderId, SenderEntry>, item: WorkItem) {
    let sender = item.sender.clone();
    let entry = state.entry(sender.clone()).or_insert_with(SenderEntry::new);
    entry.queue.push_back(item);
    debug!(%sender, queued = entry.queue.len(), "work item enqueued");
}

fn report_inconsistency(sender: &SenderId, what: &str) {
    let err = Error::RegistryInconsistency(format!("{what}: {sender}"));
    error!(error = %err, "queue registry invariant violated");
}
