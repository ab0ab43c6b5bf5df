//! Per-collection change notification.
//!
//! Every collection with listeners owns a [`Channel`]: the ordered listener registry,
//! a FIFO queue of pending deliveries and the handle of the pending flush task.
//!
//! A mutation enqueues one delivery per registered listener and reschedules the
//! flush: the previous, not yet run flush task is aborted and a new one is spawned.
//! A burst of synchronous writes therefore ends up in a single flush pass, where
//! deliveries run back to back in enqueue order. Listeners never run inside the
//! mutating call.
//!
//! Deliveries already queued when a listener unsubscribes still run once.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
    time::Duration,
};

use docmem_core::{
    document::{ChangeType, DocumentChange, DocumentSnapshot, QuerySnapshot},
    error::{DocumentStoreError, DocumentStoreResult},
};
use futures::{Stream, StreamExt, channel::mpsc};
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};

/// A snapshot listener callback.
pub type Listener = Arc<dyn Fn(QuerySnapshot) + Send + Sync>;

type Delivery = Box<dyn FnOnce() + Send>;

type Registry = Mutex<HashMap<String, Arc<Channel>>>;

pub(crate) struct Notifier {
    channels: Arc<Registry>,
    flush_delay: Duration,
    runtime: Option<Handle>,
}

impl Notifier {
    pub fn new(flush_delay: Duration, runtime: Option<Handle>) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            flush_delay,
            runtime,
        }
    }

    /// Returns true if the collection has at least one registered listener.
    pub fn has_listeners(&self, collection: &str) -> bool {
        self.channels
            .lock()
            .get(collection)
            .is_some_and(|channel| !channel.state.lock().listeners.is_empty())
    }

    /// Registers a listener on a collection.
    ///
    /// `existing` is the collection content at registration time. If it is not empty
    /// the listener first receives it as one delivery of `added` changes.
    pub fn subscribe(
        &self,
        collection: &str,
        listener: Listener,
        existing: Vec<DocumentSnapshot>,
    ) -> DocumentStoreResult<Subscription> {
        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| {
                DocumentStoreError::Initialization(
                    "listening for changes requires a tokio runtime".to_string(),
                )
            })?;

        // The registry stays locked until the listener is in place, so an idle
        // channel cannot be released between lookup and registration.
        let mut channels = self.channels.lock();
        let channel = channels
            .entry(collection.to_string())
            .or_insert_with(|| {
                Arc::new(Channel::new(
                    collection,
                    self.flush_delay,
                    runtime,
                    Arc::downgrade(&self.channels),
                ))
            })
            .clone();

        let mut state = channel.state.lock();

        if !existing.is_empty() {
            let changes = existing
                .iter()
                .cloned()
                .map(|doc| DocumentChange::new(ChangeType::Added, doc))
                .collect();
            let snapshot = QuerySnapshot::with_changes(existing, changes);
            let initial = listener.clone();

            state.queue.push_back(Box::new(move || initial(snapshot)));
            channel.schedule(&mut state);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.listeners.push((id, listener));

        log::debug!("Listener {} registered on collection {}", id, collection);
        drop(state);
        drop(channels);

        Ok(Subscription { channel, id })
    }

    /// Enqueues one delivery per listener of `collection` and reschedules the flush.
    ///
    /// `docs` is called once per listener to build that listener's snapshot of the
    /// collection after the mutation.
    pub fn publish<F>(&self, collection: &str, docs: F, change: DocumentChange)
    where
        F: Fn() -> Vec<DocumentSnapshot>,
    {
        let Some(channel) = self.channels.lock().get(collection).cloned() else {
            return;
        };

        let mut state = channel.state.lock();

        if state.listeners.is_empty() {
            return;
        }

        let deliveries = state
            .listeners
            .iter()
            .map(|(_, listener)| {
                let snapshot = QuerySnapshot::with_changes(docs(), vec![change.clone()]);
                let listener = listener.clone();

                Box::new(move || listener(snapshot)) as Delivery
            })
            .collect::<Vec<_>>();

        log::trace!(
            "Enqueued {} {} deliveries for {}/{}",
            deliveries.len(),
            change.change_type(),
            collection,
            change.doc().id()
        );

        state.queue.extend(deliveries);
        channel.schedule(&mut state);
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("collections", &self.channels.lock().keys().collect::<Vec<_>>())
            .field("flush_delay", &self.flush_delay)
            .finish()
    }
}

#[cfg(test)]
impl Notifier {
    fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}

struct Channel {
    name: String,
    flush_delay: Duration,
    runtime: Handle,
    registry: Weak<Registry>,
    state: Mutex<ChannelState>,
}

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    queue: VecDeque<Delivery>,
    pending: Option<JoinHandle<()>>,
    // Set while a flush task is draining the queue; other flush tasks back off.
    draining: bool,
}

impl Channel {
    fn new(name: &str, flush_delay: Duration, runtime: Handle, registry: Weak<Registry>) -> Self {
        Self {
            name: name.to_string(),
            flush_delay,
            runtime,
            registry,
            state: Mutex::new(ChannelState::default()),
        }
    }

    /// Cancels the pending flush, if it has not started yet, and schedules a new one.
    fn schedule(self: &Arc<Self>, state: &mut ChannelState) {
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }

        let channel = Arc::clone(self);
        let delay = self.flush_delay;

        state.pending = Some(self.runtime.spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }

            channel.flush();
        }));
    }

    /// Drains the queue in FIFO order. The lock is released while a delivery runs,
    /// so listeners may write to the store; work they enqueue is drained in the same pass.
    ///
    /// Only one flush drains at a time. A flush that starts while another is draining
    /// returns at once, the active one picks up whatever was queued meanwhile.
    fn flush(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let mut delivered = 0usize;

        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.queue.pop_front();
                if next.is_none() {
                    state.draining = false;
                }
                next
            };

            let Some(delivery) = next else {
                break;
            };

            if catch_unwind(AssertUnwindSafe(delivery)).is_err() {
                log::warn!("A listener on collection {} panicked during delivery", self.name);
            }

            delivered += 1;
        }

        log::debug!("Flushed {} deliveries for collection {}", delivered, self.name);
        self.release_if_idle();
    }

    /// Drops the channel from the registry once it has no listeners and nothing
    /// left to deliver.
    fn release_if_idle(self: &Arc<Self>) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let mut channels = registry.lock();
        let idle = {
            let state = self.state.lock();
            state.listeners.is_empty() && state.queue.is_empty() && !state.draining
        };

        if idle && channels.get(&self.name).is_some_and(|channel| Arc::ptr_eq(channel, self)) {
            channels.remove(&self.name);
            log::debug!("Released idle channel for collection {}", self.name);
        }
    }
}

/// Handle returned by a subscription. Call [`Subscription::unsubscribe`] to stop
/// receiving future changes.
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    channel: Arc<Channel>,
    id: u64,
}

impl Subscription {
    /// Removes the listener from its collection. Calling it more than once is harmless.
    ///
    /// Deliveries that were already enqueued for this listener still run.
    pub fn unsubscribe(&self) {
        let mut state = self.channel.state.lock();
        let before = state.listeners.len();

        state.listeners.retain(|(id, _)| *id != self.id);

        if state.listeners.len() != before {
            log::debug!("Listener {} removed from collection {}", self.id, self.channel.name);
        }

        drop(state);
        self.channel.release_if_idle();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.channel.name)
            .field("id", &self.id)
            .finish()
    }
}

/// A stream of collection snapshots. Dropping the stream unsubscribes.
pub struct SnapshotStream {
    receiver: mpsc::UnboundedReceiver<QuerySnapshot>,
    subscription: Subscription,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<QuerySnapshot>, subscription: Subscription) -> Self {
        Self { receiver, subscription }
    }
}

impl Stream for SnapshotStream {
    type Item = QuerySnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
