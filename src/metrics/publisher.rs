use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;
use tracing::debug;
use uuid::Uuid;

use super::{SampleStore, Snapshot};
use crate::ticker::Ticker;

/// Default period between broadcast snapshots
pub const DEFAULT_PUBLISH: Duration = Duration::from_millis(1000);

pub type SubscriberId = Uuid;

/// Fans snapshots out to every registered subscriber.
///
/// Each subscriber owns a latest-value-wins `watch` channel: a consumer that
/// falls behind simply sees the newest snapshot next time it polls, so no
/// subscriber can stall the timer or its peers.
pub struct SnapshotPublisher {
    store: Arc<SampleStore>,
    subscribers: Mutex<HashMap<SubscriberId, watch::Sender<Arc<Snapshot>>>>,
}

impl SnapshotPublisher {
    pub fn new(store: Arc<SampleStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Register a new subscriber. Its stream yields the current snapshot
    /// straight away, then every later broadcast or pull.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(Arc::new(self.store.snapshot()));
        let total = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        debug!(%id, subscribers = total, "subscriber registered");

        Subscription {
            id,
            updates: WatchStream::new(rx),
            publisher: Arc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(%id, "subscriber removed");
        }
        removed
    }

    /// Out-of-band pull: push a fresh snapshot to one subscriber only.
    /// Returns `false` if the subscriber is unknown or already gone.
    pub fn request(&self, id: SubscriberId) -> bool {
        let snapshot = Arc::new(self.store.snapshot());
        let delivered = match self.subscribers.lock().get(&id) {
            Some(tx) => tx.send(snapshot).is_ok(),
            None => return false,
        };
        if !delivered {
            self.unsubscribe(id);
        }
        delivered
    }

    /// Broadcast one snapshot to everyone; returns how many received it.
    /// Subscribers whose receiving side has been dropped are removed.
    pub fn publish(&self) -> usize {
        let snapshot = Arc::new(self.store.snapshot());
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|id, tx| {
            let alive = tx.send(snapshot.clone()).is_ok();
            if !alive {
                debug!(%id, "dropping disconnected subscriber");
            }
            alive
        });
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drop every subscriber channel, ending all subscription streams.
    pub fn close(&self) {
        let closed = std::mem::take(&mut *self.subscribers.lock());
        debug!(subscribers = closed.len(), "publisher closed");
    }

    /// Run `publish` every `period` until the returned ticker is stopped.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> Ticker {
        let publisher = self.clone();
        Ticker::spawn("snapshot-publisher", period, move || {
            publisher.publish();
        })
    }
}

// ─── Subscription ────────────────────────────────────────────────

/// A registered consumer's handle. Streams snapshots until the publisher
/// closes; dropping it deregisters the subscriber.
pub struct Subscription {
    id: SubscriberId,
    updates: WatchStream<Arc<Snapshot>>,
    publisher: Weak<SnapshotPublisher>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Ask for a snapshot right now instead of waiting for the next tick.
    pub fn request(&self) -> bool {
        self.publisher
            .upgrade()
            .is_some_and(|publisher| publisher.request(self.id))
    }
}

impl Stream for Subscription {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.updates).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.unsubscribe(self.id);
        }
    }
}
