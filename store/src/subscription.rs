//! Change notification for collection readers.
//!
//! A subscriber is told about a collection's resolved view whenever it
//! changes. Two things trigger a re-read: writes made through the same
//! [`crate::Database`] (pushed through the registry immediately) and a
//! fixed poll interval, which also catches writes made by other handles on
//! the same backend. Subscribers only hear about views that differ from the
//! last one they were given.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use schooldb_engine::Record;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::Result;

/// Unique identifier of a subscription.
pub type SubscriptionId = String;

/// Sender used to wake a subscription for an immediate re-read.
pub type NudgeSender = mpsc::UnboundedSender<()>;

/// Receives every changed view of the collection.
pub type Callback = Arc<dyn Fn(Vec<Record>) + Send + Sync>;

/// Re-reads the collection.
pub(crate) type Refresh = Arc<dyn Fn() -> Result<Vec<Record>> + Send + Sync>;

/// A registered subscriber.
#[derive(Debug)]
struct Subscriber {
    collection: String,
    nudge: NudgeSender,
}

/// Tracks active subscriptions per collection.
///
/// Thread-safe and shared by every clone of a database handle via `Arc`.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscribers: DashMap<SubscriptionId, Subscriber>,
    /// Index of subscription ids by collection.
    by_collection: DashMap<String, Vec<SubscriptionId>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry wrapped in `Arc` for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a subscriber on `collection`. Returns its id.
    pub fn register(&self, collection: impl Into<String>, nudge: NudgeSender) -> SubscriptionId {
        let collection = collection.into();
        let id = uuid::Uuid::new_v4().to_string();

        self.subscribers.insert(
            id.clone(),
            Subscriber {
                collection: collection.clone(),
                nudge,
            },
        );
        self.by_collection
            .entry(collection.clone())
            .or_default()
            .push(id.clone());

        info!(subscription = %id, collection = %collection, "subscription registered");
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, id: &str) {
        let Some((_, subscriber)) = self.subscribers.remove(id) else {
            return;
        };

        if let Some(mut ids) = self.by_collection.get_mut(&subscriber.collection) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                drop(ids);
                self.by_collection
                    .remove_if(&subscriber.collection, |_, ids| ids.is_empty());
            }
        }

        info!(subscription = %id, collection = %subscriber.collection, "subscription unregistered");
    }

    /// Wake every subscriber of `collection`.
    ///
    /// Returns the number of subscribers reached.
    pub fn notify(&self, collection: &str) -> usize {
        let Some(ids) = self.by_collection.get(collection).map(|ids| ids.value().clone()) else {
            return 0;
        };

        let sent = ids
            .iter()
            .filter_map(|id| self.subscribers.get(id))
            .filter(|subscriber| subscriber.nudge.send(()).is_ok())
            .count();

        debug!(collection = %collection, recipients = sent, "notified subscribers");
        sent
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of active subscriptions on `collection`.
    pub fn count_for(&self, collection: &str) -> usize {
        self.by_collection
            .get(collection)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }
}

/// Handle to a live subscription.
///
/// Call [`unsubscribe`](Self::unsubscribe), or drop the handle, to stop
/// future re-reads. A delivery already in progress still completes.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    collection: String,
    registry: Arc<SubscriptionRegistry>,
    stop: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// The subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The watched collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the background watcher is still running.
    pub fn is_active(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| !stop.is_closed())
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
            self.registry.unregister(&self.id);
        }
    }
}

/// Register a subscriber and spawn the task that keeps it up to date.
///
/// `initial` is the view the caller already delivered.
pub(crate) fn spawn_watcher(
    registry: Arc<SubscriptionRegistry>,
    collection: String,
    poll_interval: Duration,
    initial: Vec<Record>,
    refresh: Refresh,
    callback: Callback,
) -> Subscription {
    let (nudge_tx, mut nudge_rx) = mpsc::unbounded_channel();
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let id = registry.register(collection.clone(), nudge_tx);

    let task_id = id.clone();
    let task_collection = collection.clone();
    tokio::spawn(async move {
        let mut last = initial;
        // interval_at panics on a zero period
        let poll_interval = poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                nudge = nudge_rx.recv() => {
                    if nudge.is_none() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }

            // backends may block on filesystem IO
            let reread = refresh.clone();
            let refreshed = match tokio::task::spawn_blocking(move || reread()).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(subscription = %task_id, error = %e, "refresh task failed");
                    continue;
                }
            };

            match refreshed {
                Ok(records) if records != last => {
                    last = records;
                    callback(last.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(subscription = %task_id, collection = %task_collection, error = %e, "refresh failed");
                }
            }
        }

        debug!(subscription = %task_id, "watcher stopped");
    });

    Subscription {
        id,
        collection,
        registry,
        stop: Some(stop_tx),
    }
}
