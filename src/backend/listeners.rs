use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use super::{BackendError, Collection, Document, Fields, Query};

pub type Snapshot = Result<Vec<Document>, BackendError>;

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

/// Live-query bookkeeping shared by the document stores.
///
/// Registration and delivery both happen under the registry lock, so every
/// subscriber sees snapshots in the order the writes were committed.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(|poisoned| {
            log::error!("Listener registry lock was poisoned! Recovering lock.");
            poisoned.into_inner()
        })
    }

    /// Registers `query` and queues its current result set as the first
    /// snapshot. `run` executes the query against the owning store.
    pub fn register<F>(self: &Arc<Self>, query: Query, run: F) -> Result<DocumentSubscription, BackendError>
    where
        F: FnOnce(&Query) -> Snapshot,
    {
        let mut listeners = self.lock();
        let initial = run(&query)?;

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(Ok(initial));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("Live subscription {} opened on '{}'", id, query.collection);
        listeners.insert(id, Listener { query, tx });

        Ok(DocumentSubscription {
            rx,
            handle: CancelHandle {
                id,
                registry: Arc::downgrade(self),
            },
        })
    }

    /// Pushes a fresh snapshot to every listener on `collection` whose filter
    /// matches one of the `touched` document bodies (pass both the old and
    /// the new body for updates). Listeners whose receiver is gone, or whose
    /// query failed, are removed after delivery.
    pub fn notify<F>(&self, collection: Collection, touched: &[&Fields], mut run: F)
    where
        F: FnMut(&Query) -> Snapshot,
    {
        let mut listeners = self.lock();
        let mut finished = Vec::new();

        for (id, listener) in listeners.iter() {
            if listener.query.collection != collection
                || !touched.iter().any(|fields| listener.query.matches(fields))
            {
                continue;
            }
            if listener.tx.is_closed() {
                finished.push(*id);
                continue;
            }

            let snapshot = run(&listener.query);
            let failed = match &snapshot {
                Ok(_) => false,
                Err(e) => {
                    log::error!("Live subscription {} failed on '{}': {}", id, collection, e);
                    true
                }
            };
            if listener.tx.send(snapshot).is_err() || failed {
                finished.push(*id);
            }
        }

        for id in finished {
            listeners.remove(&id);
            log::debug!("Live subscription {} closed", id);
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn cancel(&self, id: u64) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::debug!("Live subscription {} cancelled", id);
        }
        removed
    }

    fn is_registered(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }
}

/// Releases a live subscription. Cloneable; cancelling twice is a no-op.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.cancel(self.id);
        }
    }

    /// True while the subscription is still delivering updates.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.is_registered(self.id))
    }
}

/// Stream of full snapshots for one live query.
///
/// The stream ends after an error, after `cancel`, or when the store goes
/// away. Dropping it cancels the subscription.
pub struct DocumentSubscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    handle: CancelHandle,
}

impl DocumentSubscription {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Stream for DocumentSubscription {
    type Item = Snapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for DocumentSubscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn body(post_id: &str) -> Fields {
        json!({ "postId": post_id }).as_object().cloned().unwrap_or_default()
    }

    fn comments_for(post_id: &str) -> Query {
        Query::collection(Collection::Comments).where_eq("postId", post_id)
    }

    #[actix_web::test]
    async fn initial_snapshot_is_delivered_on_register() {
        let registry = ListenerRegistry::new();
        let mut sub = registry
            .register(comments_for("p1"), |_| Ok(Vec::new()))
            .unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert!(first.is_empty());
        assert_eq!(registry.active_count(), 1);
    }

    #[actix_web::test]
    async fn notify_skips_listeners_whose_filter_does_not_match() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(comments_for("p1"), |_| Ok(Vec::new())).unwrap();
        let mut sub = sub.skip(1);

        let mut runs = 0;
        registry.notify(Collection::Comments, &[&body("p2")], |_| {
            runs += 1;
            Ok(Vec::new())
        });
        assert_eq!(runs, 0);

        registry.notify(Collection::Comments, &[&body("p1")], |_| Ok(Vec::new()));
        assert!(sub.next().await.unwrap().is_ok());
    }

    #[test]
    fn dropping_the_subscription_unregisters_it() {
        let registry = ListenerRegistry::new();
        let sub = registry.register(comments_for("p1"), |_| Ok(Vec::new())).unwrap();
        let handle = sub.cancel_handle();
        assert!(handle.is_active());

        drop(sub);
        assert!(!handle.is_active());
        assert_eq!(registry.active_count(), 0);
    }

    #[actix_web::test]
    async fn failed_query_ends_the_subscription() {
        let registry = ListenerRegistry::new();
        let mut sub = registry.register(comments_for("p1"), |_| Ok(Vec::new())).unwrap();
        let _ = sub.next().await;

        registry.notify(Collection::Comments, &[&body("p1")], |_| {
            Err(BackendError::Unavailable("offline".to_string()))
        });

        assert!(sub.next().await.unwrap().is_err());
        assert!(sub.next().await.is_none());
        assert_eq!(registry.active_count(), 0);
    }
}
