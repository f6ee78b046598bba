//! # Live event subscription
//!
//! Keeps a caller up to date with the full event collection of a store.
//!
//! - The first delivery is the initial load; every later one follows a change.
//! - Each delivery is the whole materialized list and replaces the previous one.
//! - Deliveries are sequential. Bursts of changes may coalesce into one.
//! - After [`Subscription::unsubscribe`] returns, the callback is never invoked
//!   again. Dropping the handle unsubscribes as well.
//!
//! Failed snapshot reads are logged and skipped; the next change triggers a
//! fresh read. There is no retry loop of its own.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::Event;
use crate::store::EventStore;

type Callback = Box<dyn FnMut(Vec<Event>) + Send>;

/// Cancellation handle returned by [`subscribe`].
pub struct Subscription {
    /// `None` once unsubscribed. Deliveries run while holding this lock.
    callback: Arc<Mutex<Option<Callback>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Listen to `store` and hand every snapshot to `on_update`.
///
/// Must be called from within a tokio runtime. `on_update` must not call
/// `unsubscribe` on its own handle.
pub fn subscribe<F>(store: Arc<dyn EventStore>, on_update: F) -> Subscription
where
    F: FnMut(Vec<Event>) + Send + 'static,
{
    let callback: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(Some(Box::new(on_update))));
    let slot = Arc::clone(&callback);

    let task = tokio::spawn(async move {
        let mut changes = store.changes();

        loop {
            // Mark the current revision as seen before reading, so a commit
            // landing mid-read triggers another round.
            changes.borrow_and_update();

            let reader = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || reader.list_events()).await {
                Ok(Ok(events)) => {
                    if !deliver(&slot, events) {
                        break;
                    }
                }
                Ok(Err(err)) => warn!(%err, "event snapshot failed, waiting for next change"),
                Err(err) => warn!(%err, "event snapshot task failed"),
            }

            if changes.changed().await.is_err() {
                debug!("event store closed its change feed");
                break;
            }
        }
    });

    Subscription {
        callback,
        task: Mutex::new(Some(task)),
    }
}

/// Returns false once the subscription has been cancelled.
fn deliver(slot: &Mutex<Option<Callback>>, events: Vec<Event>) -> bool {
    let mut guard = match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    match guard.as_mut() {
        Some(on_update) => {
            debug!(events = events.len(), "delivering event snapshot");
            on_update(events);
            true
        }
        None => false,
    }
}

impl Subscription {
    /// Stop listening. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        // Taking the callback waits out any delivery in progress.
        let removed = match self.callback.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let task = match self.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }

        if removed.is_some() {
            debug!("event subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        match self.callback.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventDraft, Winner};
    use crate::house::House;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn draft(name: &str) -> EventDraft {
        EventDraft::new(name, "2025-08-14", "Sports", "Junior")
            .with_winner(Winner::new(1, House::Aloysius, "Kiran", 10))
    }

    #[tokio::test]
    async fn test_initial_load_is_delivered() {
        let store = Arc::new(MemoryStore::new());
        store.create_event(draft("Long Jump")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = subscribe(store.clone(), move |events| {
            let _ = tx.send(events);
        });

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "Long Jump");
    }

    #[tokio::test]
    async fn test_changes_deliver_full_list() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = subscribe(store.clone(), move |events| {
            let _ = tx.send(events);
        });

        let initial = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(initial.is_empty());

        store.create_event(draft("Shot Put")).unwrap();
        store.create_event(draft("High Jump")).unwrap();

        // Deliveries may coalesce; wait until the latest state shows up.
        let mut latest = Vec::new();
        while latest.len() < 2 {
            latest = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        }
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn test_no_delivery_after_unsubscribe() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe(store.clone(), move |events| {
            let _ = tx.send(events);
        });

        timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());

        store.create_event(draft("Chess")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The callback (and its sender) is gone, so the channel is closed
        // with nothing queued.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = subscribe(store.clone(), move |events| {
            let _ = tx.send(events);
        });

        timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        drop(subscription);

        store.create_event(draft("Carrom")).unwrap();
        assert!(rx.recv().await.is_none());
    }
}
