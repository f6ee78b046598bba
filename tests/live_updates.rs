// End-to-end: store writes flow through the subscription into standings and
// the carousel.

use festival_scoreboard::{
    compute_standings, subscribe, Carousel, Event, EventDraft, EventStore, House, MemoryStore,
    SqliteStore, Winner,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next_snapshot(rx: &mut mpsc::UnboundedReceiver<Vec<Event>>) -> Vec<Event> {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no snapshot within 5s")
        .expect("subscription closed")
}

#[tokio::test]
async fn test_writes_reach_the_standings() {
    let store = Arc::new(MemoryStore::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscribe(store.clone(), move |events| {
        let _ = tx.send(events);
    });

    assert!(next_snapshot(&mut rx).await.is_empty());

    store
        .create_event(
            EventDraft::new("Debate", "2025-08-14", "Literary", "Senior")
                .with_winner(Winner::new(1, House::Tagore, "Arjun", 10))
                .with_winner(Winner::new(2, House::Delany, "Kiran", 5)),
        )
        .unwrap();

    let events = next_snapshot(&mut rx).await;
    let standings = compute_standings(&events);
    assert_eq!(standings.entries[0].house, House::Tagore);
    assert_eq!(standings.entries[1].house, House::Delany);
    assert_eq!(
        standings.entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
        vec![1, 2, 3, 3]
    );

    let mut carousel = Carousel::new(&events);
    assert_eq!(carousel.current().unwrap().subtitle(), "14/08/2025 • Literary • Senior");
    carousel.advance_by(7);
    assert_eq!(carousel.index(), 0);

    subscription.unsubscribe();
}

#[tokio::test]
async fn test_sqlite_poller_feeds_subscription() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("festival.db");

    let dashboard = Arc::new(SqliteStore::open(&path).unwrap());
    let poller = dashboard.spawn_change_poller(Duration::from_millis(20));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscribe(dashboard.clone(), move |events| {
        let _ = tx.send(events);
    });
    assert!(next_snapshot(&mut rx).await.is_empty());

    // Another process writing to the same database file
    let admin = SqliteStore::open(&path).unwrap();
    admin
        .create_event(
            EventDraft::new("Relay", "2025-08-15", "Sports", "Junior")
                .with_winner(Winner::new(1, House::Gandhi, "Team G", 10)),
        )
        .unwrap();

    let events = next_snapshot(&mut rx).await;
    assert_eq!(events.len(), 1);
    assert_eq!(compute_standings(&events).leader().unwrap().house, House::Gandhi);

    subscription.unsubscribe();
    poller.abort();
}
