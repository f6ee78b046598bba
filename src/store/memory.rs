// In-memory event store
//
// Same contract as the SQLite store without any I/O. Used as the fake store
// in tests and for demo data.

use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use super::EventStore;
use crate::error::{Error, Result};
use crate::event::{Event, EventDraft};

pub struct MemoryStore {
    /// Insertion order is display order
    events: Arc<RwLock<Vec<Event>>>,
    revision: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    /// Seed the store verbatim. Seeded documents skip validation, so
    /// malformed data can be loaded on purpose.
    pub fn with_events(events: Vec<Event>) -> Self {
        let (revision, _) = watch::channel(0);
        MemoryStore {
            events: Arc::new(RwLock::new(events)),
            revision,
        }
    }

    /// Swap the whole collection at once, as a remote bulk edit would.
    pub fn replace_all(&self, events: Vec<Event>) -> Result<()> {
        *self.events.write()? = events;
        self.bump();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemoryStore {
    fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.events.read()?.clone())
    }

    fn get_event(&self, id: &str) -> Result<Option<Event>> {
        Ok(self.events.read()?.iter().find(|e| e.id == id).cloned())
    }

    fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let draft = draft.prepare()?;
        let event = Event::from_draft(uuid::Uuid::new_v4().to_string(), draft);
        self.events.write()?.push(event.clone());
        self.bump();
        Ok(event)
    }

    fn update_event(&self, id: &str, draft: EventDraft) -> Result<Event> {
        let draft = draft.prepare()?;
        let updated = {
            let mut events = self.events.write()?;
            let slot = events
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            *slot = Event::from_draft(id, draft);
            slot.clone()
        };
        self.bump();
        Ok(updated)
    }

    fn delete_event(&self, id: &str) -> Result<()> {
        {
            let mut events = self.events.write()?;
            let before = events.len();
            events.retain(|e| e.id != id);
            if events.len() == before {
                return Err(Error::NotFound(id.to_string()));
            }
        }
        self.bump();
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Winner;
    use crate::house::House;

    fn draft(name: &str) -> EventDraft {
        EventDraft::new(name, "2025-08-14", "Sports", "Junior")
            .with_winner(Winner::new(1, House::Delany, "Ravi", 10))
    }

    #[test]
    fn test_crud_cycle() {
        let store = MemoryStore::new();

        let created = store.create_event(draft("Sprint")).unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(store.len(), 1);

        let mut changed = draft("Sprint Final");
        changed.winners[0].points = 15;
        let updated = store.update_event(&created.id, changed).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.winners[0].points, 15);

        let fetched = store.get_event(&created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Sprint Final");

        store.delete_event(&created.id).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_padded_fields_are_trimmed_on_write() {
        let store = MemoryStore::new();
        let mut padded = draft(" Sprint ");
        padded.winners[0].house = " Delany ".to_string();

        let created = store.create_event(padded).unwrap();
        assert_eq!(created.name, "Sprint");
        assert_eq!(created.winners[0].house, "Delany");
        assert_eq!(created.winners[0].house(), Some(House::Delany));
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_event("nope", draft("X")),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(store.delete_event("nope"), Err(Error::NotFound(_))));
        assert!(store.get_event("nope").unwrap().is_none());
    }

    #[test]
    fn test_invalid_draft_is_rejected_without_bump() {
        let store = MemoryStore::new();
        let mut changes = store.changes();
        changes.borrow_and_update();

        assert!(store.create_event(EventDraft::default()).is_err());
        assert!(!changes.has_changed().unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_writes_bump_revision() {
        let store = MemoryStore::new();
        let mut changes = store.changes();
        changes.borrow_and_update();

        store.create_event(draft("Relay")).unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);

        store.replace_all(Vec::new()).unwrap();
        assert_eq!(*changes.borrow_and_update(), 2);
    }
}
