// Event Store - the document collection behind the dashboard
//
// Every store exposes two things:
// - CRUD on single event documents (admin writes, validated)
// - a change feed: a revision counter bumped after every committed change
//
// The subscription adapter only needs `list_events` plus `changes`.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{setup_database, SqliteStore};

use tokio::sync::watch;

use crate::error::Result;
use crate::event::{Event, EventDraft};

pub trait EventStore: Send + Sync {
    /// Full materialized collection, in display order.
    fn list_events(&self) -> Result<Vec<Event>>;

    fn get_event(&self, id: &str) -> Result<Option<Event>>;

    /// Validate and insert a draft; the store assigns the id.
    fn create_event(&self, draft: EventDraft) -> Result<Event>;

    /// Replace the fields of an existing event. `Error::NotFound` if absent.
    fn update_event(&self, id: &str, draft: EventDraft) -> Result<Event>;

    /// `Error::NotFound` if absent.
    fn delete_event(&self, id: &str) -> Result<()>;

    /// Revision feed. The value is opaque; only changes matter.
    fn changes(&self) -> watch::Receiver<u64>;
}
