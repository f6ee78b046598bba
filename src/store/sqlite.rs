// SQLite event store
//
// One row per event document; winners live in a JSON column so a document
// keeps its shape however many winners it carries. Writes made through this
// store bump the change feed directly. Commits from other processes (an admin
// CLI next to a running dashboard) are picked up by polling
// `PRAGMA data_version`.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::EventStore;
use crate::error::{Error, Result};
use crate::event::{winners_from_value, Event, EventDraft, Winner};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    revision: watch::Sender<u64>,
    /// Last `PRAGMA data_version` seen on `conn`
    data_version: Mutex<i64>,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode so readers in other processes don't block writers
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            date TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            grade_level TEXT NOT NULL DEFAULT '',
            winners TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_date ON events(date)",
        [],
    )?;

    Ok(())
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened event database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        let version = read_data_version(&conn)?;
        let (revision, _) = watch::channel(0);

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            revision,
            data_version: Mutex::new(version),
        })
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Bump the change feed if another connection committed since the last
    /// check. Returns whether a change was seen.
    pub fn check_external_changes(&self) -> Result<bool> {
        let current = {
            let conn = self.conn.lock()?;
            read_data_version(&conn)?
        };

        let mut last = self.data_version.lock()?;
        if current == *last {
            return Ok(false);
        }

        *last = current;
        self.bump();
        Ok(true)
    }

    /// Poll for commits made by other processes. The task stops on its own
    /// once the store is dropped.
    pub fn spawn_change_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(store) = store.upgrade() else {
                    debug!("event store dropped, stopping change poller");
                    break;
                };

                match store.check_external_changes() {
                    Ok(true) => debug!("external commit detected"),
                    Ok(false) => {}
                    Err(err) => warn!(%err, "change poll failed"),
                }
            }
        })
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

fn read_data_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
    Ok(version)
}

fn winners_to_json(winners: &[Winner]) -> Result<String> {
    Ok(serde_json::to_string(winners)?)
}

fn winners_from_json(event_id: &str, raw: &str) -> Vec<Winner> {
    match serde_json::from_str(raw) {
        Ok(value) => winners_from_value(value),
        Err(err) => {
            warn!(event_id, %err, "unreadable winners column, treating as empty");
            Vec::new()
        }
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let winners_json: String = row.get(5)?;
    let winners = winners_from_json(&id, &winners_json);

    Ok(Event {
        name: row.get(1)?,
        date: row.get(2)?,
        category: row.get(3)?,
        grade_level: row.get(4)?,
        winners,
        id,
    })
}

impl EventStore for SqliteStore {
    fn list_events(&self) -> Result<Vec<Event>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, date, category, grade_level, winners
             FROM events
             ORDER BY date ASC, created_at ASC, id ASC",
        )?;

        let events = stmt
            .query_map([], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(events)
    }

    fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock()?;
        let event = conn
            .query_row(
                "SELECT id, name, date, category, grade_level, winners
                 FROM events WHERE id = ?1",
                [id],
                event_from_row,
            )
            .optional()?;

        Ok(event)
    }

    fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let draft = draft.prepare()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let winners_json = winners_to_json(&draft.winners)?;

        {
            let conn = self.conn.lock()?;
            conn.execute(
                "INSERT INTO events (
                    id, name, date, category, grade_level, winners, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    draft.name,
                    draft.date,
                    draft.category,
                    draft.grade_level,
                    winners_json,
                    now,
                ],
            )?;
        }

        self.bump();
        info!(event_id = %id, name = %draft.name, "event created");
        Ok(Event::from_draft(id, draft))
    }

    fn update_event(&self, id: &str, draft: EventDraft) -> Result<Event> {
        let draft = draft.prepare()?;

        let now = Utc::now().to_rfc3339();
        let winners_json = winners_to_json(&draft.winners)?;

        let changed = {
            let conn = self.conn.lock()?;
            conn.execute(
                "UPDATE events
                 SET name = ?2, date = ?3, category = ?4, grade_level = ?5,
                     winners = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    id,
                    draft.name,
                    draft.date,
                    draft.category,
                    draft.grade_level,
                    winners_json,
                    now,
                ],
            )?
        };

        if changed == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.bump();
        info!(event_id = %id, "event updated");
        Ok(Event::from_draft(id, draft))
    }

    fn delete_event(&self, id: &str) -> Result<()> {
        let changed = {
            let conn = self.conn.lock()?;
            conn.execute("DELETE FROM events WHERE id = ?1", [id])?
        };

        if changed == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.bump();
        info!(event_id = %id, "event deleted");
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
