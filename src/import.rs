// 📥 CSV import - event results from a spreadsheet export
//
// One row per winner:
//   event,date,category,grade_level,position,house,name,points,photo
//
// Rows sharing (event, date, category, grade_level) form one event, in the
// order events first appear. The whole batch is validated before any write.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::event::{EventDraft, Winner};
use crate::store::EventStore;

#[derive(Debug, Deserialize)]
struct ResultRow {
    event: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    grade_level: String,
    position: u8,
    house: String,
    name: String,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    photo: Option<String>,
}

impl ResultRow {
    fn key(&self) -> (String, String, String, String) {
        (
            self.event.trim().to_string(),
            self.date.trim().to_string(),
            self.category.trim().to_string(),
            self.grade_level.trim().to_string(),
        )
    }

    fn into_winner(self) -> Winner {
        Winner {
            position: self.position,
            house: self.house.trim().to_string(),
            name: self.name.trim().to_string(),
            points: self.points.unwrap_or(0),
            photo: self
                .photo
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

pub fn load_results_csv(csv_path: &Path) -> Result<Vec<EventDraft>> {
    let file = std::fs::File::open(csv_path)?;
    read_results_csv(file)
}

pub fn read_results_csv<R: Read>(reader: R) -> Result<Vec<EventDraft>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut keys: Vec<(String, String, String, String)> = Vec::new();
    let mut drafts: Vec<EventDraft> = Vec::new();

    for (line, result) in rdr.deserialize::<ResultRow>().enumerate() {
        let row = result.map_err(|e| {
            // +2: header line and 1-based numbering
            warn!(line = line + 2, %e, "unreadable result row");
            Error::from(e)
        })?;

        let key = row.key();
        let slot = match keys.iter().position(|k| *k == key) {
            Some(slot) => slot,
            None => {
                drafts.push(EventDraft::new(&key.0, &key.1, &key.2, &key.3));
                keys.push(key);
                drafts.len() - 1
            }
        };

        drafts[slot].winners.push(row.into_winner());
    }

    Ok(drafts)
}

/// Validate every draft first, then write them all. Nothing is written if
/// any draft is invalid.
pub fn import_drafts(store: &dyn EventStore, drafts: Vec<EventDraft>) -> Result<usize> {
    for draft in &drafts {
        draft.clone().prepare().map_err(|e| match e {
            Error::InvalidEvent(reason) => {
                Error::InvalidEvent(format!("'{}': {}", draft.name, reason))
            }
            other => other,
        })?;
    }

    let mut imported = 0;
    for draft in drafts {
        store.create_event(draft)?;
        imported += 1;
    }

    info!(imported, "results imported");
    Ok(imported)
}
