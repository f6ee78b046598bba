// 🏆 Events & Winners - the documents held by the event store
//
// Reading is lenient: a document written by hand, by an older client or by
// another tool must never break the dashboard. Writing is strict: admin drafts
// are validated before they reach a store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::house::House;

/// Asset shown when a winner has no photo or the photo fails to load
pub const PLACEHOLDER_PHOTO: &str = "/placeholder.svg";

/// Podium size
pub const MAX_WINNERS: usize = 3;

// ============================================================================
// WINNER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// 1, 2 or 3
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: u8,

    /// Raw house name; see `Winner::house()`
    #[serde(default, deserialize_with = "lenient_string")]
    pub house: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_points")]
    pub points: u32,

    #[serde(
        default,
        deserialize_with = "lenient_photo",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo: Option<String>,
}

impl Winner {
    pub fn new(position: u8, house: House, name: &str, points: u32) -> Self {
        Winner {
            position,
            house: house.name().to_string(),
            name: name.to_string(),
            points,
            photo: None,
        }
    }

    pub fn with_photo(mut self, photo: &str) -> Self {
        self.photo = Some(photo.to_string());
        self
    }

    /// The house this winner scores for, if it is one of the four.
    pub fn house(&self) -> Option<House> {
        House::parse(&self.house)
    }

    /// Photo URI, treating blank strings as absent
    pub fn photo_uri(&self) -> Option<&str> {
        self.photo.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

// ============================================================================
// EVENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Store-assigned identity
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,

    #[serde(default, alias = "grade_level", deserialize_with = "lenient_string")]
    pub grade_level: String,

    #[serde(default, deserialize_with = "lenient_winners")]
    pub winners: Vec<Winner>,
}

impl Event {
    pub fn from_draft(id: impl Into<String>, draft: EventDraft) -> Self {
        Event {
            id: id.into(),
            name: draft.name,
            date: draft.date,
            category: draft.category,
            grade_level: draft.grade_level,
            winners: draft.winners,
        }
    }

    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            name: self.name.clone(),
            date: self.date.clone(),
            category: self.category.clone(),
            grade_level: self.grade_level.clone(),
            winners: self.winners.clone(),
        }
    }

    pub fn winner_at(&self, position: u8) -> Option<&Winner> {
        self.winners.iter().find(|w| w.position == position)
    }

    /// Winners ordered by position, for podium rendering
    pub fn podium(&self) -> Vec<&Winner> {
        let mut winners: Vec<&Winner> = self.winners.iter().collect();
        winners.sort_by_key(|w| w.position);
        winners
    }
}

// ============================================================================
// EVENT DRAFT (admin writes)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub name: String,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub category: String,

    #[serde(default, alias = "grade_level")]
    pub grade_level: String,

    #[serde(default)]
    pub winners: Vec<Winner>,
}

impl EventDraft {
    pub fn new(name: &str, date: &str, category: &str, grade_level: &str) -> Self {
        EventDraft {
            name: name.to_string(),
            date: date.to_string(),
            category: category.to_string(),
            grade_level: grade_level.to_string(),
            winners: Vec::new(),
        }
    }

    pub fn with_winner(mut self, winner: Winner) -> Self {
        self.winners.push(winner);
        self
    }

    /// Trim free-text fields before a write. Stored house names must match
    /// exactly on read, so padding is stripped here and nowhere else.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.name,
            &mut self.date,
            &mut self.category,
            &mut self.grade_level,
        ] {
            *field = field.trim().to_string();
        }
        for winner in &mut self.winners {
            winner.house = winner.house.trim().to_string();
            winner.name = winner.name.trim().to_string();
            winner.photo = winner
                .photo
                .take()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
        }
    }

    /// Normalize, then validate. Stores call this on every write.
    pub fn prepare(mut self) -> Result<Self> {
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Check a draft before it is written. Reading never calls this.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidEvent("event name is required".to_string()));
        }

        if self.winners.len() > MAX_WINNERS {
            return Err(Error::InvalidEvent(format!(
                "at most {} winners per event, got {}",
                MAX_WINNERS,
                self.winners.len()
            )));
        }

        let mut seen = HashSet::new();
        for winner in &self.winners {
            if !(1..=MAX_WINNERS as u8).contains(&winner.position) {
                return Err(Error::InvalidEvent(format!(
                    "position must be 1-3, got {}",
                    winner.position
                )));
            }
            if !seen.insert(winner.position) {
                return Err(Error::InvalidEvent(format!(
                    "position {} is assigned twice",
                    winner.position
                )));
            }
            if winner.house().is_none() {
                return Err(Error::InvalidEvent(format!(
                    "unknown house '{}'",
                    winner.house
                )));
            }
            if winner.name.trim().is_empty() {
                return Err(Error::InvalidEvent(format!(
                    "winner at position {} needs a name",
                    winner.position
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// LENIENT DESERIALIZATION
// ============================================================================

/// Coerce a JSON value into points. Anything that is not a non-negative
/// number (or a string holding one) counts as zero.
pub fn points_from_value(value: &Value) -> u32 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u.min(u32::MAX as u64) as u32
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f > 0.0 => f.trunc().min(u32::MAX as f64) as u32,
                    _ => 0,
                }
            }
        }
        Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

fn lenient_points<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(points_from_value).unwrap_or(0))
}

fn lenient_position<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let position = value.as_ref().map(points_from_value).unwrap_or(0);
    Ok(u8::try_from(position).unwrap_or(0))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

/// A photo is kept only when it is a non-blank string. Anything else falls
/// back to the placeholder instead of dropping the winner.
fn lenient_photo<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_winners<'de, D>(deserializer: D) -> std::result::Result<Vec<Winner>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(winners_from_value).unwrap_or_default())
}

/// Decode a winners collection, dropping anything that is not a winner
/// object. A non-array value yields no winners.
pub fn winners_from_value(value: Value) -> Vec<Winner> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Event {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_winners_is_empty() {
        let event = parse(json!({"id": "e1", "name": "Quiz"}));
        assert!(event.winners.is_empty());

        let event = parse(json!({"id": "e1", "name": "Quiz", "winners": null}));
        assert!(event.winners.is_empty());

        let event = parse(json!({"id": "e1", "name": "Quiz", "winners": "oops"}));
        assert!(event.winners.is_empty());
    }

    #[test]
    fn test_points_are_coerced() {
        let event = parse(json!({
            "name": "Relay",
            "winners": [
                {"position": 1, "house": "Gandhi", "name": "A", "points": 10},
                {"position": 2, "house": "Tagore", "name": "B"},
                {"position": 3, "house": "Delany", "name": "C", "points": "five"},
                {"position": 3, "house": "Delany", "name": "D", "points": -4},
                {"position": 3, "house": "Delany", "name": "E", "points": "7"},
                {"position": 3, "house": "Delany", "name": "F", "points": null}
            ]
        }));

        let points: Vec<u32> = event.winners.iter().map(|w| w.points).collect();
        assert_eq!(points, vec![10, 0, 0, 0, 7, 0]);
    }

    #[test]
    fn test_camel_case_round_trip_keeps_grade_level() {
        let event = parse(json!({"name": "Dance", "gradeLevel": "Senior"}));
        assert_eq!(event.grade_level, "Senior");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["gradeLevel"], "Senior");

        let snake = parse(json!({"name": "Dance", "grade_level": "Junior"}));
        assert_eq!(snake.grade_level, "Junior");
    }

    #[test]
    fn test_non_object_winners_are_dropped() {
        let event = parse(json!({
            "name": "Chess",
            "winners": [42, {"position": 1, "house": "Aloysius", "name": "Z", "points": 5}]
        }));
        assert_eq!(event.winners.len(), 1);
        assert_eq!(event.winners[0].house(), Some(House::Aloysius));
    }

    #[test]
    fn test_blank_photo_is_absent() {
        let winner = Winner::new(1, House::Delany, "Asha", 10).with_photo("  ");
        assert_eq!(winner.photo_uri(), None);
    }

    #[test]
    fn test_non_string_photo_keeps_winner() {
        let event = parse(json!({
            "name": "Painting",
            "winners": [
                {"position": 1, "house": "Gandhi", "name": "A", "points": 10, "photo": 42},
                {"position": 2, "house": "Tagore", "name": "B", "points": 5, "photo": {"url": "x"}},
                {"position": 3, "house": "Delany", "name": "C", "points": 2, "photo": "  "}
            ]
        }));

        assert_eq!(event.winners.len(), 3);
        assert_eq!(event.winners[0].points, 10);
        assert!(event.winners.iter().all(|w| w.photo.is_none()));
    }

    #[test]
    fn test_padded_house_is_unknown_on_read() {
        let event = parse(json!({
            "name": "Quiz",
            "winners": [{"position": 1, "house": " Tagore ", "name": "A", "points": 10}]
        }));
        assert_eq!(event.winners.len(), 1);
        assert_eq!(event.winners[0].house(), None);
    }

    #[test]
    fn test_prepare_trims_before_validating() {
        let mut winner = Winner::new(1, House::Tagore, " Arjun ", 10).with_photo(" ");
        winner.house = " Tagore ".to_string();
        let draft = EventDraft::new(" Quiz ", "2025-08-14", "Literary", "Senior").with_winner(winner);

        let draft = draft.prepare().unwrap();
        assert_eq!(draft.name, "Quiz");
        assert_eq!(draft.winners[0].house, "Tagore");
        assert_eq!(draft.winners[0].name, "Arjun");
        assert_eq!(draft.winners[0].photo, None);
    }

    #[test]
    fn test_podium_sorted_by_position() {
        let event = Event::from_draft(
            "e1",
            EventDraft::new("Debate", "2025-08-14", "Literary", "Senior")
                .with_winner(Winner::new(3, House::Tagore, "C", 2))
                .with_winner(Winner::new(1, House::Gandhi, "A", 10))
                .with_winner(Winner::new(2, House::Delany, "B", 5)),
        );
        let positions: Vec<u8> = event.podium().iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(event.winner_at(2).map(|w| w.name.as_str()), Some("B"));
    }

    #[test]
    fn test_validate_accepts_full_podium() {
        let draft = EventDraft::new("Debate", "2025-08-14", "Literary", "Senior")
            .with_winner(Winner::new(1, House::Gandhi, "A", 10))
            .with_winner(Winner::new(2, House::Gandhi, "B", 5))
            .with_winner(Winner::new(3, House::Tagore, "C", 2));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_drafts() {
        let empty_name = EventDraft::new(" ", "", "", "");
        assert!(matches!(empty_name.validate(), Err(Error::InvalidEvent(_))));

        let duplicate = EventDraft::new("Quiz", "", "", "")
            .with_winner(Winner::new(1, House::Gandhi, "A", 10))
            .with_winner(Winner::new(1, House::Tagore, "B", 10));
        assert!(matches!(duplicate.validate(), Err(Error::InvalidEvent(_))));

        let bad_position = EventDraft::new("Quiz", "", "", "")
            .with_winner(Winner::new(4, House::Gandhi, "A", 10));
        assert!(matches!(bad_position.validate(), Err(Error::InvalidEvent(_))));

        let mut unknown = Winner::new(1, House::Gandhi, "A", 10);
        unknown.house = "Nehru".to_string();
        let unknown_house = EventDraft::new("Quiz", "", "", "").with_winner(unknown);
        assert!(matches!(unknown_house.validate(), Err(Error::InvalidEvent(_))));
    }
}
