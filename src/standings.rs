// 📊 Standings - house totals and ranks
//
// Pure aggregation over a snapshot of events. Malformed input has already
// been normalized by the lenient event decoding, so nothing here can fail.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::house::House;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseStanding {
    pub house: House,
    pub score: u64,
    pub rank: u32,
}

/// How ranks are assigned across ties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingRule {
    /// Ties share a rank and the next score takes the next integer (1, 1, 2, 3)
    #[default]
    Dense,

    /// Ties share a rank and the next score skips past them (1, 1, 3, 4)
    Competition,
}

/// Sorted standings for all four houses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standings {
    pub entries: Vec<HouseStanding>,
}

/// Compute dense-ranked standings from a snapshot of events.
pub fn compute_standings(events: &[Event]) -> Standings {
    compute_standings_with(events, RankingRule::Dense)
}

pub fn compute_standings_with(events: &[Event], rule: RankingRule) -> Standings {
    let totals = house_totals(events);

    // Stable sort: exact ties keep the canonical house order.
    let mut sorted: Vec<(House, u64)> = House::ALL.iter().copied().zip(totals).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let scores: Vec<u64> = sorted.iter().map(|(_, score)| *score).collect();
    let ranks = assign_ranks(&scores, rule);

    let entries = sorted
        .into_iter()
        .zip(ranks)
        .map(|((house, score), rank)| HouseStanding { house, score, rank })
        .collect();

    Standings { entries }
}

/// Per-house totals in `House::ALL` order. Winners naming an unknown house
/// are skipped.
pub fn house_totals(events: &[Event]) -> [u64; 4] {
    let mut totals = [0u64; 4];

    for event in events {
        for winner in &event.winners {
            if let Some(house) = winner.house() {
                let slot = House::ALL
                    .iter()
                    .position(|h| *h == house)
                    .unwrap_or_default();
                totals[slot] += u64::from(winner.points);
            }
        }
    }

    totals
}

/// Rank an already descending sequence of scores.
pub fn assign_ranks(sorted_scores: &[u64], rule: RankingRule) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted_scores.len());
    let mut last_score: Option<u64> = None;
    let mut rank = 0u32;

    for (index, score) in sorted_scores.iter().enumerate() {
        if last_score != Some(*score) {
            rank = match rule {
                RankingRule::Dense => rank + 1,
                RankingRule::Competition => index as u32 + 1,
            };
        }
        ranks.push(rank);
        last_score = Some(*score);
    }

    ranks
}

impl Standings {
    pub fn leader(&self) -> Option<&HouseStanding> {
        self.entries.first()
    }

    /// Highest score, never below 1 so it can divide progress bars.
    pub fn max_score(&self) -> u64 {
        self.entries.iter().map(|e| e.score).max().unwrap_or(0).max(1)
    }

    pub fn score_of(&self, house: House) -> u64 {
        self.entries
            .iter()
            .find(|e| e.house == house)
            .map(|e| e.score)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HouseStanding> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
