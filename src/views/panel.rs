// Standings panel view-model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::house::House;
use crate::standings::Standings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankIcon {
    Crown,
    Trophy,
    Medal,
    Award,
}

impl RankIcon {
    pub fn for_rank(rank: u32) -> Self {
        match rank {
            1 => RankIcon::Crown,
            2 => RankIcon::Trophy,
            3 => RankIcon::Medal,
            _ => RankIcon::Award,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            RankIcon::Crown => "♛",
            RankIcon::Trophy => "🏆",
            RankIcon::Medal => "🏅",
            RankIcon::Award => "🎖",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub house: House,
    pub style_token: &'static str,
    pub accent: &'static str,
    pub score: u64,
    pub rank: u32,
    pub icon: RankIcon,
    /// Only the first row in sort order, even when others share rank 1
    pub leading: bool,
    /// Share of the top score, 0-100
    pub progress_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingsPanel {
    pub rows: Vec<PanelRow>,
    pub last_updated: DateTime<Utc>,
}

impl StandingsPanel {
    pub fn build(standings: &Standings, last_updated: DateTime<Utc>) -> Self {
        let max_score = standings.max_score();

        let rows = standings
            .iter()
            .enumerate()
            .map(|(index, entry)| PanelRow {
                house: entry.house,
                style_token: entry.house.style_token(),
                accent: entry.house.accent_hex(),
                score: entry.score,
                rank: entry.rank,
                icon: RankIcon::for_rank(entry.rank),
                leading: index == 0,
                progress_percent: ((entry.score * 100) / max_score).min(100) as u8,
            })
            .collect();

        StandingsPanel { rows, last_updated }
    }

    pub fn leader(&self) -> Option<&PanelRow> {
        self.rows.iter().find(|row| row.leading)
    }
}
