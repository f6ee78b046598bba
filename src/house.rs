// 🏠 Houses - the four fixed competing teams
//
// Houses are never stored on their own. Winners reference them by name and
// every standings view derives the full set from `House::ALL`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// HOUSE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum House {
    Delany,
    Gandhi,
    Tagore,
    Aloysius,
}

impl House {
    /// Canonical order. Exact score ties keep this order.
    pub const ALL: [House; 4] = [House::Delany, House::Gandhi, House::Tagore, House::Aloysius];

    pub fn name(&self) -> &'static str {
        match self {
            House::Delany => "Delany",
            House::Gandhi => "Gandhi",
            House::Tagore => "Tagore",
            House::Aloysius => "Aloysius",
        }
    }

    /// Style token used by every front end to pick the house colour.
    pub fn style_token(&self) -> &'static str {
        match self {
            House::Delany => "green",
            House::Gandhi => "yellow",
            House::Tagore => "blue",
            House::Aloysius => "red",
        }
    }

    /// Accent colour as a hex string
    pub fn accent_hex(&self) -> &'static str {
        match self {
            House::Delany => "#00bf63",
            House::Gandhi => "#f7d136",
            House::Tagore => "#38b6ff",
            House::Aloysius => "#ed6258",
        }
    }

    /// Accent colour as RGB, for terminal rendering
    pub fn accent_rgb(&self) -> (u8, u8, u8) {
        match self {
            House::Delany => (0x00, 0xbf, 0x63),
            House::Gandhi => (0xf7, 0xd1, 0x36),
            House::Tagore => (0x38, 0xb6, 0xff),
            House::Aloysius => (0xed, 0x62, 0x58),
        }
    }

    /// Exact, case-sensitive lookup that never fails; anything else,
    /// padded names included, yields `None`.
    pub fn parse(raw: &str) -> Option<House> {
        House::ALL.into_iter().find(|house| house.name() == raw)
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown house '{0}'")]
pub struct UnknownHouse(pub String);

impl FromStr for House {
    type Err = UnknownHouse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        House::parse(s).ok_or_else(|| UnknownHouse(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_houses() {
        for house in House::ALL {
            assert_eq!(House::parse(house.name()), Some(house));
        }
    }

    #[test]
    fn test_padded_names_are_unknown() {
        assert_eq!(House::parse(" Tagore "), None);
        assert_eq!(House::parse("Gandhi\n"), None);
    }

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(House::parse("tagore"), None);
        assert_eq!(House::parse("Nehru"), None);
        assert_eq!(House::parse(""), None);
        assert_eq!(
            "Nehru".parse::<House>().unwrap_err().to_string(),
            "unknown house 'Nehru'"
        );
    }

    #[test]
    fn test_style_tokens_are_distinct() {
        let mut tokens: Vec<_> = House::ALL.iter().map(|h| h.style_token()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 4);
    }
}
