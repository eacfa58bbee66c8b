// 🏛️ Roster & Filer Entities
//
// A roster entry is who holds (or held) a seat; a filer identity is who filed
// in a given cycle. The resolver's job is to connect the two.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// SEAT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeatType {
    House,
    Senate,
}

impl SeatType {
    /// Office code used by filing records ("H" / "S")
    pub fn code(&self) -> &'static str {
        match self {
            SeatType::House => "H",
            SeatType::Senate => "S",
        }
    }

    /// Accepts filing codes and roster labels ("rep", "sen", "House", ...)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "h" | "house" | "rep" => Some(SeatType::House),
            "s" | "senate" | "sen" => Some(SeatType::Senate),
            _ => None,
        }
    }
}

// ============================================================================
// ROSTER ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub full_name: String,
    pub state: String,
    pub seat: SeatType,
    /// 0 = at-large or statewide
    pub district: u32,
    pub term_end: Option<NaiveDate>,
}

impl RosterEntry {
    pub fn new(full_name: &str, state: &str, seat: SeatType, district: u32) -> Self {
        RosterEntry {
            full_name: full_name.to_string(),
            state: state.to_uppercase(),
            seat,
            district,
            term_end: None,
        }
    }

    pub fn with_term_end(mut self, term_end: NaiveDate) -> Self {
        self.term_end = Some(term_end);
        self
    }

    pub fn key(&self) -> RosterKey {
        RosterKey(format!(
            "{}-{}-{:02}:{}",
            self.state,
            self.seat.code(),
            self.district,
            self.full_name.trim().to_lowercase()
        ))
    }

    /// "CA District 12" / "WY At-Large"
    pub fn seat_label(&self) -> String {
        match (self.seat, self.district) {
            (SeatType::Senate, _) => format!("{} Senate", self.state),
            (SeatType::House, 0) => format!("{} At-Large", self.state),
            (SeatType::House, d) => format!("{} District {}", self.state, d),
        }
    }
}

/// Stable lookup key for a roster entry within one batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RosterKey(pub String);

impl fmt::Display for RosterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep one entry per seat: the latest term ending after `as_of`
///
/// House seats are keyed by (state, district); Senate seats also by name,
/// since each state holds two.
pub fn current_roster(entries: &[RosterEntry], as_of: NaiveDate) -> Vec<RosterEntry> {
    let mut by_seat: HashMap<(String, SeatType, u32, String), RosterEntry> = HashMap::new();

    for entry in entries {
        let still_serving = entry.term_end.map_or(true, |end| end > as_of);
        if !still_serving {
            continue;
        }

        let name_part = match entry.seat {
            SeatType::Senate => entry.full_name.to_lowercase(),
            SeatType::House => String::new(),
        };
        let seat_key = (entry.state.clone(), entry.seat, entry.district, name_part);

        match by_seat.get(&seat_key) {
            Some(existing) if existing.term_end >= entry.term_end => {}
            _ => {
                by_seat.insert(seat_key, entry.clone());
            }
        }
    }

    let mut current: Vec<RosterEntry> = by_seat.into_values().collect();
    current.sort_by(|a, b| {
        a.state
            .cmp(&b.state)
            .then(a.seat.cmp(&b.seat))
            .then(a.district.cmp(&b.district))
            .then(a.full_name.cmp(&b.full_name))
    });
    current
}

// ============================================================================
// FILER IDENTITY
// ============================================================================

/// Canonical campaign-finance identity for a person in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilerIdentity {
    pub person_id: String,
    pub candidate_id: String,
    pub display_name: String,
    pub party: String,
    pub state: String,
    pub seat: SeatType,
    pub district: u32,
    pub cycle: i32,
}

/// One row of a person's filing history (also the resolver's candidate pool)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilerRecord {
    pub person_id: String,
    pub candidate_id: String,
    pub cycle: i32,
    pub display_name: String,
    pub state: String,
    pub seat: SeatType,
    pub district: u32,
    pub party: String,
    /// Won the general election in this cycle
    pub won: bool,
}

impl FilerRecord {
    pub fn to_identity(&self) -> FilerIdentity {
        FilerIdentity {
            person_id: self.person_id.clone(),
            candidate_id: self.candidate_id.clone(),
            display_name: self.display_name.clone(),
            party: self.party.clone(),
            state: self.state.clone(),
            seat: self.seat,
            district: self.district,
            cycle: self.cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_seat_parse() {
        assert_eq!(SeatType::parse("rep"), Some(SeatType::House));
        assert_eq!(SeatType::parse("S"), Some(SeatType::Senate));
        assert_eq!(SeatType::parse("governor"), None);
    }

    #[test]
    fn test_roster_key_distinguishes_districts() {
        let a = RosterEntry::new("Jane Smith", "tx", SeatType::House, 3);
        let b = RosterEntry::new("Jane Smith", "TX", SeatType::House, 4);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.state, "TX");
        assert_eq!(a.seat_label(), "TX District 3");
    }

    #[test]
    fn test_current_roster_keeps_latest_term() {
        let entries = vec![
            RosterEntry::new("Old Member", "OH", SeatType::House, 1)
                .with_term_end(date(2023, 1, 3)),
            RosterEntry::new("New Member", "OH", SeatType::House, 1)
                .with_term_end(date(2025, 1, 3)),
            RosterEntry::new("Senator One", "OH", SeatType::Senate, 0)
                .with_term_end(date(2027, 1, 3)),
            RosterEntry::new("Senator Two", "OH", SeatType::Senate, 0)
                .with_term_end(date(2029, 1, 3)),
        ];

        let current = current_roster(&entries, date(2024, 1, 1));

        assert_eq!(current.len(), 3);
        assert!(current.iter().any(|e| e.full_name == "New Member"));
        assert!(!current.iter().any(|e| e.full_name == "Old Member"));
    }
}
