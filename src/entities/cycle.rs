// 🗓️ Election cycles - selection windows and per-cycle aggregates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CYCLE SELECTION
// ============================================================================

/// First two-year cycle with committee-to-candidate filings on record
pub const EARLIEST_CYCLE: i32 = 1976;

/// Which cycles a query or score covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleSelection {
    /// One cycle (even year)
    Single(i32),

    /// The latest N cycles ending at the current cycle
    Recent(u32),

    /// Every cycle on record
    All,
}

impl CycleSelection {
    /// Explicit year list, or None for "all"
    pub fn years(&self, current_cycle: i32) -> Option<Vec<i32>> {
        match *self {
            CycleSelection::Single(year) => Some(vec![year]),
            CycleSelection::Recent(n) => {
                let span = Self::recent_span(n, current_cycle);
                Some((0..span).map(|i| current_cycle - 2 * i).collect())
            }
            CycleSelection::All => None,
        }
    }

    /// Inclusive (low, high) cycle bounds, or None for "all"
    pub fn bounds(&self, current_cycle: i32) -> Option<(i32, i32)> {
        match *self {
            CycleSelection::Single(year) => Some((year, year)),
            CycleSelection::Recent(n) => {
                let span = Self::recent_span(n, current_cycle);
                Some((current_cycle - 2 * (span - 1), current_cycle))
            }
            CycleSelection::All => None,
        }
    }

    pub fn contains(&self, cycle: i32, current_cycle: i32) -> bool {
        match self.bounds(current_cycle) {
            Some((low, high)) => cycle >= low && cycle <= high,
            None => true,
        }
    }

    /// Number of cycles a `Recent(n)` window really covers: never reaches
    /// past `EARLIEST_CYCLE`, always at least the current cycle.
    fn recent_span(n: u32, current_cycle: i32) -> i32 {
        let on_record = (current_cycle.saturating_sub(EARLIEST_CYCLE) / 2)
            .saturating_add(1)
            .max(1);
        i32::try_from(n).map_or(on_record, |n| n.min(on_record)).max(1)
    }

    /// The cycle treated as "current" for recency rules
    pub fn latest(&self, current_cycle: i32) -> i32 {
        match *self {
            CycleSelection::Single(year) => year,
            CycleSelection::Recent(_) | CycleSelection::All => current_cycle,
        }
    }
}

impl fmt::Display for CycleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleSelection::Single(year) => write!(f, "{}", year),
            CycleSelection::Recent(n) => write!(f, "last{}", n),
            CycleSelection::All => f.write_str("all"),
        }
    }
}

impl FromStr for CycleSelection {
    type Err = String;

    /// Accepts "2024", "last3" or "all"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if value == "all" {
            return Ok(CycleSelection::All);
        }
        if let Some(n) = value.strip_prefix("last") {
            return n
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .map(CycleSelection::Recent)
                .ok_or_else(|| format!("Invalid recent-cycle selection: {}", s));
        }
        value
            .parse::<i32>()
            .map(CycleSelection::Single)
            .map_err(|_| format!("Invalid cycle selection: {}", s))
    }
}

// ============================================================================
// CYCLE SUMMARY
// ============================================================================

/// Per (identity, cycle) totals; `net` is always support − oppose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle: i32,
    pub total_support: f64,
    pub total_oppose: f64,
    pub net: f64,
    pub support_count: usize,
    pub oppose_count: usize,

    /// Independent-expenditure-only sub-aggregate (24E/24A)
    pub ie_support: f64,
    pub ie_oppose: f64,
}

impl CycleSummary {
    pub fn empty(cycle: i32) -> Self {
        CycleSummary {
            cycle,
            ..Default::default()
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.support_count + self.oppose_count
    }

    /// Contributions only (everything that is not an independent expenditure)
    pub fn contribution_support(&self) -> f64 {
        self.total_support - self.ie_support
    }

    pub fn contribution_oppose(&self) -> f64 {
        self.total_oppose - self.ie_oppose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!("2024".parse::<CycleSelection>(), Ok(CycleSelection::Single(2024)));
        assert_eq!("last3".parse::<CycleSelection>(), Ok(CycleSelection::Recent(3)));
        assert_eq!("ALL".parse::<CycleSelection>(), Ok(CycleSelection::All));
        assert!("last0".parse::<CycleSelection>().is_err());
        assert!("soon".parse::<CycleSelection>().is_err());
    }

    #[test]
    fn test_recent_years() {
        let years = CycleSelection::Recent(3).years(2024).unwrap();
        assert_eq!(years, vec![2024, 2022, 2020]);
        assert!(CycleSelection::All.years(2024).is_none());
        assert!(CycleSelection::All.contains(1998, 2024));
        assert!(!CycleSelection::Single(2022).contains(2024, 2024));
    }

    #[test]
    fn test_recent_window_bounds() {
        let last3 = CycleSelection::Recent(3);
        assert_eq!(last3.bounds(2024), Some((2020, 2024)));
        assert!(last3.contains(2020, 2024));
        assert!(!last3.contains(2018, 2024));
        assert!(!last3.contains(2026, 2024));
        assert_eq!(CycleSelection::Single(2022).bounds(2024), Some((2022, 2022)));
        assert_eq!(CycleSelection::All.bounds(2024), None);
    }

    #[test]
    fn test_huge_recent_window_is_clamped() {
        let huge: CycleSelection = "last4294967295".parse().unwrap();
        assert_eq!(huge, CycleSelection::Recent(u32::MAX));

        let years = huge.years(2024).unwrap();
        assert_eq!(years.first(), Some(&2024));
        assert_eq!(years.last(), Some(&EARLIEST_CYCLE));
        assert_eq!(years.len() as i32, (2024 - EARLIEST_CYCLE) / 2 + 1);
        assert!(huge.contains(2024, 2024));
        assert!(huge.contains(EARLIEST_CYCLE, 2024));

        // Above i32::MAX is no different from any other oversized window
        assert_eq!(CycleSelection::Recent(40_000).years(2024), Some(years));
        assert_eq!(huge.bounds(2024), Some((EARLIEST_CYCLE, 2024)));
    }

    #[test]
    fn test_latest_and_display() {
        assert_eq!(CycleSelection::Single(2020).latest(2024), 2020);
        assert_eq!(CycleSelection::Recent(2).latest(2024), 2024);
        assert_eq!(CycleSelection::Recent(3).to_string(), "last3");
    }
}
