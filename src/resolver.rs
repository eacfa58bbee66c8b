// 🔎 Identity Resolver - roster entries → filer identities
//
// One candidate query per batch, then per-entry ranking in memory:
//   pass 1: same state, seat and district
//   pass 2: same state and seat (district dropped)
// The best tier wins; ties fall through party, name, person ID, candidate ID.

use crate::entities::{FilerIdentity, FilerRecord, RosterEntry, RosterKey};
use crate::error::{EngineResult, ScoreError};
use crate::store::Datastore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// ============================================================================
// MATCH TIERS
// ============================================================================

/// Match quality, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    /// Case-insensitive full-name equality
    Exact = 1,

    /// Roster last-name token appears in the filer name
    LastName = 2,

    /// One full name contains the other
    Substring = 3,

    /// Filer name in "LAST, FIRST" form matches once reordered
    CommaReversed = 4,
}

/// Strategy for scoring a roster name against a filer display name
pub trait NameMatcher: Send + Sync {
    fn tier(&self, roster_name: &str, filer_name: &str) -> Option<MatchTier>;
}

/// Substring heuristics as used by the district map
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredSubstringMatcher;

impl TieredSubstringMatcher {
    fn normalize(name: &str) -> String {
        name.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// "SMITH, JANE A" → "jane a smith"
    fn reorder_comma_name(name: &str) -> Option<String> {
        let (last, first) = name.split_once(',')?;
        let reordered = format!("{} {}", first.trim(), last.trim());
        Some(Self::normalize(&reordered))
    }
}

impl NameMatcher for TieredSubstringMatcher {
    fn tier(&self, roster_name: &str, filer_name: &str) -> Option<MatchTier> {
        let roster = Self::normalize(roster_name);
        let filer = Self::normalize(filer_name);
        if roster.is_empty() || filer.is_empty() {
            return None;
        }

        if roster == filer {
            return Some(MatchTier::Exact);
        }

        if let Some(last) = roster.split(' ').last() {
            if filer.contains(last) {
                return Some(MatchTier::LastName);
            }
        }

        if filer.contains(&roster) || roster.contains(&filer) {
            return Some(MatchTier::Substring);
        }

        let decommaed = Self::normalize(&filer.replace(',', " "));
        if decommaed.contains(&roster) {
            return Some(MatchTier::CommaReversed);
        }

        if let Some(reordered) = Self::reorder_comma_name(&filer) {
            if !reordered.is_empty()
                && (reordered.contains(&roster) || roster.contains(&reordered))
            {
                return Some(MatchTier::CommaReversed);
            }
        }

        None
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    Resolved(FilerIdentity),
    Unresolved,
}

impl Resolution {
    pub fn identity(&self) -> Option<&FilerIdentity> {
        match self {
            Resolution::Resolved(identity) => Some(identity),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

pub struct IdentityResolver {
    matcher: Arc<dyn NameMatcher>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        IdentityResolver::new(Arc::new(TieredSubstringMatcher))
    }
}

impl IdentityResolver {
    pub fn new(matcher: Arc<dyn NameMatcher>) -> Self {
        IdentityResolver { matcher }
    }

    /// Resolve a whole roster batch with a single datastore query
    pub fn resolve(
        &self,
        store: &dyn Datastore,
        roster: &[RosterEntry],
        cycle: i32,
    ) -> EngineResult<HashMap<RosterKey, Resolution>> {
        if roster.is_empty() {
            return Ok(HashMap::new());
        }

        let states: Vec<String> = roster
            .iter()
            .map(|e| e.state.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let pool = store.candidate_filers(&states, cycle)?;
        let resolutions = self.resolve_against(&pool, roster, cycle);

        let resolved = resolutions.values().filter(|r| r.is_resolved()).count();
        tracing::info!(
            cycle,
            entries = roster.len(),
            resolved,
            unresolved = roster.len() - resolved,
            "roster batch resolved"
        );

        Ok(resolutions)
    }

    /// Resolve against an already-fetched candidate pool
    pub fn resolve_against(
        &self,
        pool: &[FilerRecord],
        roster: &[RosterEntry],
        cycle: i32,
    ) -> HashMap<RosterKey, Resolution> {
        roster
            .iter()
            .map(|entry| {
                let resolution = match self.resolve_entry(pool, entry, cycle) {
                    Ok(identity) => Resolution::Resolved(identity),
                    Err(err) => {
                        tracing::debug!(error = %err, "roster entry unresolved");
                        Resolution::Unresolved
                    }
                };
                (entry.key(), resolution)
            })
            .collect()
    }

    fn resolve_entry(
        &self,
        pool: &[FilerRecord],
        entry: &RosterEntry,
        cycle: i32,
    ) -> EngineResult<FilerIdentity> {
        let same_chamber = |f: &&FilerRecord| {
            f.cycle == cycle && f.seat == entry.seat && f.state.eq_ignore_ascii_case(&entry.state)
        };

        let district_pass = self.best_match(
            entry,
            pool.iter()
                .filter(same_chamber)
                .filter(|f| f.district == entry.district),
        );

        let chosen = match district_pass {
            Some(hit) => Some(hit),
            None => self.best_match(entry, pool.iter().filter(same_chamber)),
        };

        match chosen {
            Some((tier, filer)) => {
                tracing::debug!(
                    roster = %entry.key(),
                    person_id = %filer.person_id,
                    tier = ?tier,
                    "roster entry resolved"
                );
                Ok(filer.to_identity())
            }
            None => Err(ScoreError::ResolutionNotFound(entry.key().to_string())),
        }
    }

    /// Top tier, then party, name, person ID, candidate ID
    fn best_match<'a, I>(
        &self,
        entry: &RosterEntry,
        candidates: I,
    ) -> Option<(MatchTier, &'a FilerRecord)>
    where
        I: Iterator<Item = &'a FilerRecord>,
    {
        candidates
            .filter_map(|f| {
                self.matcher
                    .tier(&entry.full_name, &f.display_name)
                    .map(|tier| (tier, f))
            })
            .min_by(|(ta, a), (tb, b)| {
                ta.cmp(tb)
                    .then_with(|| a.party.cmp(&b.party))
                    .then_with(|| a.display_name.cmp(&b.display_name))
                    .then_with(|| a.person_id.cmp(&b.person_id))
                    .then_with(|| a.candidate_id.cmp(&b.candidate_id))
            })
    }
}
