// 🏷️ Affiliation Registry - which committees count as affiliated
//
// Two ways in: the committee ID is on the allowlist, or its name contains a
// registry keyword (case-insensitive substring). The ID check wins when both hit.

use super::transaction::MatchReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffiliationRegistry {
    /// Allowlisted committee IDs (stored uppercase)
    committee_ids: BTreeSet<String>,

    /// Name keywords (stored lowercase)
    keywords: BTreeSet<String>,
}

impl AffiliationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts<I, K>(committee_ids: I, keywords: K) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let mut registry = AffiliationRegistry::new();
        for id in committee_ids {
            registry.add_committee(id.as_ref());
        }
        for keyword in keywords {
            registry.add_keyword(keyword.as_ref());
        }
        registry
    }

    pub fn add_committee(&mut self, committee_id: &str) {
        let id = committee_id.trim().to_uppercase();
        if !id.is_empty() {
            self.committee_ids.insert(id);
        }
    }

    /// Blank keywords are ignored: an empty substring would match every committee
    pub fn add_keyword(&mut self, keyword: &str) {
        let kw = keyword.trim().to_lowercase();
        if !kw.is_empty() {
            self.keywords.insert(kw);
        }
    }

    pub fn is_allowlisted(&self, committee_id: &str) -> bool {
        self.committee_ids.contains(&committee_id.trim().to_uppercase())
    }

    /// First keyword (in sorted order) contained in the committee name
    pub fn keyword_for(&self, committee_name: &str) -> Option<&str> {
        let lower = committee_name.to_lowercase();
        self.keywords
            .iter()
            .find(|kw| lower.contains(kw.as_str()))
            .map(|kw| kw.as_str())
    }

    /// Affiliation test for one committee
    pub fn match_committee(&self, committee_id: &str, committee_name: &str) -> Option<MatchReason> {
        if self.is_allowlisted(committee_id) {
            return Some(MatchReason::Allowlist);
        }
        self.keyword_for(committee_name)
            .map(|kw| MatchReason::Keyword(kw.to_string()))
    }

    pub fn committee_ids(&self) -> impl Iterator<Item = &str> {
        self.committee_ids.iter().map(|s| s.as_str())
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.committee_ids.is_empty() && self.keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AffiliationRegistry {
        AffiliationRegistry::from_parts(
            ["c00000001", " C00000002 "],
            ["Advocacy PAC", "", "Friends of Policy"],
        )
    }

    #[test]
    fn test_allowlist_match_is_case_insensitive() {
        let reg = registry();
        assert_eq!(reg.match_committee("C00000001", "Anything"), Some(MatchReason::Allowlist));
        assert_eq!(reg.match_committee("c00000002", ""), Some(MatchReason::Allowlist));
    }

    #[test]
    fn test_keyword_substring_match() {
        let reg = registry();
        assert_eq!(
            reg.match_committee("C99", "NATIONAL ADVOCACY PAC INC"),
            Some(MatchReason::Keyword("advocacy pac".to_string()))
        );
        assert_eq!(reg.match_committee("C99", "Unrelated Committee"), None);
    }

    #[test]
    fn test_blank_keyword_ignored() {
        let reg = registry();
        assert_eq!(reg.keywords().count(), 2);
        assert!(!reg.is_empty());
        assert!(AffiliationRegistry::new().match_committee("C1", "x").is_none());
    }
}
