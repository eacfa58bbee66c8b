// 📦 Bulk Aggregator - many identities, constant round trips
//
// One run:
//   1. cache read for every key (one call)
//   2. affiliation registry (one call)
//   3. election history for all person IDs (one call)
//   4. transactions for all candidate IDs (one call)
//   5. classify + score per identity on a bounded rayon pool
//   6. write-through, then one audit event
// A failed fetch degrades the identities it covered; the run still returns.

use crate::cache::{CacheEntry, ScoreCache};
use crate::classifier::{ClassificationReport, TransactionClassifier};
use crate::config::EngineConfig;
use crate::db::Event;
use crate::entities::{
    ClassifiedTransaction, CycleSelection, Direction, FilerIdentity, FilerRecord, RosterEntry,
    RosterKey, TransactionRecord,
};
use crate::error::EngineResult;
use crate::resolver::{IdentityResolver, Resolution};
use crate::scoring::{ScoreEngine, ScoreInput, ScoreResult};
use crate::store::Datastore;
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Staleness window used when no consumer is named
pub const DEFAULT_CONSUMER: &str = "profile";

/// Totals-only projection for callers that skip scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingTotals {
    pub person_id: String,
    pub total_support: f64,
    pub total_oppose: f64,
    /// Support + oppose
    pub total: f64,
    pub error: Option<String>,
}

/// Per-roster-entry outcome of `bulk_score_roster`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RosterScore {
    Scored(ScoreResult),
    Unresolved,
}

/// Shared result sets for one batch
struct BatchData {
    classified: HashMap<String, Vec<ClassifiedTransaction>>,
    elections: HashMap<String, Vec<FilerRecord>>,
}

pub struct BulkAggregator {
    store: Arc<dyn Datastore>,
    cache: Arc<dyn ScoreCache>,
    config: EngineConfig,
    consumer: String,
    resolver: IdentityResolver,
    engine: ScoreEngine,
}

impl BulkAggregator {
    pub fn new(
        store: Arc<dyn Datastore>,
        cache: Arc<dyn ScoreCache>,
        config: EngineConfig,
    ) -> Self {
        BulkAggregator {
            store,
            cache,
            engine: ScoreEngine::new(config.thresholds.clone()),
            config,
            consumer: DEFAULT_CONSUMER.to_string(),
            resolver: IdentityResolver::default(),
        }
    }

    /// Use the staleness window configured for `consumer`
    pub fn for_consumer(mut self, consumer: &str) -> Self {
        self.consumer = consumer.to_string();
        self
    }

    pub fn with_resolver(mut self, resolver: IdentityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    pub fn resolve_identities(
        &self,
        roster: &[RosterEntry],
        cycle: i32,
    ) -> EngineResult<HashMap<RosterKey, Resolution>> {
        self.resolver.resolve(self.store.as_ref(), roster, cycle)
    }

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================

    /// Classified transactions and per-cycle summaries for one identity
    pub fn classify(
        &self,
        identity: &FilerIdentity,
        selection: CycleSelection,
    ) -> ClassificationReport {
        let identities = std::slice::from_ref(identity);
        match self.fetch_batch(identities, selection) {
            Ok(mut batch) => {
                let transactions = batch
                    .classified
                    .remove(&identity.person_id)
                    .unwrap_or_default();
                ClassificationReport::new(identity.clone(), selection, transactions)
            }
            Err(err) => {
                tracing::warn!(
                    person_id = %identity.person_id,
                    error = %err,
                    "classification degraded"
                );
                ClassificationReport::degraded(identity.clone(), selection, &err)
            }
        }
    }

    // ========================================================================
    // SCORING
    // ========================================================================

    pub fn score(&self, identity: &FilerIdentity, selection: CycleSelection) -> ScoreResult {
        self.bulk_score(std::slice::from_ref(identity), selection)
            .remove(&identity.person_id)
            .unwrap_or_else(|| {
                ScoreResult::degraded(identity.clone(), selection, "identity missing from batch")
            })
    }

    /// Score every identity; keyed by person ID
    pub fn bulk_score(
        &self,
        identities: &[FilerIdentity],
        selection: CycleSelection,
    ) -> HashMap<String, ScoreResult> {
        let identities = unique_by_person(identities);
        if identities.is_empty() {
            return HashMap::new();
        }

        let now = Utc::now();
        let staleness = self.config.cache.staleness_for(&self.consumer);
        let keys: Vec<String> = identities
            .iter()
            .map(|i| CacheEntry::key_for(&i.person_id, selection))
            .collect();

        let cached = self
            .cache
            .get_fresh(&keys, staleness, now)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "cache read failed, recomputing batch");
                HashMap::new()
            });

        let mut results: HashMap<String, ScoreResult> = HashMap::new();
        let mut misses: Vec<FilerIdentity> = Vec::new();
        for (identity, key) in identities.iter().zip(&keys) {
            match cached.get(key) {
                Some(entry) => {
                    results.insert(identity.person_id.clone(), entry.result.clone());
                }
                None => misses.push(identity.clone()),
            }
        }
        let cache_hits = results.len();

        let computed = self.compute(&misses, selection);

        let mut degraded = 0;
        for result in computed {
            if result.is_degraded() {
                degraded += 1;
            } else if let Err(err) = self.cache.put(&CacheEntry::new(result.clone(), now)) {
                tracing::warn!(
                    person_id = %result.identity.person_id,
                    error = %err,
                    "cache write failed"
                );
            }
            results.insert(result.identity.person_id.clone(), result);
        }

        tracing::info!(
            selection = %selection,
            requested = identities.len(),
            cache_hits,
            computed = misses.len(),
            degraded,
            "bulk score completed"
        );

        self.audit(
            "bulk_score_completed",
            serde_json::json!({
                "selection": selection.to_string(),
                "requested": identities.len(),
                "cache_hits": cache_hits,
                "computed": misses.len(),
                "degraded": degraded,
            }),
        );

        results
    }

    /// Resolve a roster, then score everything that resolved
    pub fn bulk_score_roster(
        &self,
        roster: &[RosterEntry],
        cycle: i32,
        selection: CycleSelection,
    ) -> EngineResult<HashMap<RosterKey, RosterScore>> {
        let resolutions = self.resolve_identities(roster, cycle)?;

        let identities: Vec<FilerIdentity> = resolutions
            .values()
            .filter_map(|r| r.identity().cloned())
            .collect();
        let scores = self.bulk_score(&identities, selection);

        Ok(resolutions
            .into_iter()
            .map(|(key, resolution)| {
                let outcome = match resolution {
                    Resolution::Resolved(identity) => match scores.get(&identity.person_id) {
                        Some(result) => RosterScore::Scored(result.clone()),
                        None => RosterScore::Scored(ScoreResult::degraded(
                            identity,
                            selection,
                            "identity missing from batch",
                        )),
                    },
                    Resolution::Unresolved => RosterScore::Unresolved,
                };
                (key, outcome)
            })
            .collect())
    }

    /// Affiliated support/oppose totals only (no scoring, no cache)
    pub fn funding_totals(
        &self,
        identities: &[FilerIdentity],
        selection: CycleSelection,
    ) -> HashMap<String, FundingTotals> {
        let identities = unique_by_person(identities);

        match self.fetch_batch(&identities, selection) {
            Ok(batch) => identities
                .iter()
                .map(|identity| {
                    let (support, oppose) = batch
                        .classified
                        .get(&identity.person_id)
                        .map(|txs| {
                            txs.iter().fold((0.0, 0.0), |(s, o), tx| match tx.direction {
                                Direction::Support => (s + tx.transaction.amount, o),
                                Direction::Oppose => (s, o + tx.transaction.amount),
                            })
                        })
                        .unwrap_or((0.0, 0.0));
                    (
                        identity.person_id.clone(),
                        FundingTotals {
                            person_id: identity.person_id.clone(),
                            total_support: support,
                            total_oppose: oppose,
                            total: support + oppose,
                            error: None,
                        },
                    )
                })
                .collect(),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    identities = identities.len(),
                    "funding totals degraded"
                );
                identities
                    .iter()
                    .map(|identity| {
                        (
                            identity.person_id.clone(),
                            FundingTotals {
                                person_id: identity.person_id.clone(),
                                total_support: 0.0,
                                total_oppose: 0.0,
                                total: 0.0,
                                error: Some(err.to_string()),
                            },
                        )
                    })
                    .collect()
            }
        }
    }

    /// Drop the cached result so the next read recomputes
    pub fn invalidate(
        &self,
        identity: &FilerIdentity,
        selection: CycleSelection,
    ) -> EngineResult<bool> {
        let key = CacheEntry::key_for(&identity.person_id, selection);
        let removed = self.cache.invalidate(&key)?;
        if removed {
            self.audit("score_invalidated", serde_json::json!({ "cache_key": key }));
        }
        Ok(removed)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Fetch, classify and score the given identities
    fn compute(&self, identities: &[FilerIdentity], selection: CycleSelection) -> Vec<ScoreResult> {
        if identities.is_empty() {
            return Vec::new();
        }

        // Scoring reads the whole history; the selection only sets the window
        let batch = match self.fetch_batch(identities, CycleSelection::All) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    identities = identities.len(),
                    "batch fetch failed, degrading"
                );
                return identities
                    .iter()
                    .map(|i| ScoreResult::degraded(i.clone(), selection, &err.to_string()))
                    .collect();
            }
        };

        let current_cycle = self.config.current_cycle;
        let score_one = |identity: &FilerIdentity| -> ScoreResult {
            let transactions = batch
                .classified
                .get(&identity.person_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let elections = batch
                .elections
                .get(&identity.person_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            self.engine.evaluate(&ScoreInput {
                identity,
                transactions,
                elections,
                selection,
                current_cycle,
            })
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_parallelism.max(1))
            .build();

        match pool {
            Ok(pool) => pool.install(|| identities.par_iter().map(score_one).collect()),
            Err(err) => {
                tracing::warn!(error = %err, "scoring pool unavailable, scoring sequentially");
                identities.iter().map(score_one).collect()
            }
        }
    }

    /// Registry, election history and transactions for a batch: three round trips
    fn fetch_batch(
        &self,
        identities: &[FilerIdentity],
        selection: CycleSelection,
    ) -> EngineResult<BatchData> {
        let registry = self.store.affiliation_registry()?;
        let classifier = TransactionClassifier::new(registry);

        let person_ids: Vec<String> = identities.iter().map(|i| i.person_id.clone()).collect();
        let history = self.store.election_history(&person_ids)?;

        let mut elections: HashMap<String, Vec<FilerRecord>> = HashMap::new();
        for record in history {
            elections.entry(record.person_id.clone()).or_default().push(record);
        }

        // Candidate ID → people who filed under it
        let mut owners: HashMap<String, BTreeSet<String>> = HashMap::new();
        for identity in identities {
            owners
                .entry(identity.candidate_id.clone())
                .or_default()
                .insert(identity.person_id.clone());
        }
        for records in elections.values() {
            for record in records {
                owners
                    .entry(record.candidate_id.clone())
                    .or_default()
                    .insert(record.person_id.clone());
            }
        }

        let mut candidate_ids: Vec<String> = owners.keys().cloned().collect();
        candidate_ids.sort();

        let records =
            self.store
                .committee_transactions(&candidate_ids, selection, self.config.current_cycle)?;

        let mut by_person: HashMap<String, Vec<TransactionRecord>> = HashMap::new();
        for record in records {
            if let Some(people) = owners.get(&record.candidate_id) {
                for person_id in people {
                    by_person.entry(person_id.clone()).or_default().push(record.clone());
                }
            }
        }

        let classified = by_person
            .into_iter()
            .map(|(person_id, records)| {
                let txs = classifier.classify(&records);
                tracing::debug!(
                    person_id = %person_id,
                    raw = records.len(),
                    classified = txs.len(),
                    "identity classified"
                );
                (person_id, txs)
            })
            .collect();

        Ok(BatchData { classified, elections })
    }

    fn audit(&self, event_type: &str, data: serde_json::Value) {
        let run_id = uuid::Uuid::new_v4().to_string();
        let event = Event::new(event_type, "batch", &run_id, data, "bulk_aggregator");
        if let Err(err) = self.store.record_event(&event) {
            tracing::warn!(error = %err, event_type, "audit event not recorded");
        }
    }
}

/// First identity per person ID, input order kept
fn unique_by_person(identities: &[FilerIdentity]) -> Vec<FilerIdentity> {
    let mut seen = BTreeSet::new();
    identities
        .iter()
        .filter(|i| seen.insert(i.person_id.clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryScoreCache, SqliteScoreCache};
    use crate::db;
    use crate::entities::SeatType;
    use crate::store::testing::{contribution, filer, seeded_store, CountingStore};
    use crate::store::SqliteStore;

    fn identity(record: &FilerRecord) -> FilerIdentity {
        record.to_identity()
    }

    fn fixture() -> (Vec<FilerRecord>, Vec<TransactionRecord>) {
        let filers = vec![
            // P1: funded only in 2024
            filer("P1", "H4TX03001", 2024, "SMITH, JANE", "TX", 3, true),
            // P2: funded 2020 and 2022 under an older ID, won 2020
            filer("P2", "H4TX07001", 2024, "SMITH, ROBERT", "TX", 7, true),
            filer("P2", "H0TX07001", 2020, "SMITH, ROBERT", "TX", 7, true),
            filer("P2", "H0TX07001", 2022, "SMITH, ROBERT", "TX", 7, false),
            // P3: no affiliated money
            filer("P3", "H4OK01001", 2024, "DOE, JOHN", "OK", 1, false),
        ];
        let transactions = vec![
            contribution("1", "C00000001", "H4TX03001", "24K", 5_000.0, 2024),
            contribution("2", "C00000001", "H0TX07001", "24K", 2_000.0, 2020),
            contribution("3", "C00000001", "H0TX07001", "24E", 8_000.0, 2022),
            contribution("4", "C00000009", "H4OK01001", "24K", 9_000.0, 2024),
        ];
        (filers, transactions)
    }

    fn aggregator(store: Arc<dyn Datastore>) -> BulkAggregator {
        BulkAggregator::new(store, Arc::new(MemoryScoreCache::new()), EngineConfig::default())
    }

    fn current_identities(filers: &[FilerRecord]) -> Vec<FilerIdentity> {
        filers.iter().filter(|f| f.cycle == 2024).map(identity).collect()
    }

    #[test]
    fn test_bulk_score_end_to_end() {
        let (filers, transactions) = fixture();
        let agg = aggregator(Arc::new(seeded_store(&filers, &transactions)));

        let results = agg.bulk_score(&current_identities(&filers), CycleSelection::All);

        assert_eq!(results.len(), 3);
        assert_eq!(results["P1"].score, 0);
        // Two funded cycles, won while funded, nothing in 2024
        assert_eq!(results["P2"].score, 1);
        assert_eq!(results["P3"].score, 5);
        assert_eq!(results["P3"].grade, crate::scoring::LobbyGrade::F);
        assert!(results.values().all(|r| !r.is_degraded()));
    }

    #[test]
    fn test_bulk_score_round_trips_are_constant() {
        let filers: Vec<FilerRecord> = (1..=30u32)
            .map(|d| {
                filer(
                    &format!("P{}", d),
                    &format!("H4CA{:02}001", d),
                    2024,
                    &format!("MEMBER{}, PAT", d),
                    "CA",
                    d,
                    true,
                )
            })
            .collect();
        let transactions: Vec<TransactionRecord> = (1..=30u32)
            .map(|d| {
                contribution(
                    &format!("{}", d),
                    "C00000001",
                    &format!("H4CA{:02}001", d),
                    "24K",
                    1_000.0 * d as f64,
                    2024,
                )
            })
            .collect();
        let store = Arc::new(CountingStore::new(seeded_store(&filers, &transactions)));
        let agg = aggregator(store.clone());

        let results = agg.bulk_score(&current_identities(&filers), CycleSelection::Recent(3));

        assert_eq!(results.len(), 30);
        assert_eq!(store.calls("affiliation_registry"), 1);
        assert_eq!(store.calls("election_history"), 1);
        assert_eq!(store.calls("committee_transactions"), 1);
    }

    #[test]
    fn test_second_run_served_from_cache() {
        let (filers, transactions) = fixture();
        let store = Arc::new(CountingStore::new(seeded_store(&filers, &transactions)));
        let agg = aggregator(store.clone());
        let identities = current_identities(&filers);

        let first = agg.bulk_score(&identities, CycleSelection::Recent(3));
        let second = agg.bulk_score(&identities, CycleSelection::Recent(3));

        assert_eq!(first, second);
        assert_eq!(store.calls("committee_transactions"), 1);

        assert!(agg.invalidate(&identities[0], CycleSelection::Recent(3)).unwrap());
        agg.bulk_score(&identities, CycleSelection::Recent(3));
        assert_eq!(store.calls("committee_transactions"), 2);
    }

    #[test]
    fn test_fetch_failure_degrades_without_caching() {
        let (filers, transactions) = fixture();
        let store = Arc::new(
            CountingStore::new(seeded_store(&filers, &transactions)).failing_transactions(),
        );
        let cache = Arc::new(MemoryScoreCache::new());
        let agg = BulkAggregator::new(store, cache.clone(), EngineConfig::default());

        let results = agg.bulk_score(&current_identities(&filers), CycleSelection::All);

        assert_eq!(results.len(), 3);
        for result in results.values() {
            assert!(result.is_degraded());
            assert_eq!(result.total_affiliated, 0.0);
            assert!(result.error.as_deref().unwrap().contains("query timed out"));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_classify_report() {
        let (filers, transactions) = fixture();
        let agg = aggregator(Arc::new(seeded_store(&filers, &transactions)));
        let p2 = identity(&filers[1]);

        let report = agg.classify(&p2, CycleSelection::Recent(3));

        assert!(report.error.is_none());
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.total_support(), 10_000.0);
        assert_eq!(report.summary_for(2022).unwrap().ie_support, 8_000.0);
    }

    #[test]
    fn test_classify_degrades_on_failure() {
        let (filers, transactions) = fixture();
        let store = CountingStore::new(seeded_store(&filers, &transactions)).failing_transactions();
        let agg = aggregator(Arc::new(store));

        let report = agg.classify(&identity(&filers[0]), CycleSelection::All);

        assert!(report.error.is_some());
        assert!(report.summaries.is_empty());
        assert_eq!(report.net(), 0.0);
    }

    #[test]
    fn test_bulk_score_roster() {
        let (filers, transactions) = fixture();
        let agg = aggregator(Arc::new(seeded_store(&filers, &transactions)));
        let roster = vec![
            RosterEntry::new("Jane Smith", "TX", SeatType::House, 3),
            RosterEntry::new("Robert Smith", "TX", SeatType::House, 7),
            RosterEntry::new("Unknown Person", "NM", SeatType::House, 2),
        ];

        let scores = agg.bulk_score_roster(&roster, 2024, CycleSelection::All).unwrap();

        match &scores[&roster[0].key()] {
            RosterScore::Scored(result) => assert_eq!(result.identity.person_id, "P1"),
            other => panic!("expected score, got {:?}", other),
        }
        match &scores[&roster[1].key()] {
            RosterScore::Scored(result) => assert_eq!(result.identity.person_id, "P2"),
            other => panic!("expected score, got {:?}", other),
        }
        assert_eq!(scores[&roster[2].key()], RosterScore::Unresolved);
    }

    #[test]
    fn test_funding_totals() {
        let (filers, transactions) = fixture();
        let agg = aggregator(Arc::new(seeded_store(&filers, &transactions)));

        let totals = agg.funding_totals(&current_identities(&filers), CycleSelection::Single(2024));

        assert_eq!(totals["P1"].total, 5_000.0);
        assert_eq!(totals["P2"].total, 0.0);
        assert_eq!(totals["P3"].total, 0.0);
    }

    #[test]
    fn test_oversized_recent_window_covers_all_history() {
        let (filers, transactions) = fixture();
        let agg = aggregator(Arc::new(seeded_store(&filers, &transactions)));
        let p1 = identity(&filers[0]);

        let huge = agg.score(&p1, CycleSelection::Recent(u32::MAX));
        let all = agg.score(&p1, CycleSelection::All);
        assert!(!huge.is_degraded());
        assert_eq!(huge.score, all.score);
        assert_eq!(huge.score, 0);
        assert_eq!(huge.cycles.len(), 1);

        let totals =
            agg.funding_totals(&current_identities(&filers), CycleSelection::Recent(40_000));
        assert!(totals.values().all(|t| t.error.is_none()));
        assert_eq!(totals["P1"].total, 5_000.0);
        assert_eq!(totals["P2"].total, 10_000.0);
    }

    #[test]
    fn test_sqlite_cache_and_audit_trail() {
        let (filers, transactions) = fixture();
        let store = seeded_store(&filers, &transactions);
        let shared = store.connection();
        let cache = Arc::new(SqliteScoreCache::new(store.connection()));
        let agg = BulkAggregator::new(Arc::new(store), cache, EngineConfig::default())
            .for_consumer("district_map");

        agg.bulk_score(&current_identities(&filers), CycleSelection::Recent(3));

        let conn = shared.lock().unwrap();
        let cached: i64 = conn
            .query_row("SELECT COUNT(*) FROM score_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cached, 3);
        assert_eq!(db::count_events(&conn, "bulk_score_completed").unwrap(), 1);
    }

    #[test]
    fn test_empty_batch_touches_nothing() {
        let store = Arc::new(CountingStore::new(
            SqliteStore::in_memory(std::time::Duration::from_secs(1)).unwrap(),
        ));
        let agg = aggregator(store.clone());

        assert!(agg.bulk_score(&[], CycleSelection::All).is_empty());
        assert_eq!(store.total(), 0);
    }
}
