// 🧊 Score Cache - persisted results with a staleness window
//
// Entries are keyed by person ID and cycle selection. Writers upsert;
// concurrent recomputation of the same key is last-writer-wins.

use crate::entities::CycleSelection;
use crate::error::{EngineResult, ScoreError};
use crate::scoring::ScoreResult;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub person_id: String,
    pub selection: CycleSelection,
    pub result: ScoreResult,
    pub last_computed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(result: ScoreResult, last_computed: DateTime<Utc>) -> Self {
        CacheEntry {
            key: Self::key_for(&result.identity.person_id, result.selection),
            person_id: result.identity.person_id.clone(),
            selection: result.selection,
            result,
            last_computed,
        }
    }

    /// "P123@last3"
    pub fn key_for(person_id: &str, selection: CycleSelection) -> String {
        format!("{}@{}", person_id, selection)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        now - self.last_computed <= staleness
    }
}

pub trait ScoreCache: Send + Sync {
    fn get(&self, key: &str) -> EngineResult<Option<CacheEntry>>;

    /// Batch read; implementations backed by a database should do one round trip
    fn get_many(&self, keys: &[String]) -> EngineResult<HashMap<String, CacheEntry>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(entry) = self.get(key)? {
                found.insert(key.clone(), entry);
            }
        }
        Ok(found)
    }

    fn put(&self, entry: &CacheEntry) -> EngineResult<()>;

    /// Returns true when an entry was removed
    fn invalidate(&self, key: &str) -> EngineResult<bool>;

    /// Batch read dropping entries older than `staleness`
    fn get_fresh(
        &self,
        keys: &[String],
        staleness: Duration,
        now: DateTime<Utc>,
    ) -> EngineResult<HashMap<String, CacheEntry>> {
        let mut entries = self.get_many(keys)?;
        entries.retain(|_, entry| entry.is_fresh(now, staleness));
        Ok(entries)
    }
}

// ============================================================================
// SQLITE CACHE
// ============================================================================

pub struct SqliteScoreCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScoreCache {
    /// Shares the store's connection (schema from `db::setup_database`)
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        SqliteScoreCache { conn }
    }

    fn lock(&self, operation: &str) -> EngineResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ScoreError::DataSourceUnavailable {
            operation: operation.to_string(),
            reason: "connection lock poisoned".to_string(),
        })
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn decode_entry(result_json: &str, last_computed: &str) -> EngineResult<CacheEntry> {
    let result: ScoreResult = serde_json::from_str(result_json)?;
    let last_computed = DateTime::parse_from_rfc3339(last_computed)
        .map_err(|e| ScoreError::DataSourceUnavailable {
            operation: "score_cache".to_string(),
            reason: format!("bad timestamp: {}", e),
        })?
        .with_timezone(&Utc);
    Ok(CacheEntry::new(result, last_computed))
}

impl ScoreCache for SqliteScoreCache {
    fn get(&self, key: &str) -> EngineResult<Option<CacheEntry>> {
        let conn = self.lock("score_cache.get")?;
        let row = conn
            .query_row(
                "SELECT result_json, last_computed FROM score_cache WHERE cache_key = ?1",
                [key],
                entry_from_row,
            )
            .optional()
            .map_err(|e| ScoreError::unavailable("score_cache.get", e))?;

        row.map(|(json, ts)| decode_entry(&json, &ts)).transpose()
    }

    fn get_many(&self, keys: &[String]) -> EngineResult<HashMap<String, CacheEntry>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT result_json, last_computed FROM score_cache WHERE cache_key IN ({})",
            (1..=keys.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
        );

        let rows: Vec<(String, String)> = {
            let conn = self.lock("score_cache.get_many")?;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ScoreError::unavailable("score_cache.get_many", e))?;
            let values = keys.iter().map(|k| Value::Text(k.clone()));
            let mapped = stmt
                .query_map(params_from_iter(values), entry_from_row)
                .map_err(|e| ScoreError::unavailable("score_cache.get_many", e))?;
            mapped
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ScoreError::unavailable("score_cache.get_many", e))?
        };

        let mut found = HashMap::new();
        for (json, ts) in rows {
            match decode_entry(&json, &ts) {
                Ok(entry) => {
                    found.insert(entry.key.clone(), entry);
                }
                // Unreadable rows behave as misses and get rewritten
                Err(err) => tracing::warn!(error = %err, "discarding unreadable cache row"),
            }
        }
        Ok(found)
    }

    fn put(&self, entry: &CacheEntry) -> EngineResult<()> {
        let result_json = serde_json::to_string(&entry.result)?;
        let conn = self.lock("score_cache.put")?;

        conn.execute(
            "INSERT INTO score_cache (
                cache_key, person_id, cycle_selection, score, lobby_score, lobby_grade,
                total_affiliated, result_json, last_computed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(cache_key) DO UPDATE SET
                score = excluded.score,
                lobby_score = excluded.lobby_score,
                lobby_grade = excluded.lobby_grade,
                total_affiliated = excluded.total_affiliated,
                result_json = excluded.result_json,
                last_computed = excluded.last_computed",
            params![
                entry.key,
                entry.person_id,
                entry.selection.to_string(),
                entry.result.score,
                entry.result.lobby_score,
                entry.result.grade.to_string(),
                entry.result.total_affiliated,
                result_json,
                entry.last_computed.to_rfc3339(),
            ],
        )
        .map_err(|e| ScoreError::unavailable("score_cache.put", e))?;

        Ok(())
    }

    fn invalidate(&self, key: &str) -> EngineResult<bool> {
        let conn = self.lock("score_cache.invalidate")?;
        let removed = conn
            .execute("DELETE FROM score_cache WHERE cache_key = ?1", [key])
            .map_err(|e| ScoreError::unavailable("score_cache.invalidate", e))?;
        Ok(removed > 0)
    }
}

// ============================================================================
// IN-MEMORY CACHE
// ============================================================================

#[derive(Default)]
pub struct MemoryScoreCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(operation: &str) -> ScoreError {
    ScoreError::DataSourceUnavailable {
        operation: operation.to_string(),
        reason: "cache lock poisoned".to_string(),
    }
}

impl ScoreCache for MemoryScoreCache {
    fn get(&self, key: &str) -> EngineResult<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| poisoned("memory_cache.get"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, entry: &CacheEntry) -> EngineResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned("memory_cache.put"))?;
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn invalidate(&self, key: &str) -> EngineResult<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| poisoned("memory_cache.invalidate"))?;
        Ok(entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::entities::{FilerIdentity, SeatType};

    fn result(person_id: &str, score: u8) -> ScoreResult {
        let identity = FilerIdentity {
            person_id: person_id.to_string(),
            candidate_id: "H4TX03001".to_string(),
            display_name: "SMITH, JANE".to_string(),
            party: "DEM".to_string(),
            state: "TX".to_string(),
            seat: SeatType::House,
            district: 3,
            cycle: 2024,
        };
        let mut r = ScoreResult::degraded(identity, CycleSelection::Recent(3), "unused");
        r.error = None;
        r.score = score;
        r
    }

    fn sqlite_cache() -> SqliteScoreCache {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        SqliteScoreCache::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_key_format() {
        assert_eq!(CacheEntry::key_for("P1", CycleSelection::Recent(3)), "P1@last3");
        assert_eq!(CacheEntry::key_for("P1", CycleSelection::Single(2022)), "P1@2022");
    }

    #[test]
    fn test_sqlite_upsert_last_writer_wins() {
        let cache = sqlite_cache();
        let now = Utc::now();

        cache.put(&CacheEntry::new(result("P1", 3), now)).unwrap();
        cache.put(&CacheEntry::new(result("P1", 1), now)).unwrap();

        let entry = cache.get("P1@last3").unwrap().unwrap();
        assert_eq!(entry.result.score, 1);
        assert_eq!(entry.person_id, "P1");
    }

    #[test]
    fn test_sqlite_get_many_and_invalidate() {
        let cache = sqlite_cache();
        let now = Utc::now();
        cache.put(&CacheEntry::new(result("P1", 2), now)).unwrap();
        cache.put(&CacheEntry::new(result("P2", 4), now)).unwrap();

        let keys = vec!["P1@last3".to_string(), "P2@last3".to_string(), "P3@last3".to_string()];
        let found = cache.get_many(&keys).unwrap();
        assert_eq!(found.len(), 2);

        assert!(cache.invalidate("P1@last3").unwrap());
        assert!(!cache.invalidate("P1@last3").unwrap());
        assert_eq!(cache.get_many(&keys).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_entries_are_dropped() {
        let cache = MemoryScoreCache::new();
        let now = Utc::now();
        cache.put(&CacheEntry::new(result("P1", 2), now - Duration::hours(30))).unwrap();
        cache.put(&CacheEntry::new(result("P2", 2), now - Duration::hours(2))).unwrap();

        let keys = vec!["P1@last3".to_string(), "P2@last3".to_string()];
        let daily = cache.get_fresh(&keys, Duration::hours(24), now).unwrap();
        let monthly = cache.get_fresh(&keys, Duration::days(30), now).unwrap();

        assert_eq!(daily.len(), 1);
        assert!(daily.contains_key("P2@last3"));
        assert_eq!(monthly.len(), 2);
    }
}
