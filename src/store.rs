// 🗄️ Datastore - the read side every engine consumes
//
// The engines only see the `Datastore` trait. `SqliteStore` is the reference
// adapter over the schema in `db.rs`; every call runs under a deadline
// enforced by a SQLite progress handler.

use crate::db::{self, Event};
use crate::entities::{
    AffiliationRegistry, CycleSelection, FilerRecord, SeatType, TransactionRecord,
};
use crate::error::{EngineResult, ScoreError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Consumed collaborator: roster-side filer records, election history,
/// committee transactions and the affiliation registry.
///
/// Each method is one round trip regardless of how many keys it is given.
pub trait Datastore: Send + Sync {
    /// Filer records for the given states in one cycle (resolver candidate pool)
    fn candidate_filers(&self, states: &[String], cycle: i32) -> EngineResult<Vec<FilerRecord>>;

    /// Every filing row (all cycles) for the given people
    fn election_history(&self, person_ids: &[String]) -> EngineResult<Vec<FilerRecord>>;

    /// Transactions from affiliated committees to the given candidate IDs
    fn committee_transactions(
        &self,
        candidate_ids: &[String],
        selection: CycleSelection,
        current_cycle: i32,
    ) -> EngineResult<Vec<TransactionRecord>>;

    /// Active allowlist and keywords
    fn affiliation_registry(&self) -> EngineResult<AffiliationRegistry>;

    /// Append to the audit trail; stores without one accept and drop events
    fn record_event(&self, _event: &Event) -> EngineResult<()> {
        Ok(())
    }
}

// ============================================================================
// SQLITE ADAPTER
// ============================================================================

/// Instructions between progress-handler deadline checks
const PROGRESS_OPS: i32 = 1_000;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl SqliteStore {
    /// Wrap an already-initialized connection
    pub fn new(conn: Connection, timeout: Duration) -> rusqlite::Result<Self> {
        conn.busy_timeout(timeout)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    /// Open (or create) a database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        db::setup_database(&conn)?;
        Ok(Self::new(conn, timeout)?)
    }

    /// In-memory database with the full schema
    pub fn in_memory(timeout: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::setup_database(&conn)?;
        Ok(Self::new(conn, timeout)?)
    }

    /// Shared handle, e.g. for a `SqliteScoreCache` on the same database
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Run one query under the store deadline
    fn with_deadline<T, F>(&self, operation: &str, query: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| ScoreError::DataSourceUnavailable {
            operation: operation.to_string(),
            reason: "connection lock poisoned".to_string(),
        })?;

        let deadline = Instant::now() + self.timeout;
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() > deadline));
        let result = query(&conn);
        conn.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);

        result.map_err(|e| ScoreError::unavailable(operation, e))
    }
}

/// "?1, ?2, ..." starting after `offset` already-bound parameters
fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

fn text_values(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.clone())).collect()
}

fn filer_from_row(row: &Row<'_>) -> rusqlite::Result<FilerRecord> {
    let seat_code: String = row.get(5)?;
    let seat = SeatType::parse(&seat_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown seat code '{}'", seat_code).into(),
        )
    })?;

    Ok(FilerRecord {
        person_id: row.get(0)?,
        candidate_id: row.get(1)?,
        cycle: row.get(2)?,
        display_name: row.get(3)?,
        state: row.get(4)?,
        seat,
        district: row.get(6)?,
        party: row.get(7)?,
        won: row.get(8)?,
    })
}

const FILER_COLUMNS: &str =
    "person_id, candidate_id, cycle, display_name, state, seat, district, party, won";

impl Datastore for SqliteStore {
    fn candidate_filers(&self, states: &[String], cycle: i32) -> EngineResult<Vec<FilerRecord>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM filer_candidates
             WHERE cycle = ?1 AND state IN ({})
             ORDER BY state, seat, district, person_id",
            FILER_COLUMNS,
            placeholders(states.len(), 1)
        );

        let mut values = vec![Value::Integer(cycle as i64)];
        values.extend(text_values(states));

        self.with_deadline("candidate_filers", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), filer_from_row)?;
            rows.collect()
        })
    }

    fn election_history(&self, person_ids: &[String]) -> EngineResult<Vec<FilerRecord>> {
        if person_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM filer_candidates
             WHERE person_id IN ({})
             ORDER BY person_id, cycle, candidate_id",
            FILER_COLUMNS,
            placeholders(person_ids.len(), 0)
        );

        self.with_deadline("election_history", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(text_values(person_ids)), filer_from_row)?;
            rows.collect()
        })
    }

    fn committee_transactions(
        &self,
        candidate_ids: &[String],
        selection: CycleSelection,
        current_cycle: i32,
    ) -> EngineResult<Vec<TransactionRecord>> {
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut values = text_values(candidate_ids);
        let mut sql = format!(
            "SELECT t.sub_id, t.committee_id, COALESCE(c.name, ''), t.candidate_id,
                    t.transaction_type, t.amount, t.transaction_date, t.cycle, t.memo_code
             FROM committee_candidate_contributions t
             LEFT JOIN committees c ON c.committee_id = t.committee_id
             WHERE t.candidate_id IN ({})",
            placeholders(candidate_ids.len(), 0)
        );

        // Two bound parameters whatever the window size
        if let Some((low, high)) = selection.bounds(current_cycle) {
            sql.push_str(&format!(
                " AND t.cycle BETWEEN ?{} AND ?{}",
                values.len() + 1,
                values.len() + 2
            ));
            values.push(Value::Integer(i64::from(low)));
            values.push(Value::Integer(i64::from(high)));
        }

        // Prefilter to affiliated committees; the classifier re-checks in memory
        sql.push_str(
            " AND (
                EXISTS (SELECT 1 FROM affiliated_committee_ids a
                        WHERE a.is_active = 1 AND a.committee_id = UPPER(t.committee_id))
                OR EXISTS (SELECT 1 FROM affiliation_keywords k
                        WHERE k.is_active = 1 AND k.keyword <> ''
                          AND instr(lower(COALESCE(c.name, '')), lower(k.keyword)) > 0)
             )
             ORDER BY t.cycle, t.sub_id",
        );

        self.with_deadline("committee_transactions", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                let date: Option<String> = row.get(6)?;
                Ok(TransactionRecord {
                    sub_id: row.get(0)?,
                    committee_id: row.get(1)?,
                    committee_name: row.get(2)?,
                    candidate_id: row.get(3)?,
                    transaction_type: row.get(4)?,
                    amount: row.get(5)?,
                    date: date.as_deref().and_then(db::parse_date),
                    cycle: row.get(7)?,
                    memo_code: row.get(8)?,
                })
            })?;
            rows.collect()
        })
    }

    fn affiliation_registry(&self) -> EngineResult<AffiliationRegistry> {
        self.with_deadline("affiliation_registry", db::load_registry)
    }

    fn record_event(&self, event: &Event) -> EngineResult<()> {
        let conn = self.conn.lock().map_err(|_| ScoreError::DataSourceUnavailable {
            operation: "record_event".to_string(),
            reason: "connection lock poisoned".to_string(),
        })?;
        db::insert_event(&conn, event).map_err(|e| ScoreError::DataSourceUnavailable {
            operation: "record_event".to_string(),
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_candidate_filers_filters_state_and_cycle() {
        let store = seeded_store(
            &[
                filer("P1", "H4TX03001", 2024, "SMITH, JANE", "TX", 3, true),
                filer("P2", "H4OK01001", 2024, "DOE, JOHN", "OK", 1, false),
                filer("P1", "H2TX03001", 2022, "SMITH, JANE", "TX", 3, true),
            ],
            &[],
        );

        let filers = store.candidate_filers(&["TX".to_string()], 2024).unwrap();

        assert_eq!(filers.len(), 1);
        assert_eq!(filers[0].candidate_id, "H4TX03001");
        assert!(filers[0].won);
    }

    #[test]
    fn test_committee_transactions_prefilters_affiliation_and_cycle() {
        let store = seeded_store(
            &[],
            &[
                contribution("1", "C00000001", "H4TX03001", "24K", 5000.0, 2024),
                contribution("2", "C00000009", "H4TX03001", "24K", 9000.0, 2024),
                contribution("3", "C00000001", "H4TX03001", "24E", 1000.0, 2016),
                contribution("4", "C00000001", "H4OK01001", "24K", 700.0, 2024),
            ],
        );

        let ids = vec!["H4TX03001".to_string()];
        let recent = store
            .committee_transactions(&ids, CycleSelection::Recent(3), 2024)
            .unwrap();
        let all = store
            .committee_transactions(&ids, CycleSelection::All, 2024)
            .unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].sub_id, "1");
        assert_eq!(recent[0].committee_name, "Advocacy Victory Fund");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_empty_key_sets_skip_the_query() {
        let store = seeded_store(&[], &[]);
        assert!(store.election_history(&[]).unwrap().is_empty());
        assert!(store
            .committee_transactions(&[], CycleSelection::All, 2024)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_zero_timeout_interrupts_long_query() {
        let store = seeded_store(&[], &[]);
        let slow = SqliteStore {
            conn: store.connection(),
            timeout: Duration::from_millis(0),
        };

        let result = slow.with_deadline("slow_query", |conn| {
            conn.query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 5000000)
                 SELECT COUNT(*) FROM n",
                [],
                |row| row.get::<_, i64>(0),
            )
        });

        match result {
            Err(ScoreError::DataSourceUnavailable { operation, reason }) => {
                assert_eq!(operation, "slow_query");
                assert_eq!(reason, "query timed out");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
