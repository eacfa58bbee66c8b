use crate::entities::{
    AffiliationRegistry, FilerRecord, RosterEntry, SeatType, TransactionRecord,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event for the audit trail (one per bulk run, cache invalidation, import)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Filer records: one row per (person, candidate ID, cycle)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS filer_candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            cycle INTEGER NOT NULL,
            display_name TEXT NOT NULL,
            state TEXT NOT NULL,
            seat TEXT NOT NULL,
            district INTEGER NOT NULL DEFAULT 0,
            party TEXT NOT NULL DEFAULT '',
            won INTEGER NOT NULL DEFAULT 0,
            UNIQUE(person_id, candidate_id, cycle)
        )",
        [],
    )?;

    // ==========================================================================
    // Committees and committee-to-candidate transactions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS committees (
            committee_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            committee_type TEXT NOT NULL DEFAULT '',
            designation TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS committee_candidate_contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sub_id TEXT UNIQUE NOT NULL,
            committee_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            amount REAL NOT NULL,
            transaction_date TEXT,
            cycle INTEGER NOT NULL,
            memo_code TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Affiliation registry (allowlist + keywords, soft-deactivated)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS affiliated_committee_ids (
            committee_id TEXT PRIMARY KEY,
            label TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS affiliation_keywords (
            keyword TEXT PRIMARY KEY,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Score cache (write-through, last-writer-wins)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS score_cache (
            cache_key TEXT PRIMARY KEY,
            person_id TEXT NOT NULL,
            cycle_selection TEXT NOT NULL,
            score INTEGER NOT NULL,
            lobby_score INTEGER NOT NULL,
            lobby_grade TEXT NOT NULL,
            total_affiliated REAL NOT NULL,
            result_json TEXT NOT NULL,
            last_computed TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_filer_cycle_state ON filer_candidates(cycle, state, seat)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_filer_person ON filer_candidates(person_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contrib_candidate
         ON committee_candidate_contributions(candidate_id, cycle)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contrib_committee
         ON committee_candidate_contributions(committee_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Parse filing dates (YYYY-MM-DD, MM/DD/YYYY or the bulk-file MMDDYYYY)
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    ["%Y-%m-%d", "%m/%d/%Y", "%m%d%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

// ============================================================================
// CSV ROWS
// ============================================================================

#[derive(Debug, Deserialize)]
struct FilerRow {
    person_id: String,
    candidate_id: String,
    cycle: i32,
    display_name: String,
    state: String,
    seat: String,
    #[serde(default)]
    district: Option<u32>,
    #[serde(default)]
    party: String,
    #[serde(default)]
    won: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default)]
    sub_id: String,
    committee_id: String,
    candidate_id: String,
    transaction_type: String,
    amount: f64,
    #[serde(default)]
    date: String,
    cycle: i32,
    #[serde(default)]
    memo_code: String,
}

#[derive(Debug, Deserialize)]
struct CommitteeRow {
    committee_id: String,
    name: String,
    #[serde(default)]
    committee_type: String,
    #[serde(default)]
    designation: String,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    full_name: String,
    state: String,
    seat: String,
    #[serde(default)]
    district: Option<u32>,
    #[serde(default)]
    term_end: String,
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    /// Either a committee ID ("C00...") or a keyword, depending on `kind`
    kind: String,
    value: String,
    #[serde(default = "default_active")]
    is_active: u8,
}

fn default_active() -> u8 {
    1
}

// ============================================================================
// CSV LOADERS
// ============================================================================

pub fn load_filers_csv(csv_path: &Path) -> Result<Vec<FilerRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open filer CSV file")?;
    let mut records = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: FilerRow = result.context("Failed to deserialize filer row")?;
        let seat = SeatType::parse(&row.seat)
            .ok_or_else(|| anyhow!("Unknown seat '{}' on filer line {}", row.seat, line + 2))?;

        records.push(FilerRecord {
            person_id: row.person_id,
            candidate_id: row.candidate_id,
            cycle: row.cycle,
            display_name: row.display_name,
            state: row.state.to_uppercase(),
            seat,
            district: row.district.unwrap_or(0),
            party: row.party,
            won: row.won.unwrap_or(0) != 0,
        });
    }

    Ok(records)
}

pub fn load_transactions_csv(csv_path: &Path) -> Result<Vec<TransactionRecord>> {
    let mut rdr =
        csv::Reader::from_path(csv_path).context("Failed to open transaction CSV file")?;
    let mut records = Vec::new();

    for result in rdr.deserialize() {
        let row: TransactionRow = result.context("Failed to deserialize transaction row")?;

        let mut record = TransactionRecord {
            sub_id: row.sub_id.trim().to_string(),
            committee_id: row.committee_id,
            committee_name: String::new(),
            candidate_id: row.candidate_id,
            transaction_type: row.transaction_type,
            amount: row.amount,
            date: parse_date(&row.date),
            cycle: row.cycle,
            memo_code: row.memo_code,
        };

        if record.sub_id.is_empty() {
            record.sub_id = record.compute_idempotency_hash();
        }

        records.push(record);
    }

    Ok(records)
}

pub fn load_roster_csv(csv_path: &Path) -> Result<Vec<RosterEntry>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open roster CSV file")?;
    let mut entries = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let row: RosterRow = result.context("Failed to deserialize roster row")?;
        let seat = SeatType::parse(&row.seat)
            .ok_or_else(|| anyhow!("Unknown seat '{}' on roster line {}", row.seat, line + 2))?;

        let mut entry =
            RosterEntry::new(&row.full_name, &row.state, seat, row.district.unwrap_or(0));
        entry.term_end = parse_date(&row.term_end);
        entries.push(entry);
    }

    Ok(entries)
}

// ============================================================================
// INSERTS
// ============================================================================

pub fn insert_filers(conn: &Connection, records: &[FilerRecord]) -> Result<usize> {
    let mut inserted = 0;

    for record in records {
        let changed = conn.execute(
            "INSERT INTO filer_candidates (
                person_id, candidate_id, cycle, display_name, state, seat, district, party, won
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(person_id, candidate_id, cycle) DO UPDATE SET
                display_name = excluded.display_name,
                state = excluded.state,
                seat = excluded.seat,
                district = excluded.district,
                party = excluded.party,
                won = excluded.won",
            params![
                record.person_id,
                record.candidate_id,
                record.cycle,
                record.display_name,
                record.state,
                record.seat.code(),
                record.district,
                record.party,
                record.won,
            ],
        )?;
        inserted += changed;
    }

    Ok(inserted)
}

/// Insert transactions; repeated sub IDs are skipped (idempotent re-import)
pub fn insert_transactions(conn: &Connection, records: &[TransactionRecord]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for record in records {
        let result = conn.execute(
            "INSERT INTO committee_candidate_contributions (
                sub_id, committee_id, candidate_id, transaction_type, amount,
                transaction_date, cycle, memo_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.sub_id,
                record.committee_id,
                record.candidate_id,
                record.transaction_type,
                record.amount,
                record.date.map(|d| d.to_string()),
                record.cycle,
                record.memo_code,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(inserted, duplicates, "transactions imported");

    Ok(inserted)
}

pub fn insert_committees_csv(conn: &Connection, csv_path: &Path) -> Result<usize> {
    let mut rdr =
        csv::Reader::from_path(csv_path).context("Failed to open committee CSV file")?;
    let mut inserted = 0;

    for result in rdr.deserialize() {
        let row: CommitteeRow = result.context("Failed to deserialize committee row")?;
        inserted += conn.execute(
            "INSERT INTO committees (committee_id, name, committee_type, designation)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(committee_id) DO UPDATE SET
                name = excluded.name,
                committee_type = excluded.committee_type,
                designation = excluded.designation",
            params![row.committee_id, row.name, row.committee_type, row.designation],
        )?;
    }

    Ok(inserted)
}

pub fn insert_committee(conn: &Connection, committee_id: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO committees (committee_id, name) VALUES (?1, ?2)
         ON CONFLICT(committee_id) DO UPDATE SET name = excluded.name",
        params![committee_id, name],
    )?;
    Ok(())
}

/// Registry CSV: `kind,value,is_active` where kind is "committee" or "keyword"
pub fn insert_registry_csv(conn: &Connection, csv_path: &Path) -> Result<usize> {
    let mut rdr =
        csv::Reader::from_path(csv_path).context("Failed to open registry CSV file")?;
    let mut inserted = 0;

    for result in rdr.deserialize() {
        let row: RegistryRow = result.context("Failed to deserialize registry row")?;
        let active = row.is_active != 0;
        match row.kind.trim().to_lowercase().as_str() {
            "committee" => set_affiliated_committee(conn, &row.value, active)?,
            "keyword" => set_affiliation_keyword(conn, &row.value, active)?,
            other => return Err(anyhow!("Unknown registry kind '{}'", other)),
        }
        inserted += 1;
    }

    Ok(inserted)
}

pub fn set_affiliated_committee(conn: &Connection, committee_id: &str, active: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO affiliated_committee_ids (committee_id, is_active) VALUES (?1, ?2)
         ON CONFLICT(committee_id) DO UPDATE SET is_active = excluded.is_active",
        params![committee_id.trim().to_uppercase(), active],
    )?;
    Ok(())
}

pub fn set_affiliation_keyword(conn: &Connection, keyword: &str, active: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO affiliation_keywords (keyword, is_active) VALUES (?1, ?2)
         ON CONFLICT(keyword) DO UPDATE SET is_active = excluded.is_active",
        params![keyword.trim(), active],
    )?;
    Ok(())
}

/// Active registry entries only
pub fn load_registry(conn: &Connection) -> rusqlite::Result<AffiliationRegistry> {
    let mut ids_stmt =
        conn.prepare("SELECT committee_id FROM affiliated_committee_ids WHERE is_active = 1")?;
    let ids = ids_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut kw_stmt = conn.prepare("SELECT keyword FROM affiliation_keywords WHERE is_active = 1")?;
    let keywords = kw_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AffiliationRegistry::from_parts(ids, keywords))
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_events(conn: &Connection, event_type: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE event_type = ?1",
        [event_type],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM committee_candidate_contributions",
        [],
        |row| row.get(0),
    )?;

    Ok(count)
}
