use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use influence_score::entities::current_roster;
use influence_score::{
    insert_committees_csv, insert_filers, insert_registry_csv, insert_transactions,
    load_filers_csv, load_roster_csv, load_transactions_csv, setup_database, verify_count,
    BulkAggregator, CycleSelection, EngineConfig, FilerIdentity, RosterScore, SqliteScoreCache,
    SqliteStore,
};

const DEFAULT_DB: &str = "influence.db";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("influence_score=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "import" => run_import(
            args.get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
        ),
        "score" => {
            let person_id = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: score <person_id> [selection]"))?;
            run_score(person_id, args.get(3).map(String::as_str))
        }
        "bulk" => {
            let roster = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: bulk <roster.csv> [selection]"))?;
            run_bulk(Path::new(roster), args.get(3).map(String::as_str))
        }
        "invalidate" => {
            let person_id = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: invalidate <person_id> [selection]"))?;
            run_invalidate(person_id, args.get(3).map(String::as_str))
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🏛️  Influence Score Engine v{}", influence_score::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  import <dir>                    load filers/committees/registry/transactions CSVs");
    println!("  score <person_id> [selection]   score one person (selection: 2024 | last3 | all)");
    println!("  bulk <roster.csv> [selection]   resolve a roster and score it");
    println!("  invalidate <person_id> [sel]    drop a cached score");
    println!();
    println!("  DB path: $INFLUENCE_DB (default {})", DEFAULT_DB);
    println!("  Config:  $INFLUENCE_CONFIG (JSON, optional)");
}

fn db_path() -> PathBuf {
    env::var("INFLUENCE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB))
}

fn parse_selection(arg: Option<&str>, config: &EngineConfig) -> Result<CycleSelection> {
    match arg {
        Some(value) => value.parse::<CycleSelection>().map_err(|e| anyhow!(e)),
        None => Ok(CycleSelection::Recent(config.recent_cycles)),
    }
}

fn open_engine() -> Result<(BulkAggregator, SqliteStore)> {
    let config = EngineConfig::from_env().context("Failed to load engine configuration")?;
    let store = SqliteStore::open(db_path(), config.query_timeout())
        .context("Failed to open database")?;
    let cache = Arc::new(SqliteScoreCache::new(store.connection()));
    let aggregator = BulkAggregator::new(Arc::new(store.clone()), cache, config);
    Ok((aggregator, store))
}

fn run_import(dir: PathBuf) -> Result<()> {
    println!("🗄️  Data Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Setting up database...");
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    let committees = dir.join("committees.csv");
    if committees.exists() {
        let n = insert_committees_csv(&conn, &committees)?;
        println!("✓ Committees: {}", n);
    }

    let registry = dir.join("registry.csv");
    if registry.exists() {
        let n = insert_registry_csv(&conn, &registry)?;
        println!("✓ Registry entries: {}", n);
    }

    let filers_path = dir.join("filers.csv");
    if filers_path.exists() {
        let filers = load_filers_csv(&filers_path)?;
        insert_filers(&conn, &filers)?;
        println!("✓ Filer records: {}", filers.len());
    }

    let tx_path = dir.join("transactions.csv");
    if tx_path.exists() {
        println!("\n💾 Inserting transactions...");
        let transactions = load_transactions_csv(&tx_path)?;
        let inserted = insert_transactions(&conn, &transactions)?;
        let count = verify_count(&conn)?;
        println!("✓ New transactions: {}", inserted);
        println!("✓ Duplicates skipped: {}", transactions.len() - inserted);
        println!("✓ Database contains {} transactions", count);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");
    Ok(())
}

/// Latest filing row for a person, as an identity
fn lookup_identity(store: &SqliteStore, person_id: &str) -> Result<FilerIdentity> {
    use influence_score::Datastore;

    let history = store.election_history(&[person_id.to_string()])?;
    history
        .iter()
        .max_by_key(|r| r.cycle)
        .map(|r| r.to_identity())
        .ok_or_else(|| anyhow!("No filing history for person {}", person_id))
}

fn run_score(person_id: &str, selection: Option<&str>) -> Result<()> {
    let (aggregator, store) = open_engine()?;
    let selection = parse_selection(selection, aggregator.config())?;
    let identity = lookup_identity(&store, person_id)?;

    println!("🎯 Scoring {} ({}) for {}", identity.display_name, identity.person_id, selection);
    let result = aggregator.score(&identity, selection);

    if let Some(err) = &result.error {
        println!("⚠️  Score unavailable: {}", err);
        return Ok(());
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Score:        {}/5", result.score);
    println!("  Lobby score:  {} ({} - {})", result.lobby_score, result.grade, result.category);
    println!("  Affiliated:   ${:.2}", result.total_affiliated);
    for cycle in &result.cycles {
        println!(
            "  {}  support ${:.2}  oppose ${:.2}  net ${:.2}",
            cycle.cycle, cycle.total_support, cycle.total_oppose, cycle.net
        );
    }
    let trail: Vec<&str> = result.rule_trail.iter().map(|f| f.rule_id.as_str()).collect();
    println!("  Rules fired:  {}", trail.join(" → "));
    Ok(())
}

fn run_bulk(roster_path: &Path, selection: Option<&str>) -> Result<()> {
    let (aggregator, _store) = open_engine()?;
    let selection = parse_selection(selection, aggregator.config())?;
    let cycle = aggregator.config().current_cycle;

    println!("📋 Loading roster...");
    let roster = current_roster(&load_roster_csv(roster_path)?, Utc::now().date_naive());
    println!("✓ {} seats", roster.len());

    println!("\n🔎 Resolving and scoring ({})...", selection);
    let scores = aggregator.bulk_score_roster(&roster, cycle, selection)?;

    let mut unresolved = 0;
    let mut degraded = 0;
    for entry in &roster {
        match scores.get(&entry.key()) {
            Some(RosterScore::Scored(result)) if result.is_degraded() => {
                degraded += 1;
                println!("  ⚠️  {:<28} {:<18} unavailable", entry.full_name, entry.seat_label());
            }
            Some(RosterScore::Scored(result)) => println!(
                "  {:<31} {:<18} {}/5  {:>3} {}",
                entry.full_name,
                entry.seat_label(),
                result.score,
                result.lobby_score,
                result.grade
            ),
            _ => {
                unresolved += 1;
                println!("  ❓ {:<28} {:<18} unresolved", entry.full_name, entry.seat_label());
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Scored {} of {} seats", roster.len() - unresolved - degraded, roster.len());
    if unresolved > 0 {
        println!("✓ Unresolved: {}", unresolved);
    }
    if degraded > 0 {
        println!("✓ Degraded: {}", degraded);
    }
    Ok(())
}

fn run_invalidate(person_id: &str, selection: Option<&str>) -> Result<()> {
    let (aggregator, store) = open_engine()?;
    let selection = parse_selection(selection, aggregator.config())?;
    let identity = lookup_identity(&store, person_id)?;

    if aggregator.invalidate(&identity, selection)? {
        println!("🧹 Cached score for {} ({}) dropped", person_id, selection);
    } else {
        println!("✓ Nothing cached for {} ({})", person_id, selection);
    }
    Ok(())
}
