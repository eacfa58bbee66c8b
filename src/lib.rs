// Influence Score Engine - Core Library
// Exposes all modules for use in the CLI and tests

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod resolver;
pub mod scoring;
pub mod store;

// Re-export commonly used types
pub use aggregator::{BulkAggregator, FundingTotals, RosterScore};
pub use cache::{CacheEntry, MemoryScoreCache, ScoreCache, SqliteScoreCache};
pub use classifier::{summarize, ClassificationReport, TransactionClassifier};
pub use config::{CacheConfig, EngineConfig, ScoreThresholds};
pub use db::{
    Event,
    setup_database, insert_event, get_events_for_entity, count_events,
    load_filers_csv, load_transactions_csv, load_roster_csv,
    insert_filers, insert_transactions, insert_committees_csv, insert_registry_csv,
    verify_count,
};
pub use entities::{
    AffiliationRegistry, ClassifiedTransaction, CycleSelection, CycleSummary, Direction,
    FilerIdentity, FilerRecord, MatchReason, RosterEntry, RosterKey, SeatType, Transaction,
    TransactionCode, TransactionRecord,
};
pub use error::{EngineResult, ScoreError};
pub use resolver::{IdentityResolver, MatchTier, NameMatcher, Resolution, TieredSubstringMatcher};
pub use scoring::{LobbyGrade, ScoreEngine, ScoreInput, ScoreResult, ScoreRule};
pub use store::{Datastore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
