// Entity Models
// Roster, filer, transaction, registry and cycle types shared by every engine

pub mod cycle;
pub mod registry;
pub mod roster;
pub mod transaction;

pub use cycle::{CycleSelection, CycleSummary, EARLIEST_CYCLE};
pub use registry::AffiliationRegistry;
pub use roster::{current_roster, FilerIdentity, FilerRecord, RosterEntry, RosterKey, SeatType};
pub use transaction::{
    ClassifiedTransaction, Direction, MatchReason, Transaction, TransactionCode, TransactionRecord,
};
