// 💸 Transaction Entity - committee-to-candidate money movement
//
// Raw records arrive with a signed amount and a free-text type code.
// Normalized transactions carry a positive amount and a closed-vocabulary code;
// the sign survives only as the derived direction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// TRANSACTION CODE (closed vocabulary)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionCode {
    /// 24A - Independent expenditure opposing the candidate
    IndependentExpenditureAgainst,

    /// 24C - Coordinated party expenditure
    CoordinatedPartyExpenditure,

    /// 24E - Independent expenditure advocating the candidate
    IndependentExpenditureFor,

    /// 24F - Communication cost for the candidate
    CommunicationCost,

    /// 24K - Direct contribution to a nonaffiliated committee
    DirectContribution,

    /// 24N - In-kind / communication cost
    InKindContribution,

    /// 24P - Contribution to a potential candidate
    PotentialCandidateContribution,

    /// 24R - Election recount disbursement
    RecountDisbursement,

    /// 24Z - In-kind contribution
    InKindOther,
}

impl TransactionCode {
    pub const ALL: [TransactionCode; 9] = [
        TransactionCode::IndependentExpenditureAgainst,
        TransactionCode::CoordinatedPartyExpenditure,
        TransactionCode::IndependentExpenditureFor,
        TransactionCode::CommunicationCost,
        TransactionCode::DirectContribution,
        TransactionCode::InKindContribution,
        TransactionCode::PotentialCandidateContribution,
        TransactionCode::RecountDisbursement,
        TransactionCode::InKindOther,
    ];

    /// Parse a filing code such as "24E" (case and whitespace insensitive)
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "24A" => Some(TransactionCode::IndependentExpenditureAgainst),
            "24C" => Some(TransactionCode::CoordinatedPartyExpenditure),
            "24E" => Some(TransactionCode::IndependentExpenditureFor),
            "24F" => Some(TransactionCode::CommunicationCost),
            "24K" => Some(TransactionCode::DirectContribution),
            "24N" => Some(TransactionCode::InKindContribution),
            "24P" => Some(TransactionCode::PotentialCandidateContribution),
            "24R" => Some(TransactionCode::RecountDisbursement),
            "24Z" => Some(TransactionCode::InKindOther),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCode::IndependentExpenditureAgainst => "24A",
            TransactionCode::CoordinatedPartyExpenditure => "24C",
            TransactionCode::IndependentExpenditureFor => "24E",
            TransactionCode::CommunicationCost => "24F",
            TransactionCode::DirectContribution => "24K",
            TransactionCode::InKindContribution => "24N",
            TransactionCode::PotentialCandidateContribution => "24P",
            TransactionCode::RecountDisbursement => "24R",
            TransactionCode::InKindOther => "24Z",
        }
    }

    /// Codes whose meaning fixes the direction regardless of amount sign
    pub fn explicit_direction(&self) -> Option<Direction> {
        match self {
            TransactionCode::IndependentExpenditureFor => Some(Direction::Support),
            TransactionCode::IndependentExpenditureAgainst => Some(Direction::Oppose),
            _ => None,
        }
    }

    /// Independent expenditures (for/against), as opposed to contributions
    pub fn is_independent_expenditure(&self) -> bool {
        self.explicit_direction().is_some()
    }
}

// ============================================================================
// DIRECTION & MATCH REASON
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Support,
    Oppose,
}

/// Why a committee counted as affiliated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchReason {
    /// Committee ID is on the allowlist
    Allowlist,

    /// Committee name contains this registry keyword
    Keyword(String),
}

// ============================================================================
// RAW RECORD (as returned by the datastore)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Filing sub ID; unique per reported line
    pub sub_id: String,
    pub committee_id: String,
    pub committee_name: String,
    pub candidate_id: String,
    /// Free-text type code as filed, e.g. "24E"
    pub transaction_type: String,
    /// Signed amount before normalization
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub cycle: i32,
    #[serde(default)]
    pub memo_code: String,
}

impl TransactionRecord {
    /// Memo lines duplicate amounts reported elsewhere
    pub fn is_memo(&self) -> bool {
        self.memo_code.trim().eq_ignore_ascii_case("X")
    }

    /// Stable hash used as the sub ID for imported rows that lack one
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}|{}",
            self.committee_id,
            self.candidate_id,
            self.transaction_type,
            self.amount,
            self.date.map(|d| d.to_string()).unwrap_or_default(),
            self.cycle
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// NORMALIZED TRANSACTION
// ============================================================================

/// Immutable historical fact; `amount` is always positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sub_id: String,
    pub amount: f64,
    pub code: TransactionCode,
    pub date: Option<NaiveDate>,
    pub cycle: i32,
    pub committee_id: String,
    pub committee_name: String,
    pub candidate_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub transaction: Transaction,
    pub direction: Direction,
    pub reason: MatchReason,
}
