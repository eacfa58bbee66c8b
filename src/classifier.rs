// 🧭 Transaction Classifier - affiliated money, SUPPORT or OPPOSE
//
// Pipeline per record set:
//   dedupe by sub ID → drop memo rows → drop zero amounts → parse code
//   → affiliation test → direction → positive amount
// then per-cycle aggregation.

use crate::entities::{
    AffiliationRegistry, ClassifiedTransaction, CycleSelection, CycleSummary, Direction,
    FilerIdentity, Transaction, TransactionCode, TransactionRecord,
};
use crate::error::{EngineResult, ScoreError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

pub struct TransactionClassifier {
    registry: AffiliationRegistry,
}

impl TransactionClassifier {
    pub fn new(registry: AffiliationRegistry) -> Self {
        TransactionClassifier { registry }
    }

    /// Classify one raw record.
    ///
    /// `Ok(None)` means the record is legitimately out of scope (memo, zero,
    /// unaffiliated). Unknown codes are an error so callers can log them.
    pub fn classify_record(
        &self,
        record: &TransactionRecord,
    ) -> EngineResult<Option<ClassifiedTransaction>> {
        if record.is_memo() || record.amount == 0.0 {
            return Ok(None);
        }

        let code = TransactionCode::parse(&record.transaction_type).ok_or_else(|| {
            ScoreError::InvalidTransactionCode {
                code: record.transaction_type.clone(),
                sub_id: record.sub_id.clone(),
            }
        })?;

        let reason = match self
            .registry
            .match_committee(&record.committee_id, &record.committee_name)
        {
            Some(reason) => reason,
            None => return Ok(None),
        };

        let direction = code.explicit_direction().unwrap_or(if record.amount > 0.0 {
            Direction::Support
        } else {
            Direction::Oppose
        });

        Ok(Some(ClassifiedTransaction {
            transaction: Transaction {
                sub_id: record.sub_id.clone(),
                amount: record.amount.abs(),
                code,
                date: record.date,
                cycle: record.cycle,
                committee_id: record.committee_id.clone(),
                committee_name: record.committee_name.clone(),
                candidate_id: record.candidate_id.clone(),
            },
            direction,
            reason,
        }))
    }

    /// Classify a record set; invalid codes are logged and skipped
    pub fn classify(&self, records: &[TransactionRecord]) -> Vec<ClassifiedTransaction> {
        let mut classified = Vec::new();

        for record in dedupe_by_sub_id(records) {
            match self.classify_record(record) {
                Ok(Some(tx)) => classified.push(tx),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "transaction excluded"),
            }
        }

        classified.sort_by(|a, b| {
            a.transaction
                .cycle
                .cmp(&b.transaction.cycle)
                .then_with(|| a.transaction.date.cmp(&b.transaction.date))
                .then_with(|| a.transaction.sub_id.cmp(&b.transaction.sub_id))
        });
        classified
    }
}

/// One record per sub ID: latest date wins, then the largest amount.
///
/// Records without a sub ID are keyed by their content hash instead.
pub fn dedupe_by_sub_id(records: &[TransactionRecord]) -> Vec<&TransactionRecord> {
    let mut by_sub_id: HashMap<Cow<'_, str>, &TransactionRecord> = HashMap::new();

    for record in records {
        let key = if record.sub_id.trim().is_empty() {
            Cow::Owned(record.compute_idempotency_hash())
        } else {
            Cow::Borrowed(record.sub_id.as_str())
        };
        match by_sub_id.get(&key) {
            Some(existing)
                if (existing.date, existing.amount) >= (record.date, record.amount) => {}
            _ => {
                by_sub_id.insert(key, record);
            }
        }
    }

    by_sub_id.into_values().collect()
}

/// Per-cycle totals, ascending by cycle
pub fn summarize(classified: &[ClassifiedTransaction]) -> Vec<CycleSummary> {
    let mut by_cycle: BTreeMap<i32, CycleSummary> = BTreeMap::new();

    for tx in classified {
        let cycle = tx.transaction.cycle;
        let summary = by_cycle
            .entry(cycle)
            .or_insert_with(|| CycleSummary::empty(cycle));
        let amount = tx.transaction.amount;
        let is_ie = tx.transaction.code.is_independent_expenditure();

        match tx.direction {
            Direction::Support => {
                summary.total_support += amount;
                summary.support_count += 1;
                if is_ie {
                    summary.ie_support += amount;
                }
            }
            Direction::Oppose => {
                summary.total_oppose += amount;
                summary.oppose_count += 1;
                if is_ie {
                    summary.ie_oppose += amount;
                }
            }
        }
        summary.net = summary.total_support - summary.total_oppose;
    }

    by_cycle.into_values().collect()
}

// ============================================================================
// CLASSIFICATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub identity: FilerIdentity,
    pub selection: CycleSelection,
    pub transactions: Vec<ClassifiedTransaction>,
    pub summaries: Vec<CycleSummary>,
    /// Set when the data could not be fetched; totals are then all zero
    pub error: Option<String>,
}

impl ClassificationReport {
    pub fn new(
        identity: FilerIdentity,
        selection: CycleSelection,
        transactions: Vec<ClassifiedTransaction>,
    ) -> Self {
        let summaries = summarize(&transactions);
        ClassificationReport {
            identity,
            selection,
            transactions,
            summaries,
            error: None,
        }
    }

    /// All-zero report carrying the failure
    pub fn degraded(
        identity: FilerIdentity,
        selection: CycleSelection,
        error: &ScoreError,
    ) -> Self {
        ClassificationReport {
            identity,
            selection,
            transactions: Vec::new(),
            summaries: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn total_support(&self) -> f64 {
        self.summaries.iter().map(|s| s.total_support).sum()
    }

    pub fn total_oppose(&self) -> f64 {
        self.summaries.iter().map(|s| s.total_oppose).sum()
    }

    pub fn net(&self) -> f64 {
        self.total_support() - self.total_oppose()
    }

    pub fn summary_for(&self, cycle: i32) -> Option<&CycleSummary> {
        self.summaries.iter().find(|s| s.cycle == cycle)
    }
}
