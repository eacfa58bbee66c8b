// 🎯 Score Engine - ordered rules over classified history
//
// Score 0 = maximal affiliated-funding entanglement, 5 = none.
// Rules run in a fixed order over a precomputed `ScoringContext`; each one
// is a tagged object so precedence can be tested rule by rule.
//
//   R1 baseline            5
//   R2 opposition override >high → 5 and skip history rules; >medium ≥4; >0 ≥3
//   R3 ever funded         ≤4
//   R4 funded once & won   ≤3
//   R5 funded repeatedly   ≤2 (≤1 if won while funded)
//   R6 funded this cycle   =0
//   R7 magnitude fallback  only when no cap fired and window has activity
//   R8 zero-net clamp      window net == 0 → 5

use crate::config::ScoreThresholds;
use crate::entities::{
    ClassifiedTransaction, CycleSelection, CycleSummary, Direction, FilerIdentity, FilerRecord,
};
use crate::classifier::summarize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Amounts closer to zero than half a cent count as zero
const ZERO_EPSILON: f64 = 0.005;

pub const BASELINE_SCORE: u8 = 5;

// ============================================================================
// LOBBY GRADE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LobbyGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LobbyGrade {
    /// A ≥ 80, B ≥ 60, C ≥ 40, D > 0, F = 0
    pub fn from_score(lobby_score: u8) -> Self {
        match lobby_score {
            80.. => LobbyGrade::A,
            60..=79 => LobbyGrade::B,
            40..=59 => LobbyGrade::C,
            1..=39 => LobbyGrade::D,
            0 => LobbyGrade::F,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            LobbyGrade::A => "High Support",
            LobbyGrade::B => "Moderate Support",
            LobbyGrade::C | LobbyGrade::D => "Low Support",
            LobbyGrade::F => "No Support",
        }
    }
}

impl fmt::Display for LobbyGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// INPUT & CONTEXT
// ============================================================================

/// Everything the engine needs for one identity
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub identity: &'a FilerIdentity,
    /// Classified history across all cycles
    pub transactions: &'a [ClassifiedTransaction],
    /// Filing rows for this person (won flags per cycle)
    pub elections: &'a [FilerRecord],
    pub selection: CycleSelection,
    pub current_cycle: i32,
}

/// Facts the rules read, derived once per evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContext {
    /// Cycle treated as "now" for recency
    pub latest_cycle: i32,

    /// Summaries for every cycle up to `latest_cycle`
    pub history: Vec<CycleSummary>,

    /// Cycles with net positive support, ascending
    pub funded_cycles: Vec<i32>,

    pub won_cycles: BTreeSet<i32>,

    /// Net opposition from the single highest-volume affiliated committee
    pub dominant_net_oppose: f64,

    /// Net (support − oppose) across the selected cycles
    pub window_net: f64,

    /// Any classified transaction inside the selected cycles
    pub window_activity: bool,

    /// Summary for `latest_cycle` (empty when no activity)
    pub latest_summary: CycleSummary,

    pub thresholds: ScoreThresholds,
}

impl ScoringContext {
    pub fn build(input: &ScoreInput<'_>, thresholds: &ScoreThresholds) -> Self {
        let latest_cycle = input.selection.latest(input.current_cycle);

        let relevant: Vec<ClassifiedTransaction> = input
            .transactions
            .iter()
            .filter(|tx| tx.transaction.cycle <= latest_cycle)
            .cloned()
            .collect();
        let history = summarize(&relevant);

        let funded_cycles = history
            .iter()
            .filter(|s| s.net > ZERO_EPSILON)
            .map(|s| s.cycle)
            .collect();

        let won_cycles = input
            .elections
            .iter()
            .filter(|e| e.won && e.person_id == input.identity.person_id)
            .map(|e| e.cycle)
            .collect();

        let window: Vec<&CycleSummary> = history
            .iter()
            .filter(|s| input.selection.contains(s.cycle, input.current_cycle))
            .collect();
        let window_net = window.iter().map(|s| s.net).sum();
        let window_activity = window.iter().any(|s| s.transaction_count() > 0);

        let latest_summary = history
            .iter()
            .find(|s| s.cycle == latest_cycle)
            .cloned()
            .unwrap_or_else(|| CycleSummary::empty(latest_cycle));

        ScoringContext {
            latest_cycle,
            dominant_net_oppose: dominant_net_oppose(&relevant),
            history,
            funded_cycles,
            won_cycles,
            window_net,
            window_activity,
            latest_summary,
            thresholds: thresholds.clone(),
        }
    }

    pub fn ever_funded(&self) -> bool {
        !self.funded_cycles.is_empty()
    }

    pub fn won_while_funded(&self) -> bool {
        self.funded_cycles.iter().any(|c| self.won_cycles.contains(c))
    }

    pub fn most_recent_funded(&self) -> Option<i32> {
        self.funded_cycles.last().copied()
    }

    pub fn window_net_is_zero(&self) -> bool {
        self.window_net.abs() < ZERO_EPSILON
    }
}

/// Committee with the largest support + oppose volume; ties go to the lowest ID
fn dominant_net_oppose(transactions: &[ClassifiedTransaction]) -> f64 {
    let mut by_committee: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for tx in transactions {
        let entry = by_committee
            .entry(tx.transaction.committee_id.as_str())
            .or_insert((0.0, 0.0));
        match tx.direction {
            Direction::Support => entry.0 += tx.transaction.amount,
            Direction::Oppose => entry.1 += tx.transaction.amount,
        }
    }

    by_committee
        .into_iter()
        .fold(None::<(f64, f64, f64)>, |best, (_, (support, oppose))| {
            let volume = support + oppose;
            match best {
                Some((best_volume, _, _)) if best_volume >= volume => best,
                _ => Some((volume, support, oppose)),
            }
        })
        .map(|(_, support, oppose)| (oppose - support).max(0.0))
        .unwrap_or(0.0)
}

// ============================================================================
// RULES
// ============================================================================

/// Where a rule sits in the precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStage {
    Baseline,
    Override,
    /// Skipped when an override short-circuits
    History,
    Fallback,
    Clamp,
}

/// Running state threaded through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleState {
    pub score: u8,
    /// A rule from R2–R6 changed or pinned the score
    pub capped: bool,
}

pub struct ScoreRule {
    pub id: &'static str,
    pub description: &'static str,
    pub stage: RuleStage,
    /// When this rule fires, skip the remaining history rules
    pub short_circuit: bool,
    pub predicate: fn(&ScoringContext, &RuleState) -> bool,
    pub effect: fn(&ScoringContext, u8) -> u8,
}

impl ScoreRule {
    pub fn applies(&self, ctx: &ScoringContext, state: &RuleState) -> bool {
        (self.predicate)(ctx, state)
    }

    pub fn apply(&self, ctx: &ScoringContext, score: u8) -> u8 {
        (self.effect)(ctx, score)
    }
}

fn opposition_high(ctx: &ScoringContext) -> bool {
    ctx.dominant_net_oppose > ctx.thresholds.oppose_high
}

/// The fixed rule order
pub fn default_rules() -> Vec<ScoreRule> {
    vec![
        ScoreRule {
            id: "R1",
            description: "baseline",
            stage: RuleStage::Baseline,
            short_circuit: false,
            predicate: |_, _| true,
            effect: |_, _| BASELINE_SCORE,
        },
        ScoreRule {
            id: "R2.high",
            description: "dominant committee opposition above high threshold",
            stage: RuleStage::Override,
            short_circuit: true,
            predicate: |ctx, _| opposition_high(ctx),
            effect: |_, _| BASELINE_SCORE,
        },
        ScoreRule {
            id: "R2.medium",
            description: "dominant committee opposition above medium threshold",
            stage: RuleStage::Override,
            short_circuit: false,
            predicate: |ctx, _| {
                !opposition_high(ctx) && ctx.dominant_net_oppose > ctx.thresholds.oppose_medium
            },
            effect: |_, score| score.max(4),
        },
        ScoreRule {
            id: "R2.low",
            description: "dominant committee opposition above zero",
            stage: RuleStage::Override,
            short_circuit: false,
            predicate: |ctx, _| {
                ctx.dominant_net_oppose > ZERO_EPSILON
                    && ctx.dominant_net_oppose <= ctx.thresholds.oppose_medium
            },
            effect: |_, score| score.max(3),
        },
        ScoreRule {
            id: "R3",
            description: "net support received in some cycle",
            stage: RuleStage::History,
            short_circuit: false,
            predicate: |ctx, _| ctx.ever_funded(),
            effect: |_, score| score.min(4),
        },
        ScoreRule {
            id: "R4",
            description: "funded in exactly one cycle and won it",
            stage: RuleStage::History,
            short_circuit: false,
            predicate: |ctx, _| {
                ctx.funded_cycles.len() == 1 && ctx.won_cycles.contains(&ctx.funded_cycles[0])
            },
            effect: |_, score| score.min(3),
        },
        ScoreRule {
            id: "R5",
            description: "funded in more than one cycle",
            stage: RuleStage::History,
            short_circuit: false,
            predicate: |ctx, _| ctx.funded_cycles.len() > 1,
            effect: |ctx, score| {
                if ctx.won_while_funded() {
                    score.min(1)
                } else {
                    score.min(2)
                }
            },
        },
        ScoreRule {
            id: "R6",
            description: "most recent funded cycle is the latest cycle",
            stage: RuleStage::History,
            short_circuit: false,
            predicate: |ctx, _| ctx.most_recent_funded() == Some(ctx.latest_cycle),
            effect: |_, _| 0,
        },
        ScoreRule {
            id: "R7",
            description: "magnitude of net support in the active window",
            stage: RuleStage::Fallback,
            short_circuit: false,
            predicate: |ctx, state| {
                !state.capped && state.score == BASELINE_SCORE && ctx.window_activity
            },
            effect: |ctx, score| {
                let net = ctx.window_net;
                let t = &ctx.thresholds;
                if net >= t.magnitude_score_0 {
                    0
                } else if net >= t.magnitude_score_1 {
                    1
                } else if net >= t.magnitude_score_2 {
                    2
                } else if net > ZERO_EPSILON {
                    3
                } else {
                    score
                }
            },
        },
        ScoreRule {
            id: "R8",
            description: "zero net affiliated amount in the active window",
            stage: RuleStage::Clamp,
            short_circuit: false,
            predicate: |ctx, _| ctx.window_net_is_zero(),
            effect: |_, _| BASELINE_SCORE,
        },
    ]
}

// ============================================================================
// RESULT
// ============================================================================

/// One fired rule in the evaluation trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFiring {
    pub rule_id: String,
    pub before: u8,
    pub after: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub identity: FilerIdentity,
    pub selection: CycleSelection,
    /// 0 (entangled) ..= 5 (independent)
    pub score: u8,
    /// 0 ..= 100, descriptive only
    pub lobby_score: u8,
    pub grade: LobbyGrade,
    pub category: String,
    /// Total affiliated support + oppose in the active window
    pub total_affiliated: f64,
    pub cycles: Vec<CycleSummary>,
    pub rule_trail: Vec<RuleFiring>,
    /// Set when the result is a degraded placeholder
    pub error: Option<String>,
}

impl ScoreResult {
    /// Zeroed result for an identity whose data could not be fetched
    pub fn degraded(identity: FilerIdentity, selection: CycleSelection, error: &str) -> Self {
        ScoreResult {
            identity,
            selection,
            score: BASELINE_SCORE,
            lobby_score: 0,
            grade: LobbyGrade::F,
            category: LobbyGrade::F.category().to_string(),
            total_affiliated: 0.0,
            cycles: Vec::new(),
            rule_trail: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn fired(&self, rule_id: &str) -> bool {
        self.rule_trail.iter().any(|f| f.rule_id == rule_id)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ScoreEngine {
    rules: Vec<ScoreRule>,
    thresholds: ScoreThresholds,
}

impl ScoreEngine {
    pub fn new(thresholds: ScoreThresholds) -> Self {
        ScoreEngine {
            rules: default_rules(),
            thresholds,
        }
    }

    /// Run the pipeline; pure, never fails
    pub fn evaluate(&self, input: &ScoreInput<'_>) -> ScoreResult {
        let ctx = ScoringContext::build(input, &self.thresholds);
        let (score, rule_trail) = self.run_rules(&ctx);
        let lobby_score = self.lobby_score(&ctx.latest_summary);
        let grade = LobbyGrade::from_score(lobby_score);

        let cycles: Vec<CycleSummary> = ctx
            .history
            .iter()
            .filter(|s| input.selection.contains(s.cycle, input.current_cycle))
            .cloned()
            .collect();
        let total_affiliated = cycles
            .iter()
            .map(|s| s.total_support + s.total_oppose)
            .sum();

        tracing::debug!(
            person_id = %input.identity.person_id,
            selection = %input.selection,
            score,
            lobby_score,
            "identity scored"
        );

        ScoreResult {
            identity: input.identity.clone(),
            selection: input.selection,
            score,
            lobby_score,
            grade,
            category: grade.category().to_string(),
            total_affiliated,
            cycles,
            rule_trail,
            error: None,
        }
    }

    pub fn run_rules(&self, ctx: &ScoringContext) -> (u8, Vec<RuleFiring>) {
        let mut state = RuleState {
            score: BASELINE_SCORE,
            capped: false,
        };
        let mut skip_history = false;
        let mut trail = Vec::new();

        for rule in &self.rules {
            if skip_history && rule.stage == RuleStage::History {
                continue;
            }
            if !rule.applies(ctx, &state) {
                continue;
            }

            let before = state.score;
            state.score = rule.apply(ctx, before).min(BASELINE_SCORE);
            if matches!(rule.stage, RuleStage::Override | RuleStage::History) {
                state.capped = true;
            }
            if rule.short_circuit {
                skip_history = true;
            }

            trail.push(RuleFiring {
                rule_id: rule.id.to_string(),
                before,
                after: state.score,
            });
        }

        (state.score, trail)
    }

    /// 0–100 from latest-cycle totals: PAC ≤ 60, independent-expenditure support ≤ 40
    pub fn lobby_score(&self, latest: &CycleSummary) -> u8 {
        let t = &self.thresholds;
        let pac_support = latest.contribution_support();
        let pac_oppose = latest.contribution_oppose();
        let dominant = pac_support.max(pac_oppose);
        let oppose_dominates = pac_oppose > pac_support;

        let opposed_out = oppose_dominates && dominant > t.lobby_pac_oppose_zero;
        let pac_points = if dominant <= 0.0 || opposed_out {
            0.0
        } else {
            60.0 * dominant.min(t.lobby_pac_cap) / t.lobby_pac_cap
        };

        let ie_points = 40.0 * latest.ie_support.max(0.0).min(t.lobby_ie_cap) / t.lobby_ie_cap;

        (pac_points + ie_points).round().clamp(0.0, 100.0) as u8
    }
}

impl Default for ScoreEngine {
    fn default() -> Self {
        ScoreEngine::new(ScoreThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MatchReason, SeatType, Transaction, TransactionCode};

    fn identity() -> FilerIdentity {
        FilerIdentity {
            person_id: "P1".to_string(),
            candidate_id: "H4TX03001".to_string(),
            display_name: "SMITH, JANE".to_string(),
            party: "DEM".to_string(),
            state: "TX".to_string(),
            seat: SeatType::House,
            district: 3,
            cycle: 2024,
        }
    }

    fn tx(
        committee: &str,
        code: TransactionCode,
        direction: Direction,
        amount: f64,
        cycle: i32,
    ) -> ClassifiedTransaction {
        ClassifiedTransaction {
            transaction: Transaction {
                sub_id: format!("{}-{}-{}", committee, cycle, amount),
                amount,
                code,
                date: None,
                cycle,
                committee_id: committee.to_string(),
                committee_name: String::new(),
                candidate_id: "H4TX03001".to_string(),
            },
            direction,
            reason: MatchReason::Allowlist,
        }
    }

    fn support(cycle: i32, amount: f64) -> ClassifiedTransaction {
        tx("C1", TransactionCode::DirectContribution, Direction::Support, amount, cycle)
    }

    fn oppose(cycle: i32, amount: f64) -> ClassifiedTransaction {
        tx("C9", TransactionCode::IndependentExpenditureAgainst, Direction::Oppose, amount, cycle)
    }

    fn won(cycle: i32) -> FilerRecord {
        FilerRecord {
            person_id: "P1".to_string(),
            candidate_id: "H4TX03001".to_string(),
            cycle,
            display_name: "SMITH, JANE".to_string(),
            state: "TX".to_string(),
            seat: SeatType::House,
            district: 3,
            party: "DEM".to_string(),
            won: true,
        }
    }

    fn score(
        transactions: &[ClassifiedTransaction],
        elections: &[FilerRecord],
        selection: CycleSelection,
    ) -> ScoreResult {
        let identity = identity();
        ScoreEngine::default().evaluate(&ScoreInput {
            identity: &identity,
            transactions,
            elections,
            selection,
            current_cycle: 2024,
        })
    }

    #[test]
    fn test_zero_activity_is_baseline_grade_f() {
        let result = score(&[], &[], CycleSelection::Recent(3));
        assert_eq!(result.score, 5);
        assert_eq!(result.lobby_score, 0);
        assert_eq!(result.grade, LobbyGrade::F);
        assert_eq!(result.category, "No Support");
        assert!(result.fired("R8"));
    }

    #[test]
    fn test_opposition_override_short_circuits_history() {
        let history = vec![
            support(2018, 20_000.0),
            support(2020, 15_000.0),
            support(2022, 10_000.0),
            oppose(2024, 150_000.0),
        ];
        let result = score(&history, &[won(2020)], CycleSelection::All);

        assert_eq!(result.score, 5);
        assert!(result.fired("R2.high"));
        for skipped in ["R3", "R4", "R5", "R6", "R7"] {
            assert!(!result.fired(skipped), "{} should not fire", skipped);
        }
    }

    #[test]
    fn test_recency_dominance() {
        let result = score(&[support(2024, 2_500.0)], &[], CycleSelection::Recent(3));
        assert_eq!(result.score, 0);
        assert!(result.fired("R3"));
        assert!(result.fired("R6"));
    }

    #[test]
    fn test_repeated_won_but_stale_case() {
        let history = vec![support(1999, 1_000.0), support(2002, 5_000.0), support(2024, 1_000.0)];
        let result = score(&history, &[won(2002)], CycleSelection::All);

        assert_eq!(result.score, 0);
        let r5 = result.rule_trail.iter().find(|f| f.rule_id == "R5").unwrap();
        assert_eq!(r5.after, 1);
    }

    #[test]
    fn test_funded_once_and_won() {
        let result = score(&[support(2020, 5_000.0)], &[won(2020)], CycleSelection::All);
        assert_eq!(result.score, 3);
    }

    #[test]
    fn test_funded_twice_not_won() {
        let history = [support(2018, 5_000.0), support(2020, 5_000.0)];
        let result = score(&history, &[], CycleSelection::All);
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_medium_opposition_falls_through() {
        // Net oppose $60k from the dominant committee, old support elsewhere
        let history = vec![
            oppose(2022, 60_000.0),
            support(2018, 1_000.0),
        ];
        let result = score(&history, &[], CycleSelection::All);

        assert!(result.fired("R2.medium"));
        assert!(result.fired("R3"));
        assert_eq!(result.score, 4);
    }

    fn context(dominant_net_oppose: f64, window_net: f64, window_activity: bool) -> ScoringContext {
        ScoringContext {
            latest_cycle: 2024,
            history: vec![],
            funded_cycles: vec![],
            won_cycles: BTreeSet::new(),
            dominant_net_oppose,
            window_net,
            window_activity,
            latest_summary: CycleSummary::empty(2024),
            thresholds: ScoreThresholds::default(),
        }
    }

    #[test]
    fn test_fallback_only_when_nothing_capped() {
        let (score, trail) = ScoreEngine::default().run_rules(&context(0.0, 2_000_000.0, true));

        assert_eq!(score, 1);
        assert_eq!(trail.last().unwrap().rule_id, "R7");
    }

    #[test]
    fn test_opposition_tiers_at_thresholds() {
        let engine = ScoreEngine::default();
        let cases: &[(f64, &[&str])] = &[
            (150_000.0, &["R1", "R2.high", "R8"]),
            (100_000.01, &["R1", "R2.high", "R8"]),
            (100_000.0, &["R1", "R2.medium", "R8"]),
            (50_000.01, &["R1", "R2.medium", "R8"]),
            (50_000.0, &["R1", "R2.low", "R8"]),
            (1.0, &["R1", "R2.low", "R8"]),
            (0.004, &["R1", "R8"]),
            (0.0, &["R1", "R8"]),
        ];

        for (net_oppose, expected) in cases {
            let (score, trail) = engine.run_rules(&context(*net_oppose, 0.0, false));
            let fired: Vec<&str> = trail.iter().map(|f| f.rule_id.as_str()).collect();
            assert_eq!(fired, expected.to_vec(), "net oppose {}", net_oppose);
            assert_eq!(score, 5, "net oppose {}", net_oppose);
        }
    }

    #[test]
    fn test_magnitude_breakpoints() {
        let engine = ScoreEngine::default();
        let cases = [
            (25_000_000.0, 0),
            (10_000_000.0, 0),
            (9_999_999.99, 1),
            (1_000_000.0, 1),
            (999_999.99, 2),
            (100_000.0, 2),
            (99_999.99, 3),
            (0.01, 3),
        ];

        for (net, expected) in cases {
            let (score, trail) = engine.run_rules(&context(0.0, net, true));
            assert_eq!(score, expected, "window net {}", net);
            assert_eq!(trail.last().unwrap().rule_id, "R7", "window net {}", net);
        }

        // Below half a cent the clamp wins
        let (score, trail) = engine.run_rules(&context(0.0, 0.004, true));
        assert_eq!(score, 5);
        assert_eq!(trail.last().unwrap().rule_id, "R8");
    }

    #[test]
    fn test_low_opposition_suppresses_fallback() {
        let (score, trail) =
            ScoreEngine::default().run_rules(&context(10_000.0, 2_000_000.0, true));
        let fired: Vec<&str> = trail.iter().map(|f| f.rule_id.as_str()).collect();

        assert_eq!(fired, vec!["R1", "R2.low"]);
        assert_eq!(score, 5);
    }

    #[test]
    fn test_zero_net_window_clamps_to_baseline() {
        let history = vec![
            support(2024, 5_000.0),
            tx("C1", TransactionCode::DirectContribution, Direction::Oppose, 5_000.0, 2024),
        ];
        let result = score(&history, &[], CycleSelection::Single(2024));
        assert_eq!(result.score, 5);
    }

    #[test]
    fn test_single_cycle_selection_ignores_later_cycles() {
        let history = [support(2020, 3_000.0), support(2024, 3_000.0)];
        let result = score(&history, &[], CycleSelection::Single(2020));
        // As of 2020 only one funded cycle exists and it is the latest
        assert_eq!(result.score, 0);
        assert_eq!(result.cycles.len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let history = vec![support(2020, 12_000.0), support(2024, 30_000.0)];
        let a = score(&history, &[won(2020)], CycleSelection::Recent(3));
        let b = score(&history, &[won(2020)], CycleSelection::Recent(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_lobby_score_components() {
        let engine = ScoreEngine::default();

        let mut full = CycleSummary::empty(2024);
        full.total_support = 20_000.0 + 50_000.0;
        full.ie_support = 50_000.0;
        assert_eq!(engine.lobby_score(&full), 100);

        let mut half_pac = CycleSummary::empty(2024);
        half_pac.total_support = 10_000.0;
        assert_eq!(engine.lobby_score(&half_pac), 30);

        let mut heavy_oppose = CycleSummary::empty(2024);
        heavy_oppose.total_oppose = 60_000.0;
        assert_eq!(engine.lobby_score(&heavy_oppose), 0);

        let mut light_oppose = CycleSummary::empty(2024);
        light_oppose.total_oppose = 10_000.0;
        assert_eq!(engine.lobby_score(&light_oppose), 30);
    }

    #[test]
    fn test_score_bounds_and_grade_monotonic() {
        let samples: Vec<Vec<ClassifiedTransaction>> = vec![
            vec![],
            vec![support(2024, 1.0)],
            vec![support(2016, 1e8)],
            vec![oppose(2024, 1e6)],
            vec![support(2020, 500.0), support(2022, 500.0), support(2024, 500.0)],
        ];
        for history in &samples {
            let result = score(history, &[won(2022)], CycleSelection::All);
            assert!(result.score <= 5);
            assert!(result.lobby_score <= 100);
        }

        let mut previous = LobbyGrade::F;
        for lobby in 0..=100u8 {
            let grade = LobbyGrade::from_score(lobby);
            assert!(grade <= previous, "grade must not worsen as lobby score rises");
            previous = grade;
        }
        assert_eq!(LobbyGrade::from_score(80), LobbyGrade::A);
        assert_eq!(LobbyGrade::from_score(79), LobbyGrade::B);
        assert_eq!(LobbyGrade::from_score(40), LobbyGrade::C);
        assert_eq!(LobbyGrade::from_score(1), LobbyGrade::D);
    }
}
