// ⚙️ Engine Configuration - thresholds and windows as data
// Loaded from JSON; every field has a default so partial files work.

use crate::error::{EngineResult, ScoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// SCORE THRESHOLDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    /// Dominant-committee net opposition above this forces score 5 (short-circuit)
    pub oppose_high: f64,

    /// Dominant-committee net opposition above this floors the score at 4
    pub oppose_medium: f64,

    /// Fallback magnitude breakpoints on net support (score 0, 1, 2)
    pub magnitude_score_0: f64,
    pub magnitude_score_1: f64,
    pub magnitude_score_2: f64,

    /// Lobby score: PAC total that earns the full 60 points
    pub lobby_pac_cap: f64,

    /// Lobby score: dominant PAC opposition above this earns 0 PAC points
    pub lobby_pac_oppose_zero: f64,

    /// Lobby score: independent-expenditure support that earns the full 40 points
    pub lobby_ie_cap: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        ScoreThresholds {
            oppose_high: 100_000.0,
            oppose_medium: 50_000.0,
            magnitude_score_0: 10_000_000.0,
            magnitude_score_1: 1_000_000.0,
            magnitude_score_2: 100_000.0,
            lobby_pac_cap: 20_000.0,
            lobby_pac_oppose_zero: 50_000.0,
            lobby_ie_cap: 50_000.0,
        }
    }
}

// ============================================================================
// CACHE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Staleness window for consumers without an explicit entry
    pub default_staleness_hours: u64,

    /// Per-consumer staleness windows, e.g. {"district_map": 720}
    pub consumers: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut consumers = HashMap::new();
        consumers.insert("district_map".to_string(), 30 * 24);
        consumers.insert("profile".to_string(), 24);

        CacheConfig {
            default_staleness_hours: 24,
            consumers,
        }
    }
}

impl CacheConfig {
    /// Staleness window for a named consumer (falls back to the default)
    pub fn staleness_for(&self, consumer: &str) -> chrono::Duration {
        let hours = self
            .consumers
            .get(consumer)
            .copied()
            .unwrap_or(self.default_staleness_hours);
        chrono::Duration::hours(hours as i64)
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Latest election cycle (even year); "current" for recency rules
    pub current_cycle: i32,

    /// Number of cycles covered by the "recent" selection (e.g. last3)
    pub recent_cycles: u32,

    pub thresholds: ScoreThresholds,

    pub cache: CacheConfig,

    /// Upper bound for any single datastore call
    pub query_timeout_ms: u64,

    /// Scoring worker threads; keep at or below the datastore pool size
    pub max_parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            current_cycle: 2024,
            recent_cycles: 3,
            thresholds: ScoreThresholds::default(),
            cache: CacheConfig::default(),
            query_timeout_ms: 5_000,
            max_parallelism: 4,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `INFLUENCE_CONFIG` if set, otherwise defaults
    pub fn from_env() -> EngineResult<Self> {
        match std::env::var("INFLUENCE_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.current_cycle % 2 != 0 {
            return Err(ScoreError::Config(format!(
                "current_cycle must be an even year, got {}",
                self.current_cycle
            )));
        }
        if self.recent_cycles == 0 {
            return Err(ScoreError::Config("recent_cycles must be at least 1".to_string()));
        }
        let t = &self.thresholds;
        if t.oppose_medium > t.oppose_high {
            return Err(ScoreError::Config(
                "oppose_medium must not exceed oppose_high".to_string(),
            ));
        }
        if !(t.magnitude_score_0 >= t.magnitude_score_1
            && t.magnitude_score_1 >= t.magnitude_score_2)
        {
            return Err(ScoreError::Config(
                "magnitude breakpoints must be descending".to_string(),
            ));
        }
        if t.lobby_pac_cap <= 0.0 || t.lobby_ie_cap <= 0.0 {
            return Err(ScoreError::Config("lobby caps must be positive".to_string()));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.current_cycle, 2024);
        assert_eq!(config.thresholds.oppose_high, 100_000.0);
    }

    #[test]
    fn test_staleness_per_consumer() {
        let cache = CacheConfig::default();
        assert_eq!(cache.staleness_for("district_map"), chrono::Duration::days(30));
        assert_eq!(cache.staleness_for("profile"), chrono::Duration::hours(24));
        assert_eq!(cache.staleness_for("unknown"), chrono::Duration::hours(24));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"current_cycle": 2022, "thresholds": {{"oppose_high": 200000.0}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.current_cycle, 2022);
        assert_eq!(config.thresholds.oppose_high, 200_000.0);
        assert_eq!(config.thresholds.oppose_medium, 50_000.0);
        assert_eq!(config.recent_cycles, 3);
    }

    #[test]
    fn test_odd_cycle_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"current_cycle": 2023}}"#).unwrap();

        let err = EngineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ScoreError::Config(_)));
    }
}
