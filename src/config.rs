//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following
//! precedence (highest to lowest):
//!
//! 1. Environment variables
//! 2. `.sql-diag.toml` in current directory
//! 3. `~/.config/sql-diag/config.toml`
//! 4. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! driver = "mysql"
//!
//! [scoring.weights]
//! execution_time = 0.30
//! scan_efficiency = 0.25
//! index_quality = 0.20
//! join_efficiency = 0.15
//! scalability = 0.10
//!
//! [thresholds]
//! max_execution_time_ms = 1000
//! max_rows_examined = 100000
//!
//! [regression]
//! storage_path = ".sql-diag/baselines"
//! enabled = true
//!
//! [hypothetical_index]
//! enabled = false
//! allowed_environments = ["local", "testing"]
//!
//! [ci]
//! fail_on_warning = false
//! fail_on_grade_below = "D"
//! ```

use std::{collections::HashMap, env, fs, path::PathBuf};

use serde::Deserialize;

use crate::{
    error::{AppResult, config_error},
    scoring::{GradeThresholds, ScoringWeights}
};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// `mysql`, `pgsql`, or `sqlite`.
    pub driver:     Option<String>,
    pub connection: Option<String>,
    #[serde(default)]
    pub scoring:    ScoringConfig,
    #[serde(default)]
    pub rules:      RulesConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub cardinality_drift: CardinalityDriftConfig,
    #[serde(default)]
    pub anti_patterns: AntiPatternsConfig,
    #[serde(default)]
    pub index_synthesis: IndexSynthesisConfig,
    #[serde(default)]
    pub memory_pressure: MemoryPressureConfig,
    #[serde(default)]
    pub regression: RegressionConfig,
    #[serde(default)]
    pub hypothetical_index: HypotheticalIndexConfig,
    #[serde(default)]
    pub ci: CiConfig
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub grade_thresholds: GradeThresholds
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(default)]
    pub enabled:  Option<Vec<String>>,
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub severity: HashMap<String, String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    pub max_execution_time_ms:  f64,
    pub max_rows_examined:      u64,
    pub max_loops:              u64,
    pub max_cost:                f64,
    pub max_nested_loop_depth:  usize
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            max_execution_time_ms: 1000.0,
            max_rows_examined:     100_000,
            max_loops:             10_000,
            max_cost:              10_000.0,
            max_nested_loop_depth: 3
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionConfig {
    pub targets: Vec<u64>
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            targets: vec![1_000_000, 10_000_000]
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CardinalityDriftConfig {
    pub warning_threshold:  f64,
    pub critical_threshold: f64
}

impl Default for CardinalityDriftConfig {
    fn default() -> Self {
        Self {
            warning_threshold:  0.5,
            critical_threshold: 0.9
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AntiPatternsConfig {
    pub or_chain_threshold:         usize,
    pub missing_limit_row_threshold: u64
}

impl Default for AntiPatternsConfig {
    fn default() -> Self {
        Self {
            or_chain_threshold:          3,
            missing_limit_row_threshold: 10_000
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IndexSynthesisConfig {
    pub max_recommendations:    usize,
    pub max_columns_per_index: usize
}

impl Default for IndexSynthesisConfig {
    fn default() -> Self {
        Self {
            max_recommendations:    3,
            max_columns_per_index: 4
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MemoryPressureConfig {
    pub high_threshold_bytes:     u64,
    pub moderate_threshold_bytes: u64,
    pub concurrent_sessions:      u32
}

impl Default for MemoryPressureConfig {
    fn default() -> Self {
        Self {
            high_threshold_bytes:     256 * 1024 * 1024,
            moderate_threshold_bytes: 64 * 1024 * 1024,
            concurrent_sessions:      10
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegressionConfig {
    pub storage_path:         PathBuf,
    pub max_history:          usize,
    pub score_warning_pct:    f64,
    pub score_critical_pct:   f64,
    pub time_warning_pct:     f64,
    pub time_critical_pct:    f64,
    pub noise_floor_ms:       f64,
    pub minimum_measurable_ms: f64,
    pub enabled:              bool
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            storage_path:          PathBuf::from(".sql-diag/baselines"),
            max_history:           50,
            score_warning_pct:     10.0,
            score_critical_pct:    25.0,
            time_warning_pct:      25.0,
            time_critical_pct:     100.0,
            noise_floor_ms:        1.0,
            minimum_measurable_ms: 5.0,
            enabled:               true
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HypotheticalIndexConfig {
    pub max_simulations:      usize,
    pub timeout_seconds:      u64,
    pub allowed_environments: Vec<String>,
    pub enabled:              bool
}

impl Default for HypotheticalIndexConfig {
    fn default() -> Self {
        Self {
            max_simulations:      3,
            timeout_seconds:      5,
            allowed_environments: vec!["local".to_string(), "testing".to_string()],
            enabled:              false
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CiConfig {
    #[serde(default)]
    pub fail_on_warning:     bool,
    #[serde(default)]
    pub fail_on_grade_below: Option<char>
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest): environment variables, `.sql-diag.toml`
    /// in the current directory, `~/.config/sql-diag/config.toml`, defaults.
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-diag")
                .join("config.toml");
            if home_config.exists() {
                config = Self::read_toml(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".sql-diag.toml");
        if local_config.exists() {
            config = Self::read_toml(&local_config)?;
        }

        if let Ok(driver) = env::var("SQL_DIAG_DRIVER") {
            config.driver = Some(driver);
        }
        if let Ok(connection) = env::var("SQL_DIAG_CONNECTION") {
            config.connection = Some(connection);
        }

        Ok(config)
    }

    fn read_toml(path: &PathBuf) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }
}
