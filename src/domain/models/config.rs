//! Configuration for the scoring core.
//!
//! Heuristic thresholds, pillar weights, resilience tuning, and cache TTLs
//! are all data-driven so they can be adjusted without code changes. Every
//! field has a serde default matching the shipped behavior.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreConfig {
    /// Heuristic thresholds and pillar weights.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Resilience layer tuning.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Cache TTL configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scoring thresholds and weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    #[serde(default)]
    pub pricing: PricingThresholds,

    #[serde(default)]
    pub quality: QualityThresholds,

    #[serde(default)]
    pub weights: PillarWeights,

    /// When true, the 0-20 pricing and quality pillars are rescaled to
    /// 0-100 before weighting, so their real contribution matches the
    /// documented 20% each. Off by default to preserve observed behavior.
    #[serde(default)]
    pub rescale_pillars: bool,
}

/// Pricing heuristic thresholds. Band tuples are `(low, high)` inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingThresholds {
    /// Amount-per-obligation band scoring 5.
    #[serde(default = "default_ratio_full")]
    pub ratio_full_band: (f64, f64),
    /// Amount-per-obligation band scoring 3.
    #[serde(default = "default_ratio_partial")]
    pub ratio_partial_band: (f64, f64),

    /// VAT-rate band scoring 5.
    #[serde(default = "default_vat_full")]
    pub vat_full_band: (f64, f64),
    /// VAT-rate band scoring 3.
    #[serde(default = "default_vat_partial")]
    pub vat_partial_band: (f64, f64),

    /// Average price per lot outside `(low, high)` takes the -5 penalty.
    #[serde(default = "default_anomaly_severe")]
    pub anomaly_severe_band: (f64, f64),
    /// Average price per lot outside `(low, high)` takes the -2 penalty.
    #[serde(default = "default_anomaly_mild")]
    pub anomaly_mild_band: (f64, f64),

    /// Line-item counts scoring 5 / 4 / 2.
    #[serde(default = "default_decomposition_steps")]
    pub decomposition_steps: (usize, usize, usize),
}

fn default_ratio_full() -> (f64, f64) {
    (100.0, 10_000.0)
}

fn default_ratio_partial() -> (f64, f64) {
    (50.0, 15_000.0)
}

fn default_vat_full() -> (f64, f64) {
    (0.05, 0.25)
}

fn default_vat_partial() -> (f64, f64) {
    (0.02, 0.35)
}

fn default_anomaly_severe() -> (f64, f64) {
    (10.0, 100_000.0)
}

fn default_anomaly_mild() -> (f64, f64) {
    (30.0, 50_000.0)
}

fn default_decomposition_steps() -> (usize, usize, usize) {
    (5, 3, 1)
}

impl Default for PricingThresholds {
    fn default() -> Self {
        Self {
            ratio_full_band: default_ratio_full(),
            ratio_partial_band: default_ratio_partial(),
            vat_full_band: default_vat_full(),
            vat_partial_band: default_vat_partial(),
            anomaly_severe_band: default_anomaly_severe(),
            anomaly_mild_band: default_anomaly_mild(),
            decomposition_steps: default_decomposition_steps(),
        }
    }
}

/// Quality heuristic thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityThresholds {
    /// Description word counts scoring 5 / 4 / 2.
    #[serde(default = "default_description_steps")]
    pub description_word_steps: (usize, usize, usize),

    /// Minimum length for a free-text materials field to count.
    #[serde(default = "default_materials_min_chars")]
    pub materials_min_chars: usize,

    /// Keywords counted as legal mentions in the description.
    #[serde(default = "default_legal_keywords")]
    pub legal_keywords: Vec<String>,
}

fn default_description_steps() -> (usize, usize, usize) {
    (100, 50, 20)
}

const fn default_materials_min_chars() -> usize {
    20
}

fn default_legal_keywords() -> Vec<String> {
    [
        "norme",
        "conformité",
        "légal",
        "droit",
        "réglementation",
        "article",
        "loi",
        "décret",
        "obligation",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            description_word_steps: default_description_steps(),
            materials_min_chars: default_materials_min_chars(),
            legal_keywords: default_legal_keywords(),
        }
    }
}

/// Weights applied to the four pillar scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PillarWeights {
    #[serde(default = "default_compliance_weight")]
    pub compliance: f64,
    #[serde(default = "default_enterprise_weight")]
    pub enterprise: f64,
    #[serde(default = "default_pricing_weight")]
    pub pricing: f64,
    #[serde(default = "default_quality_weight")]
    pub quality: f64,
}

const fn default_compliance_weight() -> f64 {
    0.35
}

const fn default_enterprise_weight() -> f64 {
    0.25
}

const fn default_pricing_weight() -> f64 {
    0.20
}

const fn default_quality_weight() -> f64 {
    0.20
}

impl PillarWeights {
    pub fn sum(&self) -> f64 {
        self.compliance + self.enterprise + self.pricing + self.quality
    }
}

impl Default for PillarWeights {
    fn default() -> Self {
        Self {
            compliance: default_compliance_weight(),
            enterprise: default_enterprise_weight(),
            pricing: default_pricing_weight(),
            quality: default_quality_weight(),
        }
    }
}

/// Resilience layer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResilienceConfig {
    /// Retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a recovery check may probe.
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,

    /// Consecutive half-open successes required to close the circuit.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_window_secs() -> u64 {
    60
}

const fn default_success_threshold() -> u32 {
    2
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            reset_window_secs: default_reset_window_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// Cache TTL configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// TTL in seconds for sources absent from `ttl_by_source`.
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Per-source TTL overrides, seconds.
    #[serde(default = "default_ttl_by_source")]
    pub ttl_by_source: HashMap<String, u64>,
}

const fn default_cache_ttl_secs() -> u64 {
    3_600
}

fn default_ttl_by_source() -> HashMap<String, u64> {
    let day = 86_400;
    HashMap::from([
        ("rule_registry".to_string(), day),
        ("knowledge_core".to_string(), day),
        ("enterprise_lookup".to_string(), 6 * 3_600),
        ("price_reference".to_string(), 12 * 3_600),
        // Geography barely moves; keep for a week.
        ("geo_context_cache".to_string(), 7 * day),
        ("risk_assessment".to_string(), day),
    ])
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
            ttl_by_source: default_ttl_by_source(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
