//! Execution context threaded through the scoring pipeline.
//!
//! One context per analysis run. Each namespace is owned by exactly one
//! engine; the pipeline takes an immutable snapshot per stage and merges the
//! stage's partial result into the next snapshot, so engines never see a
//! namespace before its owner has produced it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::knowledge::DoctrineInsights;
use super::quote::{NormalizedLot, QuoteData};
use super::rule::Rule;

/// Obligation counts per severity level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SeverityBreakdown {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl SeverityBreakdown {
    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// Obligation counts per rule type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TypeBreakdown {
    pub legal: u32,
    pub regulatory: u32,
    pub advisory: u32,
    pub commercial: u32,
}

impl TypeBreakdown {
    pub fn total(&self) -> u32 {
        self.legal + self.regulatory + self.advisory + self.commercial
    }
}

/// Namespace owned by the rule engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RulesNamespace {
    /// Every obligation text, lot order x registry order, duplicates allowed.
    pub obligations: Vec<String>,
    /// First-seen dedup of `obligations` by text.
    pub unique_obligations: Vec<String>,
    /// Full rule records, duplicates allowed.
    pub detailed_obligations: Vec<Rule>,
    /// Dedup of `detailed_obligations` by rule id.
    pub unique_detailed_obligations: Vec<Rule>,
    pub severity_breakdown: SeverityBreakdown,
    pub type_breakdown: TypeBreakdown,
    pub total_weight: f64,
    /// How many lots triggered each category.
    pub category_summary: HashMap<String, u32>,
}

impl RulesNamespace {
    /// Number of obligations including duplicates; the pricing and quality
    /// engines key their heuristics on this.
    pub fn obligation_count(&self) -> usize {
        self.obligations.len()
    }
}

/// Pricing sub-scores. Ratio/structure/decomposition are 0-5, the anomaly
/// penalty is -5-0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingBreakdown {
    pub ratio_score: f64,
    pub structure_score: f64,
    pub anomaly_penalty: f64,
    pub decomposition_score: f64,
}

/// Namespace owned by the pricing engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingNamespace {
    pub breakdown: PricingBreakdown,
    /// Clamped to 0-20.
    pub normalized_score: f64,
}

/// Quality sub-scores, each 0-5.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityBreakdown {
    pub description_score: f64,
    pub materials_score: f64,
    pub legal_mentions_score: f64,
    pub clarity_score: f64,
}

/// Namespace owned by the quality engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityNamespace {
    pub breakdown: QualityBreakdown,
    /// Clamped to 0-20.
    pub normalized_score: f64,
}

/// Shared context for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionContext {
    pub run_id: Uuid,
    /// Region code used for doctrine pricing-reference matching.
    #[serde(default)]
    pub region: Option<String>,
    /// Normalized lots, owned upstream, read-only here.
    pub lots: Vec<NormalizedLot>,
    /// Extracted quote data, owned upstream, read-only here.
    pub quote: QuoteData,
    pub rules: Option<RulesNamespace>,
    pub pricing: Option<PricingNamespace>,
    pub quality: Option<QualityNamespace>,
    /// Enterprise pillar score (0-100), supplied by external collaborators.
    #[serde(default)]
    pub enterprise_score: Option<f64>,
    /// Compliance audit score (0-100), supplied by external collaborators.
    #[serde(default)]
    pub audit_score: Option<f64>,
    pub doctrine: Option<DoctrineInsights>,
}

impl ExecutionContext {
    /// Build an initial context from upstream extraction output.
    pub fn new(lots: Vec<NormalizedLot>, quote: QuoteData) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            region: None,
            lots,
            quote,
            rules: None,
            pricing: None,
            quality: None,
            enterprise_score: None,
            audit_score: None,
            doctrine: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_enterprise_score(mut self, score: f64) -> Self {
        self.enterprise_score = Some(score);
        self
    }

    pub fn with_audit_score(mut self, score: f64) -> Self {
        self.audit_score = Some(score);
        self
    }

    /// Obligation count from the rules namespace, 0 before the rule engine
    /// has run.
    pub fn obligation_count(&self) -> usize {
        self.rules.as_ref().map_or(0, RulesNamespace::obligation_count)
    }
}

/// Execution metadata attached to every engine output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineMeta {
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

impl EngineMeta {
    pub fn new(engine_version: &str, processing_time_ms: u64) -> Self {
        Self {
            engine_version: engine_version.to_string(),
            created_at: Utc::now(),
            processing_time_ms,
        }
    }
}

/// Outcome of a single engine stage.
///
/// Degraded outcomes still carry a usable value (neutral defaults or a
/// partial result); the reason records why the stage could not complete
/// cleanly. Engines never return errors.
#[derive(Debug, Clone)]
pub enum EngineOutcome<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> EngineOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Degradation reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }
}
