//! Global scoring engine: weighted aggregation of the four pillar scores
//! into a final score and letter grade.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::config::PillarWeights;
use crate::domain::models::context::{EngineMeta, EngineOutcome, ExecutionContext};

const ENGINE_VERSION: &str = "1.0.0";

/// Neutral pillar score used when a pillar was never computed.
const NEUTRAL_PILLAR: f64 = 50.0;

/// Letter grade derived from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::A
        } else if score >= 75.0 {
            Self::B
        } else if score >= 60.0 {
            Self::C
        } else if score >= 40.0 {
            Self::D
        } else {
            Self::E
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to the global score, weights included so consumers
/// can reconstruct the aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GlobalMeta {
    pub weights: PillarWeights,
    #[serde(flatten)]
    pub engine: EngineMeta,
}

/// Final aggregated score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GlobalScore {
    pub compliance_weighted: f64,
    pub enterprise_weighted: f64,
    pub pricing_weighted: f64,
    pub quality_weighted: f64,
    /// Weighted sum, rounded to one decimal.
    pub weighted_score: f64,
    pub grade: Grade,
    pub meta: GlobalMeta,
}

/// Aggregates the pillar scores under configured weights.
#[derive(Debug, Clone)]
pub struct GlobalScoringEngine {
    weights: PillarWeights,
    /// Rescale the 0-20 pricing/quality pillars to 0-100 before weighting.
    rescale_pillars: bool,
}

impl Default for GlobalScoringEngine {
    fn default() -> Self {
        Self {
            weights: PillarWeights::default(),
            rescale_pillars: false,
        }
    }
}

impl GlobalScoringEngine {
    pub fn new(weights: PillarWeights, rescale_pillars: bool) -> Self {
        Self {
            weights,
            rescale_pillars,
        }
    }

    pub fn evaluate(&self, ctx: &ExecutionContext) -> EngineOutcome<GlobalScore> {
        let started = Instant::now();

        if !weights_valid(&self.weights) {
            warn!(sum = self.weights.sum(), "invalid pillar weights, zero score");
            return EngineOutcome::degraded(
                self.zero_score(started),
                "invalid pillar weights",
            );
        }

        let compliance = compliance_score(ctx);
        let enterprise = ctx.enterprise_score.unwrap_or(NEUTRAL_PILLAR);
        let pricing = self.rescaled(pillar_score(ctx.pricing.as_ref().map(|p| p.normalized_score)));
        let quality = self.rescaled(pillar_score(ctx.quality.as_ref().map(|q| q.normalized_score)));

        let compliance_weighted = compliance * self.weights.compliance;
        let enterprise_weighted = enterprise * self.weights.enterprise;
        let pricing_weighted = pricing * self.weights.pricing;
        let quality_weighted = quality * self.weights.quality;

        let weighted_score = round_one_decimal(
            compliance_weighted + enterprise_weighted + pricing_weighted + quality_weighted,
        );
        let grade = Grade::from_score(weighted_score);

        debug!(
            compliance,
            enterprise, pricing, quality, weighted_score, %grade,
            "global scoring completed"
        );

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        EngineOutcome::Ok(GlobalScore {
            compliance_weighted,
            enterprise_weighted,
            pricing_weighted,
            quality_weighted,
            weighted_score,
            grade,
            meta: GlobalMeta {
                weights: self.weights,
                engine: EngineMeta::new(ENGINE_VERSION, elapsed),
            },
        })
    }

    fn rescaled(&self, score: f64) -> f64 {
        if self.rescale_pillars {
            (score * 5.0).clamp(0.0, 100.0)
        } else {
            score
        }
    }

    /// All-zero score with grade E, the weights still recorded.
    fn zero_score(&self, started: Instant) -> GlobalScore {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        GlobalScore {
            compliance_weighted: 0.0,
            enterprise_weighted: 0.0,
            pricing_weighted: 0.0,
            quality_weighted: 0.0,
            weighted_score: 0.0,
            grade: Grade::E,
            meta: GlobalMeta {
                weights: self.weights,
                engine: EngineMeta::new(ENGINE_VERSION, elapsed),
            },
        }
    }
}

/// Compliance pillar: the external audit score when available, otherwise
/// derived from the severity breakdown, otherwise neutral.
fn compliance_score(ctx: &ExecutionContext) -> f64 {
    if let Some(audit) = ctx.audit_score {
        if audit > 0.0 {
            return audit.clamp(0.0, 100.0);
        }
    }

    match &ctx.rules {
        Some(rules) if rules.obligation_count() > 0 => {
            let breakdown = rules.severity_breakdown;
            (100.0
                - f64::from(breakdown.critical) * 20.0
                - f64::from(breakdown.high) * 10.0
                - f64::from(breakdown.medium) * 5.0)
                .clamp(0.0, 100.0)
        }
        _ => NEUTRAL_PILLAR,
    }
}

fn pillar_score(score: Option<f64>) -> f64 {
    score.map_or(0.0, |s| if s.is_finite() { s.max(0.0) } else { 0.0 })
}

fn weights_valid(weights: &PillarWeights) -> bool {
    let non_negative = weights.compliance >= 0.0
        && weights.enterprise >= 0.0
        && weights.pricing >= 0.0
        && weights.quality >= 0.0;
    non_negative && (weights.sum() - 1.0).abs() < 1e-6
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
