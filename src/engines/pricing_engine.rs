//! Pricing engine: heuristic coherence checks on the quoted amounts.
//!
//! Four independent sub-scores, each falling back to a neutral value when
//! its inputs are missing. The engine is a pure function of the context
//! snapshot and cannot fail.

use std::time::Instant;

use tracing::debug;

use crate::domain::models::config::PricingThresholds;
use crate::domain::models::context::{
    EngineMeta, EngineOutcome, ExecutionContext, PricingBreakdown, PricingNamespace,
};

const ENGINE_VERSION: &str = "1.0.0";

/// Neutral sub-score applied when required inputs are absent.
const NEUTRAL_SCORE: f64 = 2.0;

/// Output of one pricing-engine run.
#[derive(Debug, Clone)]
pub struct PricingEvaluation {
    pub pricing: PricingNamespace,
    pub meta: EngineMeta,
}

/// Scores pricing coherence on a 0-20 scale.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    thresholds: PricingThresholds,
}

impl PricingEngine {
    pub fn new(thresholds: PricingThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate the pricing pillar. Requires the rules namespace for the
    /// obligation count; a missing namespace reads as zero obligations.
    pub fn evaluate(&self, ctx: &ExecutionContext) -> EngineOutcome<PricingEvaluation> {
        let started = Instant::now();

        let breakdown = PricingBreakdown {
            ratio_score: self.ratio_score(ctx),
            structure_score: self.structure_score(ctx),
            anomaly_penalty: self.anomaly_penalty(ctx),
            decomposition_score: self.decomposition_score(ctx),
        };

        // The anomaly check contributes a 5-point allowance reduced by the
        // penalty, so a fully coherent quote reaches 20.
        let raw = (breakdown.ratio_score
            + breakdown.structure_score
            + (5.0 + breakdown.anomaly_penalty)
            + breakdown.decomposition_score)
            .max(0.0);
        let normalized_score = raw.clamp(0.0, 20.0);

        debug!(
            ratio = breakdown.ratio_score,
            structure = breakdown.structure_score,
            anomaly = breakdown.anomaly_penalty,
            decomposition = breakdown.decomposition_score,
            normalized_score,
            "pricing engine completed"
        );

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        EngineOutcome::Ok(PricingEvaluation {
            pricing: PricingNamespace {
                breakdown,
                normalized_score,
            },
            meta: EngineMeta::new(ENGINE_VERSION, elapsed),
        })
    }

    /// Amount per obligation: cheap quotes with many obligations or huge
    /// quotes with few both look suspicious.
    fn ratio_score(&self, ctx: &ExecutionContext) -> f64 {
        let obligations = ctx.obligation_count();
        let Some(total) = ctx.quote.total_amount else {
            return NEUTRAL_SCORE;
        };
        if obligations == 0 || !total.is_finite() {
            return NEUTRAL_SCORE;
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = total / obligations as f64;
        band_score(
            ratio,
            self.thresholds.ratio_full_band,
            self.thresholds.ratio_partial_band,
        )
    }

    /// Implied VAT rate between HT and TTC.
    fn structure_score(&self, ctx: &ExecutionContext) -> f64 {
        let (Some(ht), Some(ttc)) = (ctx.quote.price_ht, ctx.quote.price_ttc) else {
            return NEUTRAL_SCORE;
        };
        if ht <= 0.0 || !ht.is_finite() || !ttc.is_finite() {
            return NEUTRAL_SCORE;
        }

        let vat_rate = (ttc - ht) / ht;
        band_score(
            vat_rate,
            self.thresholds.vat_full_band,
            self.thresholds.vat_partial_band,
        )
    }

    /// Average price per lot far outside plausible bounds draws a penalty.
    fn anomaly_penalty(&self, ctx: &ExecutionContext) -> f64 {
        let Some(total) = ctx.quote.total_amount else {
            return 0.0;
        };
        if ctx.lots.is_empty() || !total.is_finite() {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let per_lot = total / ctx.lots.len() as f64;
        let (severe_low, severe_high) = self.thresholds.anomaly_severe_band;
        let (mild_low, mild_high) = self.thresholds.anomaly_mild_band;

        if per_lot < severe_low || per_lot > severe_high {
            -5.0
        } else if per_lot < mild_low || per_lot > mild_high {
            -2.0
        } else {
            0.0
        }
    }

    /// More line items means a better-decomposed quote.
    fn decomposition_score(&self, ctx: &ExecutionContext) -> f64 {
        let count = ctx.quote.line_items.len();
        let (full, good, minimal) = self.thresholds.decomposition_steps;
        if count >= full {
            5.0
        } else if count >= good {
            4.0
        } else if count >= minimal {
            2.0
        } else {
            0.0
        }
    }
}

/// 5 inside the full band, 3 inside the partial band, 1 otherwise.
fn band_score(value: f64, full: (f64, f64), partial: (f64, f64)) -> f64 {
    if value >= full.0 && value <= full.1 {
        5.0
    } else if value >= partial.0 && value <= partial.1 {
        3.0
    } else {
        1.0
    }
}
