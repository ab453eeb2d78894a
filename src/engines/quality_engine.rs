//! Quality engine: documentation completeness of the quote itself.
//!
//! Pure function of the context snapshot. Sub-scores degrade to zero when
//! the corresponding content is absent; the engine never fails.

use std::time::Instant;

use tracing::debug;

use crate::domain::models::config::QualityThresholds;
use crate::domain::models::context::{
    EngineMeta, EngineOutcome, ExecutionContext, QualityBreakdown, QualityNamespace,
};
use crate::domain::models::quote::Materials;

const ENGINE_VERSION: &str = "1.0.0";

/// Output of one quality-engine run.
#[derive(Debug, Clone)]
pub struct QualityEvaluation {
    pub quality: QualityNamespace,
    pub meta: EngineMeta,
}

/// Scores documentation quality on a 0-20 scale.
#[derive(Debug, Clone, Default)]
pub struct QualityEngine {
    thresholds: QualityThresholds,
}

impl QualityEngine {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, ctx: &ExecutionContext) -> EngineOutcome<QualityEvaluation> {
        let started = Instant::now();

        let breakdown = QualityBreakdown {
            description_score: self.description_score(ctx),
            materials_score: self.materials_score(ctx),
            legal_mentions_score: self.legal_mentions_score(ctx),
            clarity_score: self.clarity_score(ctx),
        };

        // Sub-scores already cap at 5 each; the clamp is defensive.
        let normalized_score = (breakdown.description_score
            + breakdown.materials_score
            + breakdown.legal_mentions_score
            + breakdown.clarity_score)
            .clamp(0.0, 20.0);

        debug!(
            description = breakdown.description_score,
            materials = breakdown.materials_score,
            legal = breakdown.legal_mentions_score,
            clarity = breakdown.clarity_score,
            normalized_score,
            "quality engine completed"
        );

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        EngineOutcome::Ok(QualityEvaluation {
            quality: QualityNamespace {
                breakdown,
                normalized_score,
            },
            meta: EngineMeta::new(ENGINE_VERSION, elapsed),
        })
    }

    fn description_score(&self, ctx: &ExecutionContext) -> f64 {
        let words = ctx.quote.description_word_count();
        let (full, good, minimal) = self.thresholds.description_word_steps;
        if words >= full {
            5.0
        } else if words >= good {
            4.0
        } else if words >= minimal {
            2.0
        } else {
            0.0
        }
    }

    fn materials_score(&self, ctx: &ExecutionContext) -> f64 {
        match &ctx.quote.materials {
            Some(Materials::List(items)) if !items.is_empty() => 5.0,
            Some(Materials::Text(text)) if text.trim().len() >= self.thresholds.materials_min_chars => {
                5.0
            }
            _ => 0.0,
        }
    }

    /// Keyword hits in the description plus explicit legal-mention entries.
    fn legal_mentions_score(&self, ctx: &ExecutionContext) -> f64 {
        let description = ctx
            .quote
            .description
            .as_deref()
            .unwrap_or("")
            .to_lowercase();

        let keyword_hits: usize = self
            .thresholds
            .legal_keywords
            .iter()
            .map(|keyword| description.matches(keyword.as_str()).count())
            .sum();

        let total = keyword_hits + ctx.quote.legal_mentions.len();
        if total >= 3 {
            5.0
        } else if total >= 1 {
            3.0
        } else {
            0.0
        }
    }

    fn clarity_score(&self, ctx: &ExecutionContext) -> f64 {
        let mut score = 0.0_f64;

        match ctx.lots.len() {
            0 => {}
            1 => score += 1.0,
            _ => score += 2.0,
        }

        let obligations = ctx.obligation_count();
        if obligations >= 5 {
            score += 2.0;
        } else if obligations >= 2 {
            score += 1.0;
        }

        if ctx.quote.line_items.len() >= 5 {
            score += 1.0;
        }

        score.min(5.0)
    }
}
