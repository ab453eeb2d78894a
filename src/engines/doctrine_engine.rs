//! Doctrine engine: advisory enrichment from the knowledge core.
//!
//! Matches norms, market price references, and jurisprudence notes against
//! the lot kinds present in the quote. Purely additive: the insights never
//! feed into any pillar score, and a knowledge-core outage degrades to empty
//! insights with zero confidence instead of failing the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::models::context::{EngineMeta, EngineOutcome, ExecutionContext};
use crate::domain::models::knowledge::{DoctrineInsights, KnowledgeCore};
use crate::domain::ports::KnowledgeSource;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::resilience::ResilienceService;

const ENGINE_VERSION: &str = "1.0.0";

/// Cache source / breaker name for knowledge-core fetches.
const KNOWLEDGE_API: &str = "knowledge_core";

/// Output of one doctrine-engine run.
#[derive(Debug, Clone)]
pub struct DoctrineEvaluation {
    pub doctrine: DoctrineInsights,
    pub meta: EngineMeta,
}

/// Enriches the context with matched doctrine records and a confidence
/// score for how well the knowledge core covers this quote.
pub struct DoctrineActivationEngine {
    source: Arc<dyn KnowledgeSource>,
    resilience: Arc<ResilienceService>,
    cache: Arc<TtlCache>,
}

impl DoctrineActivationEngine {
    pub fn new(
        source: Arc<dyn KnowledgeSource>,
        resilience: Arc<ResilienceService>,
        cache: Arc<TtlCache>,
    ) -> Self {
        Self {
            source,
            resilience,
            cache,
        }
    }

    pub async fn evaluate(&self, ctx: &ExecutionContext) -> EngineOutcome<DoctrineEvaluation> {
        let started = Instant::now();

        let Some(core) = self.load_core().await else {
            warn!("knowledge core unavailable, doctrine insights empty");
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            return EngineOutcome::degraded(
                DoctrineEvaluation {
                    doctrine: DoctrineInsights::default(),
                    meta: EngineMeta::new(ENGINE_VERSION, elapsed),
                },
                "knowledge core unavailable",
            );
        };

        let doctrine = match_insights(&core, ctx);

        debug!(
            norms = doctrine.matched_norms.len(),
            pricing_refs = doctrine.pricing_references.len(),
            jurisprudence = doctrine.jurisprudence_notes.len(),
            confidence = doctrine.knowledge_confidence_score,
            "doctrine engine completed"
        );

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        EngineOutcome::Ok(DoctrineEvaluation {
            doctrine,
            meta: EngineMeta::new(ENGINE_VERSION, elapsed),
        })
    }

    /// Knowledge core through cache and resilience. The core is one blob;
    /// the cache key carries no parameters.
    async fn load_core(&self) -> Option<KnowledgeCore> {
        let params = json!({});

        if let Some(cached) = self
            .cache
            .get::<KnowledgeCore, _>(KNOWLEDGE_API, &params)
            .await
        {
            return Some(cached);
        }

        let outcome = self
            .resilience
            .execute_with_resilience(
                KNOWLEDGE_API,
                || self.source.knowledge_core(),
                self.resilience.call_options(),
            )
            .await;

        if outcome.success {
            let core = outcome.data?;
            self.cache.set(KNOWLEDGE_API, &params, &core).await;
            Some(core)
        } else {
            None
        }
    }
}

fn match_insights(core: &KnowledgeCore, ctx: &ExecutionContext) -> DoctrineInsights {
    let kinds: HashSet<&str> = ctx.lots.iter().map(|lot| lot.kind()).collect();

    let matched_norms: Vec<_> = core
        .normative_rules
        .iter()
        .filter(|norm| norm.related_lots.iter().any(|lot| kinds.contains(lot.as_str())))
        .cloned()
        .collect();

    let pricing_references: Vec<_> = core
        .pricing_references
        .iter()
        .filter(|reference| {
            kinds.contains(reference.lot_type.as_str())
                && reference
                    .region
                    .as_deref()
                    .is_none_or(|region| Some(region) == ctx.region.as_deref())
        })
        .cloned()
        .collect();

    let jurisprudence_notes: Vec<_> = core
        .jurisprudence
        .iter()
        .filter(|note| {
            note.is_general()
                || note
                    .relevant_lots
                    .iter()
                    .any(|lot| kinds.contains(lot.as_str()))
        })
        .cloned()
        .collect();

    let knowledge_confidence_score = confidence(
        matched_norms.len(),
        pricing_references.len(),
        jurisprudence_notes.len(),
    );

    DoctrineInsights {
        matched_norms,
        pricing_references,
        jurisprudence_notes,
        knowledge_confidence_score,
    }
}

/// Tiered confidence: norms up to 40, pricing up to 35, jurisprudence up
/// to 25, capped at 100.
fn confidence(norms: usize, pricing: usize, jurisprudence: usize) -> f64 {
    let tier = |count: usize, full: f64, per_match: f64| {
        if count >= 3 {
            full
        } else {
            #[allow(clippy::cast_precision_loss)]
            let partial = per_match * count as f64;
            partial
        }
    };

    (tier(norms, 40.0, 13.0) + tier(pricing, 35.0, 12.0) + tier(jurisprudence, 25.0, 8.0))
        .min(100.0)
}
