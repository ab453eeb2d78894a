//! Scoring pipeline: stage ordering and context merging.
//!
//! Each stage takes an immutable context snapshot and returns a partial
//! result; the pipeline merges the result into the next snapshot. The rule
//! engine runs first because pricing and quality key their heuristics on
//! the obligation count; pricing, quality, and doctrine then run
//! concurrently since they write disjoint namespaces; global scoring reads
//! everything last.

use std::sync::Arc;

use futures::future::OptionFuture;
use tracing::info;

use crate::domain::models::config::ScoreConfig;
use crate::domain::models::context::ExecutionContext;
use crate::domain::ports::{KnowledgeSource, RuleRegistry};
use crate::engines::doctrine_engine::DoctrineActivationEngine;
use crate::engines::global_scoring::{GlobalScore, GlobalScoringEngine};
use crate::engines::pricing_engine::PricingEngine;
use crate::engines::quality_engine::QualityEngine;
use crate::engines::rule_engine::RuleEngine;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::registry::{StaticKnowledgeCore, StaticRuleRegistry};
use crate::infrastructure::resilience::ResilienceService;

/// A stage that could not complete cleanly during a run.
#[derive(Debug, Clone)]
pub struct DegradedStage {
    pub stage: &'static str,
    pub reason: String,
}

/// Result of one full scoring run.
#[derive(Debug, Clone)]
pub struct ScoringReport {
    /// Final context with every namespace the run produced.
    pub context: ExecutionContext,
    pub global: GlobalScore,
    /// Stages that degraded, empty for a clean run.
    pub degraded_stages: Vec<DegradedStage>,
}

impl ScoringReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_stages.is_empty()
    }
}

/// Orchestrates one scoring run per quote.
///
/// The resilience service and cache are shared across runs; engines are
/// stateless between runs.
pub struct ScoringPipeline {
    rule_engine: RuleEngine,
    pricing_engine: PricingEngine,
    quality_engine: QualityEngine,
    doctrine_engine: Option<DoctrineActivationEngine>,
    global_engine: GlobalScoringEngine,
    resilience: Arc<ResilienceService>,
    cache: Arc<TtlCache>,
}

impl ScoringPipeline {
    /// Pipeline over explicit providers. Pass `None` for the knowledge
    /// source to skip doctrine enrichment entirely.
    pub fn new(
        config: &ScoreConfig,
        registry: Arc<dyn RuleRegistry>,
        knowledge: Option<Arc<dyn KnowledgeSource>>,
    ) -> Self {
        let resilience = Arc::new(ResilienceService::new(config.resilience.clone()));
        let cache = Arc::new(TtlCache::new(config.cache.clone()));

        Self {
            rule_engine: RuleEngine::new(registry, Arc::clone(&resilience), Arc::clone(&cache)),
            pricing_engine: PricingEngine::new(config.scoring.pricing.clone()),
            quality_engine: QualityEngine::new(config.scoring.quality.clone()),
            doctrine_engine: knowledge.map(|source| {
                DoctrineActivationEngine::new(source, Arc::clone(&resilience), Arc::clone(&cache))
            }),
            global_engine: GlobalScoringEngine::new(
                config.scoring.weights,
                config.scoring.rescale_pillars,
            ),
            resilience,
            cache,
        }
    }

    /// Pipeline over the built-in static registry and knowledge core.
    pub fn with_builtin_providers(config: &ScoreConfig) -> Self {
        Self::new(
            config,
            Arc::new(StaticRuleRegistry::with_builtin_rules()),
            Some(Arc::new(StaticKnowledgeCore::with_builtin_knowledge())),
        )
    }

    /// Run the full pipeline on an initial context. Never fails: degraded
    /// stages are recorded in the report and the global score is computed
    /// best-effort from whatever the context holds.
    pub async fn run(&self, mut ctx: ExecutionContext) -> ScoringReport {
        let run_id = ctx.run_id;
        info!(%run_id, lots = ctx.lots.len(), "scoring run started");
        let mut degraded_stages = Vec::new();

        let rules_outcome = self.rule_engine.evaluate(&ctx.lots).await;
        if let Some(reason) = rules_outcome.reason() {
            degraded_stages.push(DegradedStage {
                stage: "rules",
                reason: reason.to_string(),
            });
        }
        ctx.rules = Some(rules_outcome.into_value().rules);

        // Disjoint namespaces, one immutable snapshot.
        let doctrine_future: OptionFuture<_> = self
            .doctrine_engine
            .as_ref()
            .map(|engine| engine.evaluate(&ctx))
            .into();
        let (pricing_outcome, quality_outcome, doctrine_outcome) = tokio::join!(
            async { self.pricing_engine.evaluate(&ctx) },
            async { self.quality_engine.evaluate(&ctx) },
            doctrine_future,
        );

        if let Some(reason) = pricing_outcome.reason() {
            degraded_stages.push(DegradedStage {
                stage: "pricing",
                reason: reason.to_string(),
            });
        }
        ctx.pricing = Some(pricing_outcome.into_value().pricing);

        if let Some(reason) = quality_outcome.reason() {
            degraded_stages.push(DegradedStage {
                stage: "quality",
                reason: reason.to_string(),
            });
        }
        ctx.quality = Some(quality_outcome.into_value().quality);

        if let Some(outcome) = doctrine_outcome {
            if let Some(reason) = outcome.reason() {
                degraded_stages.push(DegradedStage {
                    stage: "doctrine",
                    reason: reason.to_string(),
                });
            }
            ctx.doctrine = Some(outcome.into_value().doctrine);
        }

        let global_outcome = self.global_engine.evaluate(&ctx);
        if let Some(reason) = global_outcome.reason() {
            degraded_stages.push(DegradedStage {
                stage: "global",
                reason: reason.to_string(),
            });
        }
        let global = global_outcome.into_value();

        info!(
            %run_id,
            weighted_score = global.weighted_score,
            grade = %global.grade,
            degraded = degraded_stages.len(),
            "scoring run completed"
        );

        ScoringReport {
            context: ctx,
            global,
            degraded_stages,
        }
    }

    /// Shared resilience service, for health reporting and manual resets.
    pub fn resilience(&self) -> &Arc<ResilienceService> {
        &self.resilience
    }

    /// Shared cache, for stats and invalidation.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// Stop background cache-refresh tasks. Call on service shutdown.
    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::errors::{ScoreError, ScoreResult};
    use crate::domain::models::knowledge::KnowledgeCore;
    use crate::domain::models::quote::{LineItem, NormalizedLot, QuoteData};
    use crate::engines::global_scoring::Grade;

    struct FailingKnowledge;

    #[async_trait]
    impl KnowledgeSource for FailingKnowledge {
        async fn knowledge_core(&self) -> ScoreResult<KnowledgeCore> {
            Err(ScoreError::KnowledgeUnavailable("503".into()))
        }
    }

    fn solid_quote() -> QuoteData {
        QuoteData {
            total_amount: Some(5_000.0),
            price_ht: Some(1_000.0),
            price_ttc: Some(1_200.0),
            line_items: (0..6).map(|_| LineItem::default()).collect(),
            description: Some(
                "Rénovation complète selon la norme en vigueur, conformité garantie"
                    .to_string(),
            ),
            legal_mentions: vec!["Garantie décennale".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn clean_run_fills_every_namespace() {
        let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
        let ctx = ExecutionContext::new(
            vec![
                NormalizedLot::new("electricite"),
                NormalizedLot::new("toiture"),
            ],
            solid_quote(),
        );

        let report = pipeline.run(ctx).await;

        assert!(!report.is_degraded());
        let ctx = &report.context;
        assert!(ctx.rules.is_some());
        assert!(ctx.pricing.is_some());
        assert!(ctx.quality.is_some());
        assert!(ctx.doctrine.is_some());
        assert_eq!(ctx.obligation_count(), 6);
        assert!(report.global.weighted_score > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn knowledge_outage_degrades_doctrine_only() {
        let pipeline = ScoringPipeline::new(
            &ScoreConfig::default(),
            Arc::new(StaticRuleRegistry::with_builtin_rules()),
            Some(Arc::new(FailingKnowledge)),
        );
        let ctx = ExecutionContext::new(vec![NormalizedLot::new("electricite")], solid_quote());

        let report = pipeline.run(ctx).await;

        assert!(report.is_degraded());
        assert_eq!(report.degraded_stages.len(), 1);
        assert_eq!(report.degraded_stages[0].stage, "doctrine");
        // Doctrine is advisory: the score is still computed.
        assert!(report.context.doctrine.is_some());
        assert!(report.global.weighted_score > 0.0);
    }

    #[tokio::test]
    async fn pipeline_without_knowledge_source_skips_doctrine() {
        let pipeline = ScoringPipeline::new(
            &ScoreConfig::default(),
            Arc::new(StaticRuleRegistry::with_builtin_rules()),
            None,
        );
        let ctx = ExecutionContext::new(vec![NormalizedLot::new("peinture")], solid_quote());

        let report = pipeline.run(ctx).await;

        assert!(!report.is_degraded());
        assert!(report.context.doctrine.is_none());
    }

    #[tokio::test]
    async fn empty_context_still_produces_a_grade() {
        let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
        let ctx = ExecutionContext::new(vec![], QuoteData::default());

        let report = pipeline.run(ctx).await;

        // Neutral compliance and enterprise plus the pricing allowance.
        assert!(report.global.weighted_score > 0.0);
        assert_eq!(report.global.grade, Grade::E);
    }

    #[tokio::test]
    async fn external_scores_flow_into_aggregation() {
        let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
        let ctx = ExecutionContext::new(vec![NormalizedLot::new("electricite")], solid_quote())
            .with_audit_score(80.0)
            .with_enterprise_score(60.0);

        let report = pipeline.run(ctx).await;

        // compliance 80 * .35 = 28, enterprise 60 * .25 = 15.
        assert!((report.global.compliance_weighted - 28.0).abs() < 1e-9);
        assert!((report.global.enterprise_weighted - 15.0).abs() < 1e-9);
    }
}
