//! End-to-end scoring runs through the public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use devis_score::domain::models::ScoreConfig;
use devis_score::domain::models::quote::{LineItem, Materials, QuoteData};
use devis_score::{
    ExecutionContext, Grade, NormalizedLot, Rule, RuleRegistry, ScoreError, ScoreResult,
    ScoringPipeline,
};

fn documented_quote() -> QuoteData {
    QuoteData {
        total_amount: Some(5_000.0),
        price_ht: Some(1_000.0),
        price_ttc: Some(1_200.0),
        line_items: (0..6).map(|_| LineItem::default()).collect(),
        description: Some(
            "Rénovation électrique complète du logement avec remplacement du tableau, \
             mise à la terre de toutes les masses et pose de prises conformes. \
             Travaux exécutés selon la norme en vigueur, en pleine conformité avec la \
             réglementation et les obligations du code de la construction."
                .to_string(),
        ),
        materials: Some(Materials::List(vec![
            "tableau électrique".into(),
            "câble cuivre 2.5mm".into(),
        ])),
        legal_mentions: vec!["Garantie décennale".into(), "Assurance RC Pro".into()],
    }
}

#[tokio::test]
async fn electricite_and_toiture_produce_six_obligations() {
    let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
    let ctx = ExecutionContext::new(
        vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("toiture"),
        ],
        documented_quote(),
    );

    let report = pipeline.run(ctx).await;

    let rules = report.context.rules.as_ref().unwrap();
    assert_eq!(rules.obligations.len(), 6);
    assert!((rules.total_weight - 14.5).abs() < f64::EPSILON);
    assert_eq!(rules.severity_breakdown.total(), 6);
    assert_eq!(rules.type_breakdown.total(), 6);
}

#[tokio::test]
async fn coherent_quote_maxes_the_pricing_pillar() {
    let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
    // Five lots so the per-lot average lands at 1000.
    let ctx = ExecutionContext::new(
        vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("toiture"),
            NormalizedLot::new("plomberie"),
            NormalizedLot::new("isolation"),
            NormalizedLot::new("chauffage"),
        ],
        documented_quote(),
    );

    let report = pipeline.run(ctx).await;

    let pricing = report.context.pricing.as_ref().unwrap();
    // 15 obligations at 5000 total: ratio ~333 in band, VAT 20%, avg
    // 1000/lot, 6 line items.
    assert!((pricing.normalized_score - 20.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn external_pillar_scores_reproduce_reference_aggregation() {
    let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
    let ctx = ExecutionContext::new(vec![], QuoteData::default())
        .with_audit_score(80.0)
        .with_enterprise_score(60.0);

    let report = pipeline.run(ctx).await;

    // compliance 80, enterprise 60, pricing 9 (all-neutral), quality 0:
    // 28 + 15 + 1.8 + 0 = 44.8 => D.
    assert!((report.global.weighted_score - 44.8).abs() < f64::EPSILON);
    assert_eq!(report.global.grade, Grade::D);
}

#[tokio::test]
async fn doctrine_enrichment_is_region_aware() {
    let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
    let ctx = ExecutionContext::new(
        vec![NormalizedLot::new("electricite")],
        documented_quote(),
    )
    .with_region("ile-de-france");

    let report = pipeline.run(ctx).await;

    let doctrine = report.context.doctrine.as_ref().unwrap();
    assert!(doctrine
        .pricing_references
        .iter()
        .any(|r| r.region.as_deref() == Some("ile-de-france")));
    assert!(doctrine.knowledge_confidence_score > 0.0);
}

/// Registry that fails a fixed number of times before recovering.
struct RecoveringRegistry {
    failures_left: AtomicU32,
}

#[async_trait]
impl RuleRegistry for RecoveringRegistry {
    async fn get_rules_by_category(&self, category: &str) -> ScoreResult<Vec<Rule>> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ScoreError::RegistryUnavailable("connection refused".into()));
        }
        let _ = category;
        Ok(vec![])
    }
}

#[tokio::test(start_paused = true)]
async fn transient_registry_failures_are_retried_within_one_run() {
    let pipeline = ScoringPipeline::new(
        &ScoreConfig::default(),
        Arc::new(RecoveringRegistry {
            failures_left: AtomicU32::new(2),
        }),
        None,
    );
    let ctx = ExecutionContext::new(vec![NormalizedLot::new("electricite")], QuoteData::default());

    let report = pipeline.run(ctx).await;

    // Two failures are absorbed by the retry budget of three.
    assert!(!report.is_degraded());
    assert_eq!(report.context.rules.as_ref().unwrap().obligation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn persistent_registry_outage_degrades_but_still_grades() {
    let pipeline = ScoringPipeline::new(
        &ScoreConfig::default(),
        Arc::new(RecoveringRegistry {
            failures_left: AtomicU32::new(u32::MAX),
        }),
        None,
    );
    let ctx = ExecutionContext::new(
        vec![NormalizedLot::new("electricite")],
        documented_quote(),
    );

    let report = pipeline.run(ctx).await;

    assert!(report.is_degraded());
    assert_eq!(report.degraded_stages[0].stage, "rules");
    // Best-effort score from neutral compliance plus pricing/quality.
    assert!(report.global.weighted_score > 0.0);
}

#[tokio::test]
async fn cache_survives_across_runs_of_one_pipeline() {
    let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());

    let first = ExecutionContext::new(vec![NormalizedLot::new("toiture")], QuoteData::default());
    let second = ExecutionContext::new(vec![NormalizedLot::new("toiture")], QuoteData::default());

    pipeline.run(first).await;
    pipeline.run(second).await;

    let stats = pipeline.cache().stats().await;
    assert!(stats.hits >= 1);
    pipeline.shutdown().await;
}
