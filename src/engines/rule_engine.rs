//! Rule engine: maps normalized lots to weighted obligations.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use crate::domain::models::context::{EngineMeta, EngineOutcome, RulesNamespace};
use crate::domain::models::quote::NormalizedLot;
use crate::domain::models::rule::{Rule, RuleType, Severity};
use crate::domain::ports::RuleRegistry;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::resilience::ResilienceService;

const ENGINE_VERSION: &str = "1.0.0";

/// Cache source / breaker name for registry lookups.
const REGISTRY_API: &str = "rule_registry";

/// Output of one rule-engine run.
#[derive(Debug, Clone)]
pub struct RuleEvaluation {
    pub rules: RulesNamespace,
    pub meta: EngineMeta,
}

/// Maps each lot's category to its registry rules and accumulates the
/// obligation namespace.
///
/// Never fails: a lookup failure for one lot is skipped and processing
/// continues; total failure yields an all-zero namespace with a degraded
/// outcome.
pub struct RuleEngine {
    registry: Arc<dyn RuleRegistry>,
    resilience: Arc<ResilienceService>,
    cache: Arc<TtlCache>,
}

impl RuleEngine {
    pub fn new(
        registry: Arc<dyn RuleRegistry>,
        resilience: Arc<ResilienceService>,
        cache: Arc<TtlCache>,
    ) -> Self {
        Self {
            registry,
            resilience,
            cache,
        }
    }

    /// Evaluate all lots. Obligation order is lot order x registry order,
    /// duplicates allowed.
    pub async fn evaluate(&self, lots: &[NormalizedLot]) -> EngineOutcome<RuleEvaluation> {
        let started = Instant::now();
        let mut namespace = RulesNamespace::default();
        let mut seen_texts: Vec<String> = Vec::new();
        let mut seen_ids: Vec<String> = Vec::new();
        let mut failed_lots = 0_usize;

        for lot in lots {
            match self.lookup_rules(&lot.category).await {
                Some(rules) => {
                    if !rules.is_empty() {
                        *namespace
                            .category_summary
                            .entry(lot.category.clone())
                            .or_insert(0) += 1;
                    }
                    for rule in rules {
                        accumulate(&mut namespace, &mut seen_texts, &mut seen_ids, rule);
                    }
                }
                None => {
                    warn!(category = %lot.category, "registry lookup failed, skipping lot");
                    failed_lots += 1;
                }
            }
        }

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let evaluation = RuleEvaluation {
            rules: namespace,
            meta: EngineMeta::new(ENGINE_VERSION, elapsed),
        };

        debug!(
            obligations = evaluation.rules.obligation_count(),
            failed_lots, "rule engine completed"
        );

        if failed_lots > 0 {
            EngineOutcome::degraded(
                evaluation,
                format!("{failed_lots} of {} lot lookups failed", lots.len()),
            )
        } else {
            EngineOutcome::Ok(evaluation)
        }
    }

    /// Registry lookup through cache and resilience. `None` means the
    /// lookup failed after retries (distinct from an empty rule list).
    async fn lookup_rules(&self, category: &str) -> Option<Vec<Rule>> {
        let params = json!({ "category": category });

        if let Some(cached) = self.cache.get::<Vec<Rule>, _>(REGISTRY_API, &params).await {
            return Some(cached);
        }

        let outcome = self
            .resilience
            .execute_with_resilience(
                REGISTRY_API,
                || self.registry.get_rules_by_category(category),
                self.resilience.call_options(),
            )
            .await;

        if outcome.success {
            let rules = outcome.data?;
            self.cache.set(REGISTRY_API, &params, &rules).await;
            Some(rules)
        } else {
            // A fallback from the resilience layer would land here too, but
            // registry calls carry none: stale rules are worse than none.
            None
        }
    }
}

fn accumulate(
    namespace: &mut RulesNamespace,
    seen_texts: &mut Vec<String>,
    seen_ids: &mut Vec<String>,
    rule: Rule,
) {
    namespace.obligations.push(rule.obligation.clone());
    if !seen_texts.contains(&rule.obligation) {
        seen_texts.push(rule.obligation.clone());
        namespace.unique_obligations.push(rule.obligation.clone());
    }

    if !seen_ids.contains(&rule.id) {
        seen_ids.push(rule.id.clone());
        namespace.unique_detailed_obligations.push(rule.clone());
    }

    namespace.total_weight += rule.weight;

    match rule.severity {
        Severity::Critical => namespace.severity_breakdown.critical += 1,
        Severity::High => namespace.severity_breakdown.high += 1,
        Severity::Medium => namespace.severity_breakdown.medium += 1,
        Severity::Low => namespace.severity_breakdown.low += 1,
    }

    match rule.rule_type {
        RuleType::Legal => namespace.type_breakdown.legal += 1,
        RuleType::Regulatory => namespace.type_breakdown.regulatory += 1,
        RuleType::Advisory => namespace.type_breakdown.advisory += 1,
        RuleType::Commercial => namespace.type_breakdown.commercial += 1,
    }

    namespace.detailed_obligations.push(rule);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::domain::errors::{ScoreError, ScoreResult};
    use crate::infrastructure::registry::StaticRuleRegistry;

    fn engine_with(registry: Arc<dyn RuleRegistry>) -> RuleEngine {
        RuleEngine::new(
            registry,
            Arc::new(ResilienceService::with_defaults()),
            Arc::new(TtlCache::with_defaults()),
        )
    }

    /// Registry that fails for selected categories.
    struct FlakyRegistry {
        inner: StaticRuleRegistry,
        failing_category: Option<String>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RuleRegistry for FlakyRegistry {
        async fn get_rules_by_category(&self, category: &str) -> ScoreResult<Vec<Rule>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_category.as_deref() == Some(category) {
                return Err(ScoreError::RegistryUnavailable("503".into()));
            }
            self.inner.get_rules_by_category(category).await
        }
    }

    #[tokio::test]
    async fn two_lots_accumulate_six_obligations() {
        let engine = engine_with(Arc::new(StaticRuleRegistry::with_builtin_rules()));
        let lots = vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("toiture"),
        ];

        let outcome = engine.evaluate(&lots).await;
        assert!(!outcome.is_degraded());
        let rules = &outcome.value().rules;

        assert_eq!(rules.obligation_count(), 6);
        assert_eq!(rules.unique_obligations.len(), 6);
        assert_eq!(rules.unique_detailed_obligations.len(), 6);
        // 3 electricite weights (3.0 + 2.5 + 2.0) + 3 toiture (2.5 + 3.0 + 1.5)
        assert!((rules.total_weight - 14.5).abs() < f64::EPSILON);
        assert_eq!(rules.category_summary.get("electricite"), Some(&1));
        assert_eq!(rules.category_summary.get("toiture"), Some(&1));
    }

    #[tokio::test]
    async fn duplicate_lots_keep_duplicates_in_obligations_only() {
        let engine = engine_with(Arc::new(StaticRuleRegistry::with_builtin_rules()));
        let lots = vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("electricite"),
        ];

        let outcome = engine.evaluate(&lots).await;
        let rules = &outcome.value().rules;

        assert_eq!(rules.obligations.len(), 6);
        assert_eq!(rules.unique_obligations.len(), 3);
        assert_eq!(rules.detailed_obligations.len(), 6);
        assert_eq!(rules.unique_detailed_obligations.len(), 3);
        assert_eq!(rules.category_summary.get("electricite"), Some(&2));
    }

    #[tokio::test]
    async fn breakdown_totals_equal_obligation_count() {
        let engine = engine_with(Arc::new(StaticRuleRegistry::with_builtin_rules()));
        let lots = vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("plomberie"),
            NormalizedLot::new("isolation"),
        ];

        let outcome = engine.evaluate(&lots).await;
        let rules = &outcome.value().rules;
        let count = u32::try_from(rules.obligation_count()).unwrap();

        assert_eq!(rules.severity_breakdown.total(), count);
        assert_eq!(rules.type_breakdown.total(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_lot_is_skipped() {
        let registry = Arc::new(FlakyRegistry {
            inner: StaticRuleRegistry::with_builtin_rules(),
            failing_category: Some("toiture".into()),
            calls: AtomicU32::new(0),
        });
        let engine = RuleEngine::new(
            Arc::clone(&registry) as Arc<dyn RuleRegistry>,
            Arc::new(ResilienceService::with_defaults()),
            Arc::new(TtlCache::with_defaults()),
        );
        let lots = vec![
            NormalizedLot::new("electricite"),
            NormalizedLot::new("toiture"),
        ];

        let outcome = engine.evaluate(&lots).await;
        assert!(outcome.is_degraded());
        let rules = &outcome.value().rules;
        assert_eq!(rules.obligation_count(), 3);
        assert!(rules.category_summary.get("toiture").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_yields_all_zero_result() {
        let registry = Arc::new(FlakyRegistry {
            inner: StaticRuleRegistry::empty(),
            failing_category: Some("electricite".into()),
            calls: AtomicU32::new(0),
        });
        let engine = engine_with(registry);
        let lots = vec![NormalizedLot::new("electricite")];

        let outcome = engine.evaluate(&lots).await;
        assert!(outcome.is_degraded());
        let rules = &outcome.value().rules;
        assert_eq!(rules.obligation_count(), 0);
        assert_eq!(rules.severity_breakdown.total(), 0);
        assert!((rules.total_weight).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_lots_is_clean_zero() {
        let engine = engine_with(Arc::new(StaticRuleRegistry::with_builtin_rules()));
        let outcome = engine.evaluate(&[]).await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value().rules.obligation_count(), 0);
    }

    #[tokio::test]
    async fn second_evaluation_hits_cache() {
        let registry = Arc::new(FlakyRegistry {
            inner: StaticRuleRegistry::with_builtin_rules(),
            failing_category: None,
            calls: AtomicU32::new(0),
        });
        let cache = Arc::new(TtlCache::with_defaults());
        let engine = RuleEngine::new(
            Arc::clone(&registry) as Arc<dyn RuleRegistry>,
            Arc::new(ResilienceService::with_defaults()),
            Arc::clone(&cache),
        );
        let lots = vec![NormalizedLot::new("electricite")];

        engine.evaluate(&lots).await;
        engine.evaluate(&lots).await;

        // One registry call; the second run is served from cache.
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.hits, 1);
    }
}
