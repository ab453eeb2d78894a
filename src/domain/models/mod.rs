pub mod config;
pub mod context;
pub mod knowledge;
pub mod quote;
pub mod rule;

pub use config::{
    CacheConfig, LoggingConfig, PillarWeights, PricingThresholds, QualityThresholds,
    ResilienceConfig, ScoreConfig, ScoringConfig,
};
pub use context::{
    EngineMeta, EngineOutcome, ExecutionContext, PricingBreakdown, PricingNamespace,
    QualityBreakdown, QualityNamespace, RulesNamespace, SeverityBreakdown, TypeBreakdown,
};
pub use knowledge::{
    DoctrineInsights, JurisprudenceNote, KnowledgeCore, NormativeRule, PricingReference,
};
pub use quote::{LineItem, Materials, NormalizedLot, QuoteData};
pub use rule::{Rule, RuleType, Severity};
