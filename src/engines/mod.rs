//! Scoring engines and the pipeline that orchestrates them.

pub mod doctrine_engine;
pub mod global_scoring;
pub mod pipeline;
pub mod pricing_engine;
pub mod quality_engine;
pub mod rule_engine;

pub use doctrine_engine::{DoctrineActivationEngine, DoctrineEvaluation};
pub use global_scoring::{GlobalScore, GlobalScoringEngine, Grade};
pub use pipeline::{DegradedStage, ScoringPipeline, ScoringReport};
pub use pricing_engine::{PricingEngine, PricingEvaluation};
pub use quality_engine::{QualityEngine, QualityEvaluation};
pub use rule_engine::{RuleEngine, RuleEvaluation};
