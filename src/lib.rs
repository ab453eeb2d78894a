//! Devis Score - Construction Quote Scoring Core
//!
//! Scores French construction quotes (devis) along four pillars: regulatory
//! compliance, enterprise reputation, pricing coherence, and documentation
//! quality, aggregated into a 0-100 weighted score with a letter grade.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors, and provider ports
//! - **Engine Layer** (`engines`): the scoring engines and the pipeline
//!   that orchestrates them
//! - **Infrastructure Layer** (`infrastructure`): resilience, caching,
//!   configuration, logging, and built-in static providers
//!
//! # Example
//!
//! ```ignore
//! use devis_score::{ExecutionContext, NormalizedLot, QuoteData, ScoringPipeline};
//! use devis_score::domain::models::ScoreConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ScoringPipeline::with_builtin_providers(&ScoreConfig::default());
//!     let ctx = ExecutionContext::new(
//!         vec![NormalizedLot::new("electricite")],
//!         QuoteData::default(),
//!     );
//!     let report = pipeline.run(ctx).await;
//!     println!("{} ({})", report.global.weighted_score, report.global.grade);
//! }
//! ```

pub mod domain;
pub mod engines;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::errors::{ScoreError, ScoreResult};
pub use domain::models::{
    DoctrineInsights, EngineOutcome, ExecutionContext, KnowledgeCore, NormalizedLot, QuoteData,
    Rule, RuleType, ScoreConfig, Severity,
};
pub use domain::ports::{KnowledgeSource, RuleRegistry};
pub use engines::{
    DoctrineActivationEngine, GlobalScore, GlobalScoringEngine, Grade, PricingEngine,
    QualityEngine, RuleEngine, ScoringPipeline, ScoringReport,
};
pub use infrastructure::{ConfigLoader, ResilienceService, TtlCache};
