//! Infrastructure layer: resilience, caching, configuration, logging, and
//! the built-in static providers.

pub mod cache;
pub mod config;
pub mod logging;
pub mod registry;
pub mod resilience;

pub use cache::{CacheEntry, CacheStats, TtlCache};
pub use config::ConfigLoader;
pub use logging::init_logging;
pub use registry::{StaticKnowledgeCore, StaticRuleRegistry};
pub use resilience::{
    BreakerState, BreakerStats, CallOptions, CircuitState, ResilienceOutcome, ResilienceService,
};
