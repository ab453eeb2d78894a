//! Ports to external data providers.
//!
//! The concrete providers (remote registries, enterprise lookups) live
//! outside this core; in-process static implementations are provided in
//! `infrastructure::registry` for tests and offline operation.

use async_trait::async_trait;

use super::errors::ScoreResult;
use super::models::knowledge::KnowledgeCore;
use super::models::rule::Rule;

/// Rule registry keyed by lot category.
#[async_trait]
pub trait RuleRegistry: Send + Sync {
    /// Rules applicable to a lot category. An unknown category returns an
    /// empty list, not an error.
    async fn get_rules_by_category(&self, category: &str) -> ScoreResult<Vec<Rule>>;
}

/// Source of the doctrine knowledge core.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// The current knowledge core snapshot.
    async fn knowledge_core(&self) -> ScoreResult<KnowledgeCore>;
}
