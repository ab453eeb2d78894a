//! Knowledge core records used for advisory doctrine enrichment.

use serde::{Deserialize, Serialize};

/// A normative rule (norme, DTU, réglementation) in the knowledge core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NormativeRule {
    pub id: String,
    pub title: String,
    /// Lot kinds this norm applies to.
    pub related_lots: Vec<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// A market price reference for a lot kind, optionally region-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingReference {
    pub id: String,
    pub lot_type: String,
    /// Region the reference applies to; `None` means nationwide.
    #[serde(default)]
    pub region: Option<String>,
    pub price_range_low: f64,
    pub price_range_high: f64,
    pub unit: String,
}

/// A precedent note drawn from case law or dispute history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JurisprudenceNote {
    pub id: String,
    pub summary: String,
    /// Lot kinds the note is relevant to; empty/absent means general.
    #[serde(default)]
    pub relevant_lots: Vec<String>,
}

impl JurisprudenceNote {
    /// Notes without lot restrictions apply to every quote.
    pub fn is_general(&self) -> bool {
        self.relevant_lots.is_empty()
    }
}

/// The full knowledge core snapshot the doctrine engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KnowledgeCore {
    #[serde(default)]
    pub normative_rules: Vec<NormativeRule>,
    #[serde(default)]
    pub pricing_references: Vec<PricingReference>,
    #[serde(default)]
    pub jurisprudence: Vec<JurisprudenceNote>,
}

/// Advisory enrichment written by the doctrine engine.
///
/// Read-only for every other engine; never feeds into pillar scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DoctrineInsights {
    pub matched_norms: Vec<NormativeRule>,
    pub pricing_references: Vec<PricingReference>,
    pub jurisprudence_notes: Vec<JurisprudenceNote>,
    /// Confidence 0-100 in the doctrine coverage of this quote.
    pub knowledge_confidence_score: f64,
}
