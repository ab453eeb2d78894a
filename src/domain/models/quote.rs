//! Quote input data as produced by upstream extraction.
//!
//! Everything in this module is read-only to the scoring core. Fields are
//! optional wherever extraction can fail to populate them; engines fall back
//! to neutral sub-scores instead of rejecting the quote.

use serde::{Deserialize, Serialize};

/// A normalized work category (lot) declared in the quote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NormalizedLot {
    /// Registry lookup key, e.g. `electricite`, `toiture`.
    pub category: String,

    /// Finer-grained lot type when extraction distinguishes one.
    #[serde(default)]
    pub lot_type: Option<String>,

    /// Human label as it appeared in the document.
    #[serde(default)]
    pub label: Option<String>,
}

impl NormalizedLot {
    /// Create a lot from its category alone.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            lot_type: None,
            label: None,
        }
    }

    /// The lot kind used for doctrine matching: the explicit type when
    /// present, otherwise the category.
    pub fn kind(&self) -> &str {
        self.lot_type.as_deref().unwrap_or(&self.category)
    }
}

/// A single priced line extracted from the quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

/// Materials information, either a structured list or raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Materials {
    List(Vec<String>),
    Text(String),
}

/// Structured representation of an extracted quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QuoteData {
    /// Total quoted amount (currency units, tax handling unspecified).
    #[serde(default)]
    pub total_amount: Option<f64>,

    /// Price excluding VAT.
    #[serde(default)]
    pub price_ht: Option<f64>,

    /// Price including VAT.
    #[serde(default)]
    pub price_ttc: Option<f64>,

    /// Extracted line items.
    #[serde(default)]
    pub line_items: Vec<LineItem>,

    /// Free-text description of the works.
    #[serde(default)]
    pub description: Option<String>,

    /// Materials list or free text.
    #[serde(default)]
    pub materials: Option<Materials>,

    /// Explicit legal-mention entries found in the document.
    #[serde(default)]
    pub legal_mentions: Vec<String>,
}

impl QuoteData {
    /// Word count of the free-text description, 0 when absent.
    pub fn description_word_count(&self) -> usize {
        self.description
            .as_deref()
            .map(|d| d.split_whitespace().count())
            .unwrap_or(0)
    }
}
