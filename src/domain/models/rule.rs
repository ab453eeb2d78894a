//! Rules and obligations inferred from lot categories.

use serde::{Deserialize, Serialize};

/// Regulatory nature of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Legal,
    Regulatory,
    Advisory,
    Commercial,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::Regulatory => "regulatory",
            Self::Advisory => "advisory",
            Self::Commercial => "commercial",
        }
    }
}

/// Severity attached to an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// A rule returned by the registry for a lot category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Rule {
    /// Stable registry identifier, e.g. `ELEC-001`.
    pub id: String,
    /// Lot category the rule applies to.
    pub category: String,
    /// Obligation text shown to the user.
    pub obligation: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    /// Relative weight used for total-weight accumulation.
    pub weight: f64,
    /// Normative source reference (NF, DTU, article de loi).
    #[serde(default)]
    pub source: Option<String>,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        obligation: impl Into<String>,
        rule_type: RuleType,
        severity: Severity,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            obligation: obligation.into(),
            rule_type,
            severity,
            weight,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn rule_serde_round_trip() {
        let rule = Rule::new(
            "ELEC-001",
            "electricite",
            "Conformité NF C 15-100 obligatoire",
            RuleType::Regulatory,
            Severity::Critical,
            3.0,
        )
        .with_source("NF C 15-100");

        let json = serde_json::to_string(&rule).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "ELEC-001");
        assert_eq!(back.severity, Severity::Critical);
        assert_eq!(back.source.as_deref(), Some("NF C 15-100"));
    }
}
