//! Built-in static providers for the rule registry and knowledge core.
//!
//! These back the ports with in-memory tables covering the common French
//! construction lot categories, so the pipeline works offline and tests have
//! a deterministic registry. Remote providers can replace them behind the
//! same traits.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::errors::ScoreResult;
use crate::domain::models::knowledge::{
    JurisprudenceNote, KnowledgeCore, NormativeRule, PricingReference,
};
use crate::domain::models::rule::{Rule, RuleType, Severity};
use crate::domain::ports::{KnowledgeSource, RuleRegistry};

/// In-memory rule registry keyed by lot category.
pub struct StaticRuleRegistry {
    rules_by_category: HashMap<String, Vec<Rule>>,
}

impl StaticRuleRegistry {
    /// Registry preloaded with the standard French construction rule table.
    pub fn with_builtin_rules() -> Self {
        let mut rules_by_category: HashMap<String, Vec<Rule>> = HashMap::new();
        for rule in builtin_rules() {
            rules_by_category
                .entry(rule.category.clone())
                .or_default()
                .push(rule);
        }
        Self { rules_by_category }
    }

    /// Empty registry, for tests that install their own rules.
    pub fn empty() -> Self {
        Self {
            rules_by_category: HashMap::new(),
        }
    }

    /// Add a rule to the registry.
    pub fn insert(&mut self, rule: Rule) {
        self.rules_by_category
            .entry(rule.category.clone())
            .or_default()
            .push(rule);
    }

    pub fn category_count(&self) -> usize {
        self.rules_by_category.len()
    }
}

impl Default for StaticRuleRegistry {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

#[async_trait]
impl RuleRegistry for StaticRuleRegistry {
    async fn get_rules_by_category(&self, category: &str) -> ScoreResult<Vec<Rule>> {
        Ok(self
            .rules_by_category
            .get(category)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory knowledge core.
pub struct StaticKnowledgeCore {
    core: KnowledgeCore,
}

impl StaticKnowledgeCore {
    pub fn with_builtin_knowledge() -> Self {
        Self {
            core: builtin_knowledge(),
        }
    }

    pub fn new(core: KnowledgeCore) -> Self {
        Self { core }
    }
}

impl Default for StaticKnowledgeCore {
    fn default() -> Self {
        Self::with_builtin_knowledge()
    }
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeCore {
    async fn knowledge_core(&self) -> ScoreResult<KnowledgeCore> {
        Ok(self.core.clone())
    }
}

/// Standard rule table for the common lot categories.
#[allow(clippy::too_many_lines)]
fn builtin_rules() -> Vec<Rule> {
    vec![
        // Electricite
        Rule::new(
            "ELEC-001",
            "electricite",
            "Installation conforme à la norme NF C 15-100",
            RuleType::Regulatory,
            Severity::Critical,
            3.0,
        )
        .with_source("NF C 15-100"),
        Rule::new(
            "ELEC-002",
            "electricite",
            "Attestation Consuel obligatoire avant mise sous tension",
            RuleType::Legal,
            Severity::High,
            2.5,
        )
        .with_source("Décret n°72-1120"),
        Rule::new(
            "ELEC-003",
            "electricite",
            "Mise à la terre et liaison équipotentielle de toutes les masses",
            RuleType::Regulatory,
            Severity::High,
            2.0,
        )
        .with_source("NF C 15-100 §411"),
        // Toiture
        Rule::new(
            "TOIT-001",
            "toiture",
            "Couverture exécutée selon le DTU série 40",
            RuleType::Regulatory,
            Severity::High,
            2.5,
        )
        .with_source("DTU 40"),
        Rule::new(
            "TOIT-002",
            "toiture",
            "Garantie décennale couvrant l'étanchéité de la couverture",
            RuleType::Legal,
            Severity::Critical,
            3.0,
        )
        .with_source("Art. 1792 Code civil"),
        Rule::new(
            "TOIT-003",
            "toiture",
            "Déclaration préalable en mairie si modification d'aspect",
            RuleType::Advisory,
            Severity::Medium,
            1.5,
        )
        .with_source("Art. R421-17 Code de l'urbanisme"),
        // Plomberie
        Rule::new(
            "PLMB-001",
            "plomberie",
            "Réseaux d'évacuation conformes au DTU 60.11",
            RuleType::Regulatory,
            Severity::High,
            2.0,
        )
        .with_source("DTU 60.11"),
        Rule::new(
            "PLMB-002",
            "plomberie",
            "Protection contre les retours d'eau (disconnecteur)",
            RuleType::Regulatory,
            Severity::Medium,
            1.5,
        )
        .with_source("DTU 60.1"),
        Rule::new(
            "PLMB-003",
            "plomberie",
            "Interdiction des canalisations en plomb",
            RuleType::Legal,
            Severity::Critical,
            3.0,
        )
        .with_source("Décret n°2001-1220"),
        // Maconnerie
        Rule::new(
            "MACO-001",
            "maconnerie",
            "Ouvrages en maçonnerie conformes au DTU 20.1",
            RuleType::Regulatory,
            Severity::High,
            2.0,
        )
        .with_source("DTU 20.1"),
        Rule::new(
            "MACO-002",
            "maconnerie",
            "Garantie décennale sur les ouvrages structurels",
            RuleType::Legal,
            Severity::Critical,
            3.0,
        )
        .with_source("Art. 1792 Code civil"),
        Rule::new(
            "MACO-003",
            "maconnerie",
            "Étude de sol recommandée avant fondations",
            RuleType::Advisory,
            Severity::Medium,
            1.0,
        ),
        // Isolation
        Rule::new(
            "ISOL-001",
            "isolation",
            "Résistance thermique minimale selon la RE2020",
            RuleType::Regulatory,
            Severity::High,
            2.5,
        )
        .with_source("RE2020"),
        Rule::new(
            "ISOL-002",
            "isolation",
            "Certification ACERMI des isolants recommandée",
            RuleType::Advisory,
            Severity::Low,
            1.0,
        )
        .with_source("ACERMI"),
        Rule::new(
            "ISOL-003",
            "isolation",
            "Qualification RGE exigée pour l'éligibilité aux aides",
            RuleType::Commercial,
            Severity::Medium,
            1.5,
        )
        .with_source("Arrêté du 1er décembre 2015"),
        // Chauffage
        Rule::new(
            "CHAU-001",
            "chauffage",
            "Installation gaz conforme au DTU 61.1",
            RuleType::Regulatory,
            Severity::Critical,
            3.0,
        )
        .with_source("DTU 61.1"),
        Rule::new(
            "CHAU-002",
            "chauffage",
            "Certificat de conformité gaz (Qualigaz) obligatoire",
            RuleType::Legal,
            Severity::High,
            2.5,
        )
        .with_source("Arrêté du 2 août 1977"),
        Rule::new(
            "CHAU-003",
            "chauffage",
            "Entretien annuel de la chaudière à mentionner",
            RuleType::Advisory,
            Severity::Low,
            1.0,
        )
        .with_source("Décret n°2009-649"),
        // Menuiserie
        Rule::new(
            "MENU-001",
            "menuiserie",
            "Pose de menuiseries extérieures selon le DTU 36.5",
            RuleType::Regulatory,
            Severity::Medium,
            1.5,
        )
        .with_source("DTU 36.5"),
        Rule::new(
            "MENU-002",
            "menuiserie",
            "Performances thermiques Uw conformes à la RE2020",
            RuleType::Regulatory,
            Severity::Medium,
            1.5,
        )
        .with_source("RE2020"),
        Rule::new(
            "MENU-003",
            "menuiserie",
            "Vitrage de sécurité en allège sous 0,90 m",
            RuleType::Regulatory,
            Severity::High,
            2.0,
        )
        .with_source("NF DTU 39"),
        // Peinture
        Rule::new(
            "PEIN-001",
            "peinture",
            "Travaux de peinture exécutés selon le DTU 59.1",
            RuleType::Regulatory,
            Severity::Low,
            1.0,
        )
        .with_source("DTU 59.1"),
        Rule::new(
            "PEIN-002",
            "peinture",
            "Étiquetage COV des produits appliqués",
            RuleType::Legal,
            Severity::Medium,
            1.5,
        )
        .with_source("Arrêté du 19 avril 2011"),
        Rule::new(
            "PEIN-003",
            "peinture",
            "Diagnostic plomb avant travaux dans les logements anciens",
            RuleType::Legal,
            Severity::High,
            2.0,
        )
        .with_source("Art. L1334-5 Code de la santé publique"),
    ]
}

/// Built-in knowledge core used by the doctrine engine.
fn builtin_knowledge() -> KnowledgeCore {
    KnowledgeCore {
        normative_rules: vec![
            NormativeRule {
                id: "NORM-ELEC-15100".into(),
                title: "NF C 15-100 — installations électriques basse tension".into(),
                related_lots: vec!["electricite".into()],
                reference: Some("NF C 15-100".into()),
            },
            NormativeRule {
                id: "NORM-DTU-40".into(),
                title: "DTU série 40 — couvertures".into(),
                related_lots: vec!["toiture".into()],
                reference: Some("DTU 40".into()),
            },
            NormativeRule {
                id: "NORM-RE2020".into(),
                title: "RE2020 — performance énergétique du bâti".into(),
                related_lots: vec!["isolation".into(), "menuiserie".into(), "chauffage".into()],
                reference: Some("RE2020".into()),
            },
            NormativeRule {
                id: "NORM-DTU-60".into(),
                title: "DTU 60.x — plomberie sanitaire".into(),
                related_lots: vec!["plomberie".into()],
                reference: Some("DTU 60".into()),
            },
            NormativeRule {
                id: "NORM-DTU-20".into(),
                title: "DTU 20.1 — ouvrages en maçonnerie".into(),
                related_lots: vec!["maconnerie".into()],
                reference: Some("DTU 20.1".into()),
            },
        ],
        pricing_references: vec![
            PricingReference {
                id: "PRICE-ELEC-IDF".into(),
                lot_type: "electricite".into(),
                region: Some("ile-de-france".into()),
                price_range_low: 90.0,
                price_range_high: 140.0,
                unit: "€/m²".into(),
            },
            PricingReference {
                id: "PRICE-ELEC-NAT".into(),
                lot_type: "electricite".into(),
                region: None,
                price_range_low: 70.0,
                price_range_high: 120.0,
                unit: "€/m²".into(),
            },
            PricingReference {
                id: "PRICE-TOIT-NAT".into(),
                lot_type: "toiture".into(),
                region: None,
                price_range_low: 180.0,
                price_range_high: 280.0,
                unit: "€/m²".into(),
            },
            PricingReference {
                id: "PRICE-ISOL-NAT".into(),
                lot_type: "isolation".into(),
                region: None,
                price_range_low: 40.0,
                price_range_high: 90.0,
                unit: "€/m²".into(),
            },
        ],
        jurisprudence: vec![
            JurisprudenceNote {
                id: "JP-DEVIS-GRATUIT".into(),
                summary: "Un devis accepté engage les deux parties sur le prix et l'étendue des travaux".into(),
                relevant_lots: vec![],
            },
            JurisprudenceNote {
                id: "JP-DECENNALE-TOIT".into(),
                summary: "Les infiltrations par la couverture relèvent de la garantie décennale".into(),
                relevant_lots: vec!["toiture".into()],
            },
            JurisprudenceNote {
                id: "JP-CONSUEL".into(),
                summary: "L'absence d'attestation Consuel engage la responsabilité de l'installateur".into(),
                relevant_lots: vec!["electricite".into()],
            },
        ],
    }
}
