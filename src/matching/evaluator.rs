use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::rule::{Rule, RuleKind};
use crate::core::types::{CellKey, PanelId, ReactionSymbol, RuleType};
use crate::matching::index::ReactionIndex;

/// Reason attached to low-frequency exclusions
pub const LOW_FREQUENCY_REASON: &str = "low population frequency";

/// One piece of evidence supporting a rule-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// Panel the cell belongs to (absent for synthetic evidence)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelId>,

    /// Lot label of that panel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,

    /// Cell number within the panel (absent for synthetic evidence)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<u32>,

    pub rule_type: RuleType,

    pub detail: EvidenceDetail,
}

/// What the evidence shows, by rule type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceDetail {
    /// Cell expresses `antigen`, patient negative
    Single { antigen: String },
    /// Cell is `antigen_a`=+, `antigen_b`=0, patient negative
    Homozygous { antigen_a: String, antigen_b: String },
    /// Cell is `antigen_a`=+, `antigen_b`=+, patient negative
    Heterozygous { antigen_a: String, antigen_b: String },
    /// Cell is `antigen1`=+, `antigen2`=+, patient negative, while `antibody` is suspected
    AntibodySpecific {
        antibody: String,
        antigen1: String,
        antigen2: String,
    },
    /// No cell involved
    LowFrequency { antigen: String, reason: String },
}

impl Evidence {
    fn for_cell(index: &ReactionIndex, key: &CellKey, rule_type: RuleType, detail: EvidenceDetail) -> Self {
        Self {
            lot_number: index.lot_number(&key.panel).map(str::to_string),
            panel: Some(key.panel.clone()),
            cell: Some(key.cell),
            rule_type,
            detail,
        }
    }

    /// Cell this evidence refers to, if any
    pub fn cell_key(&self) -> Option<CellKey> {
        Some(CellKey {
            panel: self.panel.clone()?,
            cell: self.cell?,
        })
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location = match (&self.panel, self.cell) {
            (Some(panel), Some(cell)) => match &self.lot_number {
                Some(lot) => format!("lot {lot} ({panel}) cell {cell}"),
                None => format!("{panel} cell {cell}"),
            },
            _ => String::from("-"),
        };
        match &self.detail {
            EvidenceDetail::Single { antigen } => write!(f, "{location}: {antigen}+ / patient 0"),
            EvidenceDetail::Homozygous { antigen_a, antigen_b } => {
                write!(f, "{location}: {antigen_a}+ {antigen_b}0 / patient 0")
            }
            EvidenceDetail::Heterozygous { antigen_a, antigen_b } => {
                write!(f, "{location}: {antigen_a}+ {antigen_b}+ / patient 0")
            }
            EvidenceDetail::AntibodySpecific {
                antibody,
                antigen1,
                antigen2,
            } => write!(
                f,
                "{location}: {antigen1}+ {antigen2}+ / patient 0 (anti-{antibody} suspected)"
            ),
            EvidenceDetail::LowFrequency { antigen, reason } => write!(f, "{antigen}: {reason}"),
        }
    }
}

/// Verdict of evaluating one rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub satisfied: bool,
    pub evidence: Vec<Evidence>,
}

impl RuleOutcome {
    fn unsatisfied() -> Self {
        Self::default()
    }

    fn from_cells(
        index: &ReactionIndex,
        cells: &BTreeSet<CellKey>,
        threshold: usize,
        rule_type: RuleType,
        detail: impl Fn() -> EvidenceDetail,
    ) -> Self {
        Self {
            satisfied: cells.len() >= threshold,
            evidence: cells
                .iter()
                .map(|key| Evidence::for_cell(index, key, rule_type, detail()))
                .collect(),
        }
    }
}

/// Interprets one rule at a time against a [`ReactionIndex`]
pub struct RuleEvaluator<'a> {
    index: &'a ReactionIndex,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(index: &'a ReactionIndex) -> Self {
        Self { index }
    }

    /// Evaluate `rule`. `suspected_antibody` only matters for antibody-specific
    /// rules, which are unsatisfied unless it names the rule's antibody.
    ///
    /// Evidence is ordered by (panel, cell). Disabled rules are not special-cased
    /// here; the engine filters them out before calling.
    pub fn evaluate(&self, rule: &Rule, suspected_antibody: Option<&str>) -> RuleOutcome {
        let rule_type = rule.rule_type();
        let outcome = match &rule.kind {
            RuleKind::SingleMarkerRuleOut { target } => {
                let cells = self.index.expressed_negative(target);
                RuleOutcome::from_cells(self.index, &cells, 1, rule_type, || {
                    EvidenceDetail::Single {
                        antigen: target.clone(),
                    }
                })
            }
            RuleKind::HomozygousPairRuleOut { target, pairs } => {
                self.evaluate_homozygous(target, pairs)
            }
            RuleKind::HeterozygousRuleOut {
                target,
                paired,
                required_count,
            } => {
                let cells = self
                    .index
                    .paired_negative(target, paired, ReactionSymbol::Expressed);
                RuleOutcome::from_cells(self.index, &cells, *required_count, rule_type, || {
                    EvidenceDetail::Heterozygous {
                        antigen_a: target.clone(),
                        antigen_b: paired.clone(),
                    }
                })
            }
            RuleKind::AntibodySpecificRuleOut {
                antibody,
                antigen1,
                antigen2,
                required_count,
                ..
            } => {
                if suspected_antibody != Some(antibody.as_str()) {
                    tracing::debug!(
                        "{} skipped: anti-{antibody} not suspected ({suspected_antibody:?})",
                        rule.kind
                    );
                    return RuleOutcome::unsatisfied();
                }
                let cells = self
                    .index
                    .paired_negative(antigen1, antigen2, ReactionSymbol::Expressed);
                RuleOutcome::from_cells(self.index, &cells, *required_count, rule_type, || {
                    EvidenceDetail::AntibodySpecific {
                        antibody: antibody.clone(),
                        antigen1: antigen1.clone(),
                        antigen2: antigen2.clone(),
                    }
                })
            }
            RuleKind::LowFrequencyAutoRuleOut { target } => RuleOutcome {
                satisfied: true,
                evidence: vec![Evidence {
                    panel: None,
                    lot_number: None,
                    cell: None,
                    rule_type,
                    detail: EvidenceDetail::LowFrequency {
                        antigen: target.clone(),
                        reason: LOW_FREQUENCY_REASON.to_string(),
                    },
                }],
            },
        };

        tracing::debug!(
            "{} for {}: {} cell(s), satisfied={}",
            rule.kind,
            rule.target(),
            outcome.evidence.len(),
            outcome.satisfied
        );
        outcome
    }

    /// Try each configured (A, B) pair with A = target; any qualifying cell suffices
    fn evaluate_homozygous(&self, target: &str, pairs: &[(String, String)]) -> RuleOutcome {
        let mut evidence = Vec::new();
        for (antigen_a, antigen_b) in pairs.iter().filter(|(a, _)| a == target) {
            let cells = self
                .index
                .paired_negative(antigen_a, antigen_b, ReactionSymbol::Absent);
            evidence.extend(cells.iter().map(|key| {
                Evidence::for_cell(
                    self.index,
                    key,
                    RuleType::Homozygous,
                    EvidenceDetail::Homozygous {
                        antigen_a: antigen_a.clone(),
                        antigen_b: antigen_b.clone(),
                    },
                )
            }));
        }
        if evidence.is_empty() && !pairs.iter().any(|(a, _)| a == target) {
            tracing::debug!("Homozygous rule for {target} has no pair starting with {target}");
        }
        RuleOutcome {
            satisfied: !evidence.is_empty(),
            evidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::panel::Panel;
    use crate::core::reaction::PatientReactionSet;
    use crate::core::types::PatientReaction;

    /// Panel with markers K, k, C, c, D and the given cell strings, each paired
    /// with a patient reaction
    fn index_for(cells: &[(&str, PatientReaction)]) -> ReactionIndex {
        let mut panel = Panel::new("p1", "LOT-9").with_markers(["K", "k", "C", "c", "D"]);
        let mut reactions = PatientReactionSet::new();
        for (i, (symbols, reaction)) in cells.iter().enumerate() {
            let cell = u32::try_from(i + 1).unwrap();
            panel = panel.with_cell_str(cell, symbols);
            reactions = reactions.with_reaction("p1", cell, *reaction);
        }
        ReactionIndex::build([&panel], &reactions)
    }

    use PatientReaction::{Negative as Neg, Positive as Pos};

    #[test]
    fn test_single_marker_needs_negative_reaction() {
        let index = index_for(&[("0000+", Pos)]);
        let evaluator = RuleEvaluator::new(&index);
        assert!(!evaluator.evaluate(&Rule::single("D"), None).satisfied);

        let index = index_for(&[("0000+", Pos), ("0000+", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        let outcome = evaluator.evaluate(&Rule::single("D"), None);
        assert!(outcome.satisfied);
        assert_eq!(outcome.evidence.len(), 1);
        assert_eq!(outcome.evidence[0].cell, Some(2));
        assert_eq!(outcome.evidence[0].lot_number.as_deref(), Some("LOT-9"));
    }

    #[test]
    fn test_homozygous_requires_partner_absent() {
        // K+ k+ negative: heterozygous, not homozygous evidence
        let index = index_for(&[("++000", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        let rule = Rule::homozygous("K", [("K", "k")]);
        assert!(!evaluator.evaluate(&rule, None).satisfied);

        let index = index_for(&[("++000", Neg), ("+0000", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        let outcome = evaluator.evaluate(&rule, None);
        assert!(outcome.satisfied);
        assert_eq!(outcome.evidence.len(), 1);
    }

    #[test]
    fn test_homozygous_ignores_pairs_for_other_targets() {
        let index = index_for(&[("+0000", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        let rule = Rule::homozygous("C", [("K", "k")]);
        assert!(!evaluator.evaluate(&rule, None).satisfied);
    }

    #[test]
    fn test_homozygous_any_pair_suffices() {
        // C+ c0 negative satisfies (C,c) even though (C,D) finds nothing
        let index = index_for(&[("00+0+", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        let rule = Rule::homozygous("C", [("C", "D"), ("C", "c")]);
        assert!(evaluator.evaluate(&rule, None).satisfied);
    }

    #[test]
    fn test_heterozygous_exact_threshold() {
        let rule = Rule::heterozygous("K", "k", 3);
        let index = index_for(&[("++000", Neg), ("++000", Neg), ("++000", Pos)]);
        let outcome = RuleEvaluator::new(&index).evaluate(&rule, None);
        assert!(!outcome.satisfied);
        assert_eq!(outcome.evidence.len(), 2);

        let index = index_for(&[("++000", Neg), ("++000", Neg), ("++000", Neg)]);
        assert!(RuleEvaluator::new(&index).evaluate(&rule, None).satisfied);
    }

    #[test]
    fn test_antibody_specific_gated_on_suspected() {
        let rule = Rule::antibody_specific("D", "C", "c", 1);
        let index = index_for(&[("00++0", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        assert!(!evaluator.evaluate(&rule, None).satisfied);
        let outcome = evaluator.evaluate(&rule, Some("K"));
        assert!(!outcome.satisfied);
        assert!(outcome.evidence.is_empty());
        assert!(evaluator.evaluate(&rule, Some("D")).satisfied);
    }

    #[test]
    fn test_low_frequency_always_satisfied() {
        let index = ReactionIndex::default();
        let outcome = RuleEvaluator::new(&index).evaluate(&Rule::low_frequency("Kpa"), None);
        assert!(outcome.satisfied);
        assert_eq!(outcome.evidence.len(), 1);
        assert!(outcome.evidence[0].cell_key().is_none());
        assert_eq!(
            outcome.evidence[0].detail,
            EvidenceDetail::LowFrequency {
                antigen: "Kpa".into(),
                reason: LOW_FREQUENCY_REASON.into()
            }
        );
    }

    #[test]
    fn test_missing_marker_contributes_nothing() {
        let index = index_for(&[("+0000", Neg)]);
        let evaluator = RuleEvaluator::new(&index);
        assert!(!evaluator.evaluate(&Rule::single("Fya"), None).satisfied);
        assert!(!evaluator
            .evaluate(&Rule::heterozygous("K", "Kpa", 1), None)
            .satisfied);
    }

    #[test]
    fn test_evidence_ordered_by_cell() {
        let index = index_for(&[
            ("0000+", Neg),
            ("0000+", Neg),
            ("0000+", Neg),
            ("0000+", Neg),
        ]);
        let outcome = RuleEvaluator::new(&index).evaluate(&Rule::single("D"), None);
        let cells: Vec<u32> = outcome.evidence.iter().filter_map(|e| e.cell).collect();
        assert_eq!(cells, vec![1, 2, 3, 4]);
    }
}
