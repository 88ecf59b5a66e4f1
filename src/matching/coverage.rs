//! Rule coverage diagnostics.
//!
//! Checks that every marker appearing in the loaded panels is targeted by at
//! least one enabled, well-formed rule. Never fails: missing data simply yields
//! empty statistics.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::panel::Panel;
use crate::core::reaction::PatientReactionSet;
use crate::core::rule::RuleRecord;
use crate::core::types::RuleType;
use crate::matching::index::ReactionIndex;

/// Markers usually excluded through homozygous pairs rather than a dedicated rule
const PAIRED_MARKERS: &[&str] = &["S", "s", "Fya", "Fyb", "Jka", "Jkb"];

/// Outcome of a coverage check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    /// No panel marker lacks a rule
    pub validation_passed: bool,
    pub panels_analyzed: usize,
    pub markers_in_panels: BTreeSet<String>,
    pub markers_with_rules: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    /// Missing markers that are expressed on a cell the patient was tested against
    pub critical_missing: BTreeSet<String>,
    pub markers_with_observed_reactions: BTreeSet<String>,
    /// Rule targets that appear in no panel
    pub unused_rule_targets: BTreeSet<String>,
    /// Rule type code -> number of enabled, well-formed rules
    pub rule_distribution: BTreeMap<String, usize>,
    pub rules_by_target: BTreeMap<String, Vec<RuleType>>,
    pub total_rules: usize,
    /// One message per malformed enabled record
    pub invalid_rules: Vec<String>,
    pub coverage_percentage: f64,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Plain-text rendering for terminals and logs
impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.validation_passed {
            "PASSED"
        } else {
            "FAILED"
        };
        writeln!(f, "Rule Coverage Summary")?;
        writeln!(f, "=====================")?;
        writeln!(f)?;
        writeln!(f, "Overall Status: {status}")?;
        writeln!(f)?;
        writeln!(f, "Coverage Statistics:")?;
        writeln!(f, "- Panels Analyzed: {}", self.panels_analyzed)?;
        writeln!(f, "- Markers in Panels: {}", self.markers_in_panels.len())?;
        writeln!(f, "- Markers with Rules: {}", self.markers_with_rules.len())?;
        writeln!(f, "- Missing Rules: {}", self.missing.len())?;
        writeln!(f, "- Coverage: {:.1}%", self.coverage_percentage)?;
        writeln!(f)?;
        writeln!(f, "Critical Issues:")?;
        writeln!(f, "{}", lines_or_none(&self.warnings))?;
        writeln!(f)?;
        writeln!(f, "Missing Markers: {}", join_or_none(&self.missing))?;
        if !self.invalid_rules.is_empty() {
            writeln!(f)?;
            writeln!(f, "Invalid Rules:")?;
            writeln!(f, "{}", self.invalid_rules.join("\n"))?;
        }
        writeln!(f)?;
        writeln!(f, "Recommendations:")?;
        write!(f, "{}", lines_or_none(&self.recommendations))
    }
}

fn lines_or_none(lines: &[String]) -> String {
    if lines.is_empty() {
        "None".to_string()
    } else {
        lines.join("\n")
    }
}

fn join_or_none(markers: &BTreeSet<String>) -> String {
    if markers.is_empty() {
        "None".to_string()
    } else {
        markers.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Cross-checks panel markers against rule targets
pub struct CoverageValidator<'a> {
    panels: &'a [Panel],
    reactions: &'a PatientReactionSet,
}

impl<'a> CoverageValidator<'a> {
    pub fn new(panels: &'a [Panel], reactions: &'a PatientReactionSet) -> Self {
        Self { panels, reactions }
    }

    /// Validate raw rule records against the panels. Disabled records are ignored.
    pub fn validate(&self, records: &[RuleRecord]) -> CoverageReport {
        let index = ReactionIndex::build(self.panels, self.reactions);
        let markers_in_panels = index.universe().clone();
        let markers_with_observed_reactions = index.markers_with_observed_reactions();

        let mut markers_with_rules = BTreeSet::new();
        let mut rule_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut rules_by_target: BTreeMap<String, Vec<RuleType>> = BTreeMap::new();
        let mut invalid_rules = Vec::new();
        let mut total_rules = 0;

        for (i, record) in records.iter().enumerate() {
            if !record.enabled {
                continue;
            }
            match record.to_rule() {
                Ok(rule) => {
                    total_rules += 1;
                    markers_with_rules.insert(rule.target().to_string());
                    *rule_distribution
                        .entry(rule.rule_type().code().to_string())
                        .or_default() += 1;
                    rules_by_target
                        .entry(rule.target().to_string())
                        .or_default()
                        .push(rule.rule_type());
                }
                Err(e) => {
                    invalid_rules.push(format!("Rule {} ({}): {e}", i + 1, record.target_antigen));
                }
            }
        }

        let missing: BTreeSet<String> = markers_in_panels
            .difference(&markers_with_rules)
            .cloned()
            .collect();
        let critical_missing: BTreeSet<String> = missing
            .intersection(&markers_with_observed_reactions)
            .cloned()
            .collect();
        let unused_rule_targets: BTreeSet<String> = markers_with_rules
            .difference(&markers_in_panels)
            .cloned()
            .collect();

        let covered = markers_with_rules.intersection(&markers_in_panels).count();
        #[allow(clippy::cast_precision_loss)]
        let coverage_percentage = if markers_in_panels.is_empty() {
            0.0
        } else {
            covered as f64 / markers_in_panels.len() as f64 * 100.0
        };

        let recommendations = recommendations(&missing, &rule_distribution);
        let warnings = warnings(&missing, &critical_missing);

        if !critical_missing.is_empty() {
            tracing::warn!(
                "{} markers with patient reactions have no rules: {}",
                critical_missing.len(),
                join_or_none(&critical_missing)
            );
        }
        tracing::info!(
            "Rule coverage {coverage_percentage:.1}% ({covered}/{} markers)",
            markers_in_panels.len()
        );

        CoverageReport {
            validation_passed: missing.is_empty(),
            panels_analyzed: self.panels.len(),
            markers_in_panels,
            markers_with_rules,
            missing,
            critical_missing,
            markers_with_observed_reactions,
            unused_rule_targets,
            rule_distribution,
            rules_by_target,
            total_rules,
            invalid_rules,
            coverage_percentage,
            recommendations,
            warnings,
        }
    }
}

/// Validate rule coverage of `records` over `panels`
pub fn validate_coverage(
    panels: &[Panel],
    reactions: &PatientReactionSet,
    records: &[RuleRecord],
) -> CoverageReport {
    CoverageValidator::new(panels, reactions).validate(records)
}

fn recommendations(
    missing: &BTreeSet<String>,
    distribution: &BTreeMap<String, usize>,
) -> Vec<String> {
    let mut out = Vec::new();

    if !missing.is_empty() {
        out.push(format!(
            "Missing rules for {} markers: {}",
            missing.len(),
            join_or_none(missing)
        ));
        for marker in missing {
            if PAIRED_MARKERS.contains(&marker.as_str()) {
                out.push(format!(
                    "Add a single-marker rule for {marker} or ensure it is covered by homozygous rules"
                ));
            } else {
                out.push(format!(
                    "Add a single-marker, homozygous, or low-frequency rule for {marker}"
                ));
            }
        }
    }

    if !distribution.contains_key(RuleType::SingleMarker.code()) {
        out.push(
            "Consider adding single-marker rules for markers that can be ruled out by single expression"
                .to_string(),
        );
    }
    if !distribution.contains_key(RuleType::Homozygous.code()) {
        out.push("Consider adding homozygous rules for marker pairs".to_string());
    }

    out
}

fn warnings(missing: &BTreeSet<String>, critical_missing: &BTreeSet<String>) -> Vec<String> {
    let mut out = Vec::new();
    if !critical_missing.is_empty() {
        out.push(format!(
            "CRITICAL: {} markers with patient reactions have no rules: {}",
            critical_missing.len(),
            join_or_none(critical_missing)
        ));
    }
    if !missing.is_empty() {
        out.push(format!(
            "WARNING: {} markers in panels have no rules: {}",
            missing.len(),
            join_or_none(missing)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PatientReaction;
    use serde_json::json;

    fn panels() -> Vec<Panel> {
        vec![Panel::new("P1", "LOT-A")
            .with_markers(["D", "Fya", "K"])
            .with_cell_str(1, "+0+")
            .with_cell_str(2, "0+0")]
    }

    #[test]
    fn test_full_coverage_passes() {
        let records = vec![
            RuleRecord::new("single", "D", json!({"antigens": ["D"]})),
            RuleRecord::new("homo", "Fya", json!({"antigen_pairs": [["Fya", "Fyb"]]})),
            RuleRecord::new("single", "K", json!({"antigens": ["K"]})),
        ];
        let report = validate_coverage(&panels(), &PatientReactionSet::new(), &records);
        assert!(report.validation_passed);
        assert!(report.missing.is_empty());
        assert!((report.coverage_percentage - 100.0).abs() < 1e-9);
        assert_eq!(report.rule_distribution["single"], 2);
        assert_eq!(report.total_rules, 3);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_and_critical_missing() {
        let reactions = PatientReactionSet::new().with_reaction("P1", 2, PatientReaction::Positive);
        let records = vec![RuleRecord::new("single", "D", json!({"antigens": ["D"]}))];
        let report = validate_coverage(&panels(), &reactions, &records);

        assert!(!report.validation_passed);
        let missing: Vec<&str> = report.missing.iter().map(String::as_str).collect();
        assert_eq!(missing, vec!["Fya", "K"]);
        // Only cell 2 was tested and it expresses Fya
        let critical: Vec<&str> = report.critical_missing.iter().map(String::as_str).collect();
        assert_eq!(critical, vec!["Fya"]);
        assert!(report.warnings[0].starts_with("CRITICAL: 1 markers"));
        assert!(report.warnings[1].starts_with("WARNING: 2 markers"));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Fya or ensure it is covered by homozygous rules")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r == "Add a single-marker, homozygous, or low-frequency rule for K"));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r == "Consider adding homozygous rules for marker pairs"));
    }

    #[test]
    fn test_disabled_and_invalid_records_do_not_cover() {
        let records = vec![
            RuleRecord::new("single", "D", json!({"antigens": ["D"]})).disabled(),
            RuleRecord::new("hetero", "K", json!({"antigen_a": "K"})),
            RuleRecord::new("lowf", "Kpa", json!({"antigens": ["Kpa"]})),
        ];
        let report = validate_coverage(&panels(), &PatientReactionSet::new(), &records);
        assert_eq!(report.missing.len(), 3);
        assert_eq!(report.invalid_rules.len(), 1);
        assert!(report.invalid_rules[0].starts_with("Rule 2 (K)"));
        assert!(report.unused_rule_targets.contains("Kpa"));
        assert!(report.coverage_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_inputs_yield_empty_report() {
        let report = validate_coverage(&[], &PatientReactionSet::new(), &[]);
        assert!(report.validation_passed);
        assert!(report.markers_in_panels.is_empty());
        assert!(report.coverage_percentage.abs() < f64::EPSILON);
        assert_eq!(report.panels_analyzed, 0);
    }

    #[test]
    fn test_display_summary() {
        let records = vec![RuleRecord::new("single", "D", json!({"antigens": ["D"]}))];
        let report = validate_coverage(&panels(), &PatientReactionSet::new(), &records);
        let text = report.to_string();
        assert!(text.contains("Overall Status: FAILED"));
        assert!(text.contains("Coverage: 33.3%"));
        assert!(text.contains("Missing Markers: Fya, K"));
    }
}
