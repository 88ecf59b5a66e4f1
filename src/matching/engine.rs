use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::source::{PanelSource, ReactionSource, RuleSource, SourceError};
use crate::core::panel::Panel;
use crate::core::reaction::PatientReactionSet;
use crate::core::rule::{Rule, RuleKind, RuleRecord};
use crate::core::types::{Outcome, RuleType};
use crate::matching::evaluator::{Evidence, RuleEvaluator};
use crate::matching::index::ReactionIndex;

/// Per-marker progress toward a conclusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerProgress {
    /// Cells where the marker's expression is known (`+` or `0`)
    pub total_cells: usize,
    /// Marker `+`, patient `+`
    pub positive_matches: usize,
    /// Marker `0`, patient `0`
    pub negative_matches: usize,
    /// Marker `+`, patient `0` plus marker `0`, patient `+`
    pub mismatches: usize,
    pub match_percentage: f64,
    /// Evidence of every satisfied rule targeting the marker
    pub ruling_out_cells: Vec<Evidence>,
    pub can_be_ruled_out: bool,
    pub meets_match_criteria: bool,
}

/// Outcome of one identification request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentificationResult {
    pub ruled_out: BTreeSet<String>,
    /// Still to rule out
    pub suspect: BTreeSet<String>,
    pub matched: BTreeSet<String>,
    pub progress: BTreeMap<String, MarkerProgress>,
    pub suspected_antibodies: Vec<String>,
    pub ruled_out_details: BTreeMap<String, Vec<Evidence>>,
}

impl IdentificationResult {
    /// Classification of a marker. Low-frequency targets outside every panel are
    /// reported as ruled out too.
    pub fn outcome(&self, marker: &str) -> Option<Outcome> {
        if self.ruled_out.contains(marker) {
            Some(Outcome::RuledOut)
        } else if self.matched.contains(marker) {
            Some(Outcome::Matched)
        } else if self.suspect.contains(marker) {
            Some(Outcome::Suspect)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ruled_out.is_empty() && self.suspect.is_empty() && self.matched.is_empty()
    }
}

/// Detailed view of a single marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSummary {
    pub marker: String,
    pub total_cells: usize,
    pub positive_matches: usize,
    pub negative_matches: usize,
    pub mismatches: usize,
    pub match_percentage: f64,
    pub can_be_ruled_out: bool,
    pub meets_match_criteria: bool,
    /// Types of the enabled rules targeting this marker
    pub applicable_rules: Vec<RuleType>,
    pub ruling_out_cells: Vec<Evidence>,
}

#[derive(Debug, thiserror::Error)]
#[error("Evidence sink failed: {0}")]
pub struct SinkError(pub String);

/// Best-effort receiver for rule-out evidence (e.g. an audit store).
///
/// Failures are logged and never affect the identification result.
pub trait EvidenceSink {
    /// # Errors
    ///
    /// Implementations return `SinkError` when the evidence could not be stored.
    fn record(&self, marker: &str, evidence: &[Evidence]) -> Result<(), SinkError>;
}

/// Configuration for the identification engine
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Leave out panels that expired strictly before this date
    pub exclude_expired_on: Option<NaiveDate>,
}

/// Classifies every marker as ruled out, suspect, or matched
pub struct IdentificationEngine<'a> {
    config: EngineConfig,
    sink: Option<&'a dyn EvidenceSink>,
}

impl Default for IdentificationEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IdentificationEngine<'a> {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            sink: None,
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config, sink: None }
    }

    #[must_use]
    pub fn with_evidence_sink(mut self, sink: &'a dyn EvidenceSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fetch a snapshot from the storage collaborators and identify.
    ///
    /// Malformed rule records are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if panels, reactions or rules cannot be fetched.
    pub fn identify<P, R, S>(
        &self,
        panels: &P,
        reactions: &R,
        rules: &S,
    ) -> Result<IdentificationResult, SourceError>
    where
        P: PanelSource + ?Sized,
        R: ReactionSource + ?Sized,
        S: RuleSource + ?Sized,
    {
        if reactions.is_empty()? {
            tracing::info!("No patient reactions recorded, nothing to identify");
            return Ok(IdentificationResult::default());
        }

        let panels = panels.list_panels()?;
        let mut snapshot = PatientReactionSet::new();
        for panel in &panels {
            for (cell, reaction) in reactions.reactions_for_panel(&panel.id)? {
                snapshot.record(panel.id.clone(), cell, reaction);
            }
        }
        let rules = typed_rules(&rules.enabled_rules()?);

        // The emptiness decision is the store's; the snapshot may hold fewer
        // reactions once unknown panels are dropped
        Ok(self.classify(&panels, &snapshot, &rules))
    }

    /// Identify from an in-memory snapshot. Pure and deterministic.
    pub fn identify_snapshot(
        &self,
        panels: &[Panel],
        reactions: &PatientReactionSet,
        rules: &[Rule],
    ) -> IdentificationResult {
        if reactions.is_empty() {
            return IdentificationResult::default();
        }
        self.classify(panels, reactions, rules)
    }

    /// The identification pass proper, once the empty-input check has passed
    fn classify(
        &self,
        panels: &[Panel],
        reactions: &PatientReactionSet,
        rules: &[Rule],
    ) -> IdentificationResult {
        let index = ReactionIndex::build(self.usable_panels(panels), reactions);
        let suspected = suspected_antibodies(&index);
        let (ruled_out, details) = evaluate_rules(&index, rules, &suspected);

        let mut suspect = BTreeSet::new();
        let mut matched = BTreeSet::new();
        for marker in index.universe() {
            if ruled_out.contains(marker) {
                continue;
            }
            if index.is_perfect_match(marker) {
                matched.insert(marker.clone());
            } else {
                suspect.insert(marker.clone());
            }
        }

        let progress = index
            .universe()
            .iter()
            .map(|marker| (marker.clone(), build_progress(&index, marker, &details)))
            .collect();

        tracing::info!(
            "Identification: {} ruled out, {} still to rule out, {} matched ({} suspected antibodies)",
            ruled_out.len(),
            suspect.len(),
            matched.len(),
            suspected.len()
        );

        let result = IdentificationResult {
            ruled_out,
            suspect,
            matched,
            progress,
            suspected_antibodies: suspected,
            ruled_out_details: details,
        };
        self.publish_evidence(&result);
        result
    }

    /// Summarize a single marker against the snapshot
    pub fn summarize_marker(
        &self,
        marker: &str,
        panels: &[Panel],
        reactions: &PatientReactionSet,
        rules: &[Rule],
    ) -> MarkerSummary {
        let index = ReactionIndex::build(self.usable_panels(panels), reactions);
        let suspected = suspected_antibodies(&index);
        let applicable: Vec<&Rule> = rules
            .iter()
            .filter(|r| r.enabled && r.target() == marker)
            .collect();

        let mut ruling_out_cells = Vec::new();
        let mut can_be_ruled_out = false;
        if !reactions.is_empty() {
            let evaluator = RuleEvaluator::new(&index);
            for rule in &applicable {
                if let Some(evidence) = satisfied_evidence(&evaluator, rule, &suspected) {
                    can_be_ruled_out = true;
                    ruling_out_cells.extend(evidence);
                }
            }
        }

        let concordance = index.concordance(marker);
        MarkerSummary {
            marker: marker.to_string(),
            total_cells: concordance.total_cells,
            positive_matches: concordance.positive_matches,
            negative_matches: concordance.negative_matches,
            mismatches: concordance.mismatches,
            match_percentage: concordance.match_percentage(),
            can_be_ruled_out,
            meets_match_criteria: concordance.total_cells > 0 && index.is_perfect_match(marker),
            applicable_rules: applicable.iter().map(|r| r.rule_type()).collect(),
            ruling_out_cells,
        }
    }

    fn usable_panels<'p>(&self, panels: &'p [Panel]) -> impl Iterator<Item = &'p Panel> {
        let cutoff = self.config.exclude_expired_on;
        panels.iter().filter(move |panel| match cutoff {
            Some(on) if panel.is_expired(on) => {
                tracing::warn!(
                    "Skipping panel {} (lot {}): expired before {on}",
                    panel.id,
                    panel.lot_number
                );
                false
            }
            _ => true,
        })
    }

    fn publish_evidence(&self, result: &IdentificationResult) {
        let Some(sink) = self.sink else {
            return;
        };
        for (marker, evidence) in &result.ruled_out_details {
            if let Err(e) = sink.record(marker, evidence) {
                tracing::warn!("Could not record evidence for {marker}: {e}");
            }
        }
    }
}

/// Convert raw records into typed rules, skipping malformed ones with a warning
pub fn typed_rules(records: &[RuleRecord]) -> Vec<Rule> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match record.to_rule() {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::warn!("Skipping rule {} ({}): {e}", i + 1, record.target_antigen);
                None
            }
        })
        .collect()
}

fn suspected_antibodies(index: &ReactionIndex) -> Vec<String> {
    index
        .universe()
        .iter()
        .filter(|marker| index.is_suspected_antibody(marker))
        .cloned()
        .collect()
}

/// Evidence of `rule` if it is satisfied. Antibody-specific rules are tried
/// against each suspected antibody in turn, stopping at the first success.
fn satisfied_evidence(
    evaluator: &RuleEvaluator<'_>,
    rule: &Rule,
    suspected: &[String],
) -> Option<Vec<Evidence>> {
    if matches!(rule.kind, RuleKind::AntibodySpecificRuleOut { .. }) {
        return suspected.iter().find_map(|antibody| {
            let outcome = evaluator.evaluate(rule, Some(antibody));
            outcome.satisfied.then_some(outcome.evidence)
        });
    }
    let outcome = evaluator.evaluate(rule, None);
    outcome.satisfied.then_some(outcome.evidence)
}

fn evaluate_rules(
    index: &ReactionIndex,
    rules: &[Rule],
    suspected: &[String],
) -> (BTreeSet<String>, BTreeMap<String, Vec<Evidence>>) {
    let evaluator = RuleEvaluator::new(index);
    let mut ruled_out = BTreeSet::new();
    let mut details: BTreeMap<String, Vec<Evidence>> = BTreeMap::new();

    for rule in rules.iter().filter(|r| r.enabled) {
        if let Some(evidence) = satisfied_evidence(&evaluator, rule, suspected) {
            ruled_out.insert(rule.target().to_string());
            details
                .entry(rule.target().to_string())
                .or_default()
                .extend(evidence);
        }
    }

    (ruled_out, details)
}

fn build_progress(
    index: &ReactionIndex,
    marker: &str,
    details: &BTreeMap<String, Vec<Evidence>>,
) -> MarkerProgress {
    let concordance = index.concordance(marker);
    let ruling_out_cells = details.get(marker).cloned().unwrap_or_default();
    MarkerProgress {
        total_cells: concordance.total_cells,
        positive_matches: concordance.positive_matches,
        negative_matches: concordance.negative_matches,
        mismatches: concordance.mismatches,
        match_percentage: concordance.match_percentage(),
        can_be_ruled_out: details.contains_key(marker),
        meets_match_criteria: index.is_perfect_match(marker),
        ruling_out_cells,
    }
}
