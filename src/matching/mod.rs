//! Antibody identification engine and rule coverage diagnostics.
//!
//! This module provides the core identification functionality:
//!
//! - [`ReactionIndex`]: Per-request lookup sets over panels and patient reactions
//! - [`RuleEvaluator`]: Interprets one rule against the index
//! - [`IdentificationEngine`]: Classifies every marker as ruled out, suspect, or matched
//! - [`CoverageValidator`]: Checks that every panel marker is targeted by a rule
//!
//! ## Identification Algorithm
//!
//! 1. **Index**: Build expression and reaction sets keyed by (panel, cell)
//! 2. **Suspected antibodies**: Markers expressed on at least one positive cell
//! 3. **Rule evaluation**: Every enabled rule; antibody-specific rules only
//!    fire while their antibody is suspected
//! 4. **Classification**: Markers not ruled out are matched when every `+` cell
//!    reacted positive and every `0` cell reacted negative, otherwise suspect
//!
//! ## Example
//!
//! ```rust,no_run
//! use antigram_solver::{IdentificationEngine, PanelCatalog, RuleBook};
//! use antigram_solver::core::reaction::PatientReactionSet;
//! use antigram_solver::core::types::PatientReaction;
//! use antigram_solver::matching::engine::typed_rules;
//! use std::path::Path;
//!
//! let catalog = PanelCatalog::load_from_file(Path::new("panels.json")).unwrap();
//! let rules = RuleBook::load_embedded().unwrap();
//! let reactions = PatientReactionSet::new()
//!     .with_reaction("P1", 1, PatientReaction::Negative)
//!     .with_reaction("P1", 2, PatientReaction::Positive);
//!
//! let engine = IdentificationEngine::new();
//! let typed = typed_rules(&rules.enabled_records());
//! let result = engine.identify_snapshot(&catalog.panels, &reactions, &typed);
//!
//! for marker in &result.ruled_out {
//!     println!("{marker}: ruled out");
//! }
//! ```

pub mod coverage;
pub mod engine;
pub mod evaluator;
pub mod index;

pub use coverage::{validate_coverage, CoverageReport, CoverageValidator};
pub use engine::{
    EngineConfig, EvidenceSink, IdentificationEngine, IdentificationResult, MarkerProgress,
    MarkerSummary, SinkError,
};
pub use evaluator::{Evidence, EvidenceDetail, RuleEvaluator, RuleOutcome};
pub use index::ReactionIndex;
