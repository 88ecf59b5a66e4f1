//! # antigram-solver
//!
//! A library for rule-based antibody identification from reagent panel
//! (antigram) reactions.
//!
//! During an antibody workup a patient's serum is tested against panels of
//! reference cells whose marker (antigen) expression is known. Each marker on
//! the panels is either excluded as the cause of the reactions, confirmed by a
//! perfectly concordant pattern, or left to rule out with more testing.
//!
//! `antigram-solver` automates that bookkeeping with a configurable rule set.
//!
//! ## Features
//!
//! - **Single-marker exclusion**: A marker expressed on a non-reacting cell is ruled out
//! - **Homozygous pairs**: Exclusion on cells with A=+, B=0 only (e.g., Fy(a+b-))
//! - **Heterozygous counts**: Exclusion after enough A=+, B=+ non-reacting cells
//! - **Antibody-specific exclusion**: Rules that only apply while another antibody is suspected
//! - **Low-frequency markers**: Always excluded
//! - **Coverage checks**: Flags panel markers no rule can exclude
//!
//! ## Example
//!
//! ```rust,no_run
//! use antigram_solver::{IdentificationEngine, PanelCatalog, RuleBook};
//! use antigram_solver::parsing::tsv::parse_reactions_file;
//! use std::path::Path;
//!
//! // Load panels and the embedded default rule set
//! let catalog = PanelCatalog::load_from_file(Path::new("panels.json")).unwrap();
//! let rules = RuleBook::load_embedded().unwrap();
//!
//! // Patient reactions: panel, cell, reaction
//! let reactions = parse_reactions_file(Path::new("patient.tsv")).unwrap();
//!
//! let engine = IdentificationEngine::new();
//! let result = engine
//!     .identify(catalog.panels.as_slice(), &reactions, &rules)
//!     .unwrap();
//!
//! println!("Ruled out: {:?}", result.ruled_out);
//! println!("Still to rule out: {:?}", result.suspect);
//! println!("Matched: {:?}", result.matched);
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Panel and rule storage, cell lookup, storage interfaces
//! - [`core`]: Core data types for panels, reactions, and rules
//! - [`matching`]: Identification engine and coverage validation
//! - [`parsing`]: Parsers for panel grids and patient reactions
//! - [`cli`]: Command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::catalog::rules::RuleBook;
pub use crate::catalog::store::PanelCatalog;
pub use crate::core::panel::Panel;
pub use crate::core::reaction::PatientReactionSet;
pub use crate::core::rule::{Rule, RuleKind, RuleRecord};
pub use crate::core::types::*;
pub use crate::matching::coverage::{validate_coverage, CoverageReport};
pub use crate::matching::engine::{IdentificationEngine, IdentificationResult};
