//! Core data types for antibody identification.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Panel`](panel::Panel): A reagent panel (antigram) with its cell-by-marker grid
//! - [`PatientReactionSet`](reaction::PatientReactionSet): The patient's reactions for one workup
//! - [`Rule`](rule::Rule) and [`RuleRecord`](rule::RuleRecord): Typed exclusion rules and
//!   the raw records they are loaded from
//! - [`CellKey`](types::CellKey), [`ReactionSymbol`](types::ReactionSymbol),
//!   [`PatientReaction`](types::PatientReaction), [`RuleType`](types::RuleType),
//!   [`Outcome`](types::Outcome): Identifiers and classification types
//!
//! ## Reaction Symbols
//!
//! | Symbol | Panel grid            | Patient reaction |
//! |--------|-----------------------|------------------|
//! | `+`    | marker expressed      | positive         |
//! | `0`    | marker absent         | negative         |
//! | `-`    | not tested            | (not allowed)    |
//!
//! Cells marked `-` for a marker contribute no evidence about that marker.

pub mod panel;
pub mod reaction;
pub mod rule;
pub mod types;
