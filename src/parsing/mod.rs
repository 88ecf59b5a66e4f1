//! Parsers for panel grids and patient reactions.
//!
//! Both formats are delimited text, tab-separated by default and
//! comma-separated for `.csv` files. Blank lines and lines starting with `#`
//! are skipped.
//!
//! ## Panel grid
//!
//! ```text
//! cell  D  C  E  K
//! 1     +  +  0  0
//! 2     +  0  +  -
//! ```
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | `+`    | Marker expressed |
//! | `0`    | Marker absent |
//! | `-` or empty | Not tested |
//!
//! ## Patient reactions
//!
//! ```text
//! panel  cell  reaction
//! P1     1     0
//! P1     2     +
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use antigram_solver::parsing::tsv::{parse_panel_grid_file, parse_reactions_file};
//! use std::path::Path;
//!
//! let panel = parse_panel_grid_file(Path::new("screen.tsv"), "P1", "LOT-42").unwrap();
//! let reactions = parse_reactions_file(Path::new("patient.tsv")).unwrap();
//! ```

pub mod tsv;

pub use tsv::ParseError;
