//! Panel and rule storage, lookup, and the storage interfaces the engine consumes.
//!
//! - [`store::PanelCatalog`]: reagent panels loaded from a versioned JSON file
//! - [`rules::RuleBook`]: raw rule records, from the embedded default set or a file
//! - [`index::CellFinder`]: find cells matching a marker pattern, e.g. `D=+,C=0`
//! - [`source`]: traits a persistent store implements to feed identification
//!
//! ## Embedded Rules
//!
//! The default rule set is compiled into the binary and covers the common
//! Rh, Kell, Duffy, Kidd, MNS, Lewis and Lutheran markers, plus low-frequency
//! markers that are always excluded.
//!
//! ## Example
//!
//! ```rust,no_run
//! use antigram_solver::{PanelCatalog, RuleBook};
//! use antigram_solver::catalog::index::{CellFinder, CellPattern};
//! use std::path::Path;
//!
//! let catalog = PanelCatalog::load_from_file(Path::new("panels.json")).unwrap();
//! let rules = RuleBook::load_embedded().unwrap();
//! println!("{} panels, {} rules", catalog.len(), rules.len());
//!
//! // Cells that are D+ and C0, to test next
//! let pattern = CellPattern::parse("D=+,C=0").unwrap();
//! for m in CellFinder::new(&catalog).find(&pattern) {
//!     println!("{} cell {}", m.lot_number, m.cell);
//! }
//! ```
//!
//! ## Custom Rule Sets
//!
//! ```rust,no_run
//! use antigram_solver::RuleBook;
//! use std::path::Path;
//!
//! // Export the defaults, edit, and load them back
//! let json = RuleBook::load_embedded().unwrap().to_json().unwrap();
//! let custom = RuleBook::load_from_file(Path::new("my_rules.json")).unwrap();
//! ```

pub mod index;
pub mod rules;
pub mod source;
pub mod store;
