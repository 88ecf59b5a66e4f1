//! Command-line interface for antigram-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **identify**: Classify markers from a patient's panel reactions
//! - **coverage**: Check that every panel marker is covered by a rule
//! - **rules**: List, show, or export rule sets
//! - **panels**: List, show, import, or export panels
//! - **cells**: Find cells matching a marker pattern
//!
//! ## Usage
//!
//! ```text
//! # Identify with the embedded default rules
//! antigram-solver identify --panels panels.json --reactions patient.tsv
//!
//! # JSON output for scripting, skipping expired panels
//! antigram-solver identify --panels panels.json --reactions patient.tsv --exclude-expired --format json
//!
//! # Add a panel from a grid file to a catalog
//! antigram-solver panels import screen.tsv --id P3 --lot 8841 --catalog panels.json --output panels.json
//!
//! # Find D+ C0 cells to test next
//! antigram-solver cells --panels panels.json --pattern "D=+,C=0"
//! ```

use std::path::Path;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::catalog::rules::RuleBook;
use crate::catalog::store::PanelCatalog;

pub mod cells;
pub mod coverage;
pub mod identify;
pub mod panels;
pub mod rules;

#[derive(Parser)]
#[command(name = "antigram-solver")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Rule-based antibody identification from reagent panel reactions")]
#[command(
    long_about = "antigram-solver compares a patient's reactions against reagent panels (antigrams) with known marker expression.\n\nFor every marker on the panels it reports:\n- Ruled out, when an exclusion rule is satisfied\n- Matched, when the expression pattern concords with every reaction\n- Still to rule out, otherwise"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify antibodies from patient reactions
    Identify(identify::IdentifyArgs),

    /// Check rule coverage of the panel markers
    Coverage(coverage::CoverageArgs),

    /// Inspect rule sets
    Rules(rules::RulesArgs),

    /// Manage the panel catalog
    Panels(panels::PanelsArgs),

    /// Find cells matching a marker pattern
    Cells(cells::CellsArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Load a rule file, or the embedded defaults when no path is given
fn load_rules(path: Option<&Path>) -> anyhow::Result<RuleBook> {
    let book = match path {
        Some(path) => RuleBook::load_from_file(path)?,
        None => RuleBook::load_embedded()?,
    };
    Ok(book)
}

fn load_panels(path: &Path) -> anyhow::Result<PanelCatalog> {
    let catalog = PanelCatalog::load_from_file(path)?;
    if catalog.is_empty() {
        tracing::warn!("Panel catalog {} is empty", path.display());
    }
    Ok(catalog)
}

/// Expiry cutoff: `--as-of` if given, else today, only when exclusion is on
fn expiry_cutoff(exclude_expired: bool, as_of: Option<NaiveDate>) -> Option<NaiveDate> {
    exclude_expired.then(|| as_of.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

/// Helper function to convert usize count to f64 with explicit precision loss allowance
#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_cutoff() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(expiry_cutoff(false, Some(date)), None);
        assert_eq!(expiry_cutoff(true, Some(date)), Some(date));
        assert!(expiry_cutoff(true, None).is_some());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Panocell-10", 20), "Panocell-10");
        assert_eq!(truncate("Resolve Panel A Extended", 10), "Resolve...");
    }
}
