use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;

use crate::catalog::index::{CellFinder, CellMatch, CellPattern};
use crate::cli::{expiry_cutoff, load_panels, OutputFormat};

#[derive(Args)]
pub struct CellsArgs {
    /// Panel catalog JSON file
    #[arg(long, required = true)]
    pub panels: PathBuf,

    /// Required symbols, e.g. "D=+,C=0,K=0"
    #[arg(short, long, required = true)]
    pub pattern: String,

    /// Leave out expired panels
    #[arg(long)]
    pub exclude_expired: bool,

    /// Date to check expiration against (YYYY-MM-DD, default today)
    #[arg(long, requires = "exclude_expired")]
    pub as_of: Option<NaiveDate>,
}

/// Execute cells subcommand
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the pattern is invalid.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: CellsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let pattern = CellPattern::parse(&args.pattern)?;
    let catalog = load_panels(&args.panels)?;

    let mut finder = CellFinder::new(&catalog);
    if let Some(on) = expiry_cutoff(args.exclude_expired, args.as_of) {
        finder = finder.excluding_expired(on);
    }
    let matches = finder.find(&pattern);

    if matches.is_empty() {
        eprintln!("No cells match {pattern}.");
        return Ok(());
    }

    match format {
        OutputFormat::Text => print_text_results(&matches, &pattern, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matches)?),
        OutputFormat::Tsv => print_tsv_results(&matches),
    }

    Ok(())
}

fn print_text_results(matches: &[CellMatch], pattern: &CellPattern, verbose: bool) {
    println!("Cells matching {pattern} ({} found)\n", matches.len());
    for m in matches {
        let expires = m
            .expiration_date
            .map(|d| format!(", expires {d}"))
            .unwrap_or_default();
        println!("   {} cell {} (lot {}{expires})", m.panel, m.cell, m.lot_number);
        if verbose {
            let row: Vec<String> = m.row.iter().map(|(marker, s)| format!("{marker}{s}")).collect();
            println!("     └─ {}", row.join(" "));
        }
    }
}

fn print_tsv_results(matches: &[CellMatch]) {
    println!("panel\tname\tlot_number\texpiration_date\tcell");
    for m in matches {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            m.panel,
            m.panel_name,
            m.lot_number,
            m.expiration_date.map(|d| d.to_string()).unwrap_or_default(),
            m.cell
        );
    }
}
