use std::path::PathBuf;

use clap::Args;

use crate::cli::{load_panels, load_rules, OutputFormat};
use crate::core::reaction::PatientReactionSet;
use crate::matching::coverage::{CoverageReport, CoverageValidator};
use crate::parsing::tsv::parse_reactions_file;

#[derive(Args)]
pub struct CoverageArgs {
    /// Panel catalog JSON file
    #[arg(long, required = true)]
    pub panels: PathBuf,

    /// Patient reactions, used to flag uncovered markers that were tested
    #[arg(long)]
    pub reactions: Option<PathBuf>,

    /// Rule file (defaults to the embedded rule set)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Exit with an error when any panel marker has no rule
    #[arg(long)]
    pub strict: bool,
}

/// Execute coverage subcommand
///
/// # Errors
///
/// Returns an error if inputs cannot be loaded, or with `--strict` when
/// coverage is incomplete.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: CoverageArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_panels(&args.panels)?;
    let reactions = match &args.reactions {
        Some(path) => parse_reactions_file(path)?,
        None => PatientReactionSet::new(),
    };
    let book = load_rules(args.rules.as_deref())?;

    if verbose {
        eprintln!(
            "Checking {} rule records against {} panels",
            book.len(),
            catalog.len()
        );
    }

    let report = CoverageValidator::new(&catalog.panels, &reactions).validate(&book.records);

    match format {
        OutputFormat::Text => print_text_report(&report, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Tsv => print_tsv_report(&report),
    }

    if args.strict && !report.validation_passed {
        anyhow::bail!(
            "{} panel markers have no rule: {}",
            report.missing.len(),
            report
                .missing
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}

fn print_text_report(report: &CoverageReport, verbose: bool) {
    println!("{report}");

    if verbose && !report.rules_by_target.is_empty() {
        println!("\nRules by marker:");
        for (marker, types) in &report.rules_by_target {
            let types: Vec<String> = types.iter().map(ToString::to_string).collect();
            println!("  {marker:<8} {}", types.join(", "));
        }
    }
}

fn print_tsv_report(report: &CoverageReport) {
    println!("marker\thas_rule\tcritical\trule_types");
    for marker in &report.markers_in_panels {
        let types = report
            .rules_by_target
            .get(marker)
            .map(|t| t.iter().map(|r| r.code()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        println!(
            "{marker}\t{}\t{}\t{types}",
            !report.missing.contains(marker),
            report.critical_missing.contains(marker)
        );
    }
}
