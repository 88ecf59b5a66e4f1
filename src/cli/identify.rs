use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;

use crate::cli::{expiry_cutoff, load_panels, load_rules, OutputFormat};
use crate::core::reaction::PatientReactionSet;
use crate::core::types::Outcome;
use crate::matching::engine::{
    typed_rules, EngineConfig, IdentificationEngine, IdentificationResult, MarkerSummary,
};
use crate::parsing::tsv::parse_reactions_file;

#[derive(Args)]
pub struct IdentifyArgs {
    /// Panel catalog JSON file
    #[arg(long, required = true)]
    pub panels: PathBuf,

    /// Patient reactions (TSV, or CSV by extension): panel, cell, reaction
    #[arg(long, required = true)]
    pub reactions: PathBuf,

    /// Rule file (defaults to the embedded rule set)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Leave out expired panels
    #[arg(long)]
    pub exclude_expired: bool,

    /// Date to check expiration against (YYYY-MM-DD, default today)
    #[arg(long, requires = "exclude_expired")]
    pub as_of: Option<NaiveDate>,

    /// Show a detailed summary for one marker instead of the full result
    #[arg(long)]
    pub marker: Option<String>,
}

/// Execute identify subcommand
///
/// # Errors
///
/// Returns an error if the panels, reactions or rules cannot be loaded.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: IdentifyArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_panels(&args.panels)?;
    let reactions = parse_reactions_file(&args.reactions)?;
    let book = load_rules(args.rules.as_deref())?;

    if verbose {
        eprintln!(
            "Loaded {} panels, {} reactions, {} rule records",
            catalog.len(),
            reactions.len(),
            book.len()
        );
    }

    let unknown: Vec<String> = reactions
        .panels()
        .filter(|id| catalog.get(id).is_none())
        .map(ToString::to_string)
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(
            "Ignoring reactions for panels not in the catalog: {}",
            unknown.join(", ")
        );
    }

    let config = EngineConfig {
        exclude_expired_on: expiry_cutoff(args.exclude_expired, args.as_of),
    };
    let engine = IdentificationEngine::with_config(config);
    let rules = typed_rules(&book.enabled_records());

    if let Some(marker) = &args.marker {
        let summary = engine.summarize_marker(marker, &catalog.panels, &reactions, &rules);
        match format {
            OutputFormat::Text => print_text_summary(&summary),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Tsv => print_tsv_summary(&summary),
        }
        return Ok(());
    }

    if reactions.is_empty() {
        eprintln!("No patient reactions recorded; nothing to identify.");
    }

    let result = engine.identify_snapshot(&catalog.panels, &reactions, &rules);

    match format {
        OutputFormat::Text => print_text_results(&result, &reactions, verbose),
        OutputFormat::Json => print_json_results(&result)?,
        OutputFormat::Tsv => print_tsv_results(&result),
    }

    Ok(())
}

fn join(markers: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let joined: Vec<String> = markers
        .into_iter()
        .map(|m| m.as_ref().to_string())
        .collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(", ")
    }
}

fn print_text_results(result: &IdentificationResult, reactions: &PatientReactionSet, verbose: bool) {
    println!("Antibody Identification ({} reactions)\n", reactions.len());
    println!("   Ruled out:         {}", join(&result.ruled_out));
    println!("   Still to rule out: {}", join(&result.suspect));
    println!("   Matched:           {}", join(&result.matched));
    println!(
        "   Suspected antibodies: {}",
        join(&result.suspected_antibodies)
    );

    if !result.progress.is_empty() {
        println!("\n{}", "─".repeat(60));
        println!(
            "\n   {:<8} {:<18} {:>5} {:>5} {:>5} {:>5} {:>7}",
            "Marker", "Status", "Cells", "Pos", "Neg", "Miss", "Match"
        );
        for (marker, progress) in &result.progress {
            let status = result
                .outcome(marker)
                .map_or_else(|| "-".to_string(), |o| o.to_string());
            println!(
                "   {:<8} {:<18} {:>5} {:>5} {:>5} {:>5} {:>6.1}%",
                marker,
                status,
                progress.total_cells,
                progress.positive_matches,
                progress.negative_matches,
                progress.mismatches,
                progress.match_percentage
            );
        }
    }

    if verbose && !result.ruled_out_details.is_empty() {
        println!("\n   Evidence:");
        for (marker, evidence) in &result.ruled_out_details {
            println!("   {marker}:");
            for e in evidence {
                println!("     └─ {} {e}", e.rule_type);
            }
        }
    }
}

fn print_json_results(result: &IdentificationResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn print_tsv_results(result: &IdentificationResult) {
    println!("marker\tstatus\ttotal_cells\tpositive_matches\tnegative_matches\tmismatches\tmatch_percentage\tevidence_count");
    let mut markers: Vec<&String> = result.progress.keys().collect();
    // Low-frequency targets absent from every panel are still reported
    for marker in &result.ruled_out {
        if !result.progress.contains_key(marker) {
            markers.push(marker);
        }
    }
    markers.sort();

    for marker in markers {
        let status = match result.outcome(marker) {
            Some(Outcome::RuledOut) => "ruled_out",
            Some(Outcome::Suspect) => "suspect",
            Some(Outcome::Matched) => "matched",
            None => "-",
        };
        let evidence = result.ruled_out_details.get(marker).map_or(0, Vec::len);
        match result.progress.get(marker) {
            Some(p) => println!(
                "{marker}\t{status}\t{}\t{}\t{}\t{}\t{:.2}\t{evidence}",
                p.total_cells, p.positive_matches, p.negative_matches, p.mismatches, p.match_percentage
            ),
            None => println!("{marker}\t{status}\t0\t0\t0\t0\t0.00\t{evidence}"),
        }
    }
}

fn print_text_summary(summary: &MarkerSummary) {
    println!("Marker: {}\n", summary.marker);
    println!("Cells observed:   {}", summary.total_cells);
    println!("Positive matches: {}", summary.positive_matches);
    println!("Negative matches: {}", summary.negative_matches);
    println!("Mismatches:       {}", summary.mismatches);
    println!("Match:            {:.1}%", summary.match_percentage);
    println!("Can be ruled out: {}", summary.can_be_ruled_out);
    println!("Meets match criteria: {}", summary.meets_match_criteria);
    println!("Rules:            {}", join(summary.applicable_rules.iter().map(ToString::to_string)));

    if !summary.ruling_out_cells.is_empty() {
        println!("\nRuling-out evidence:");
        for e in &summary.ruling_out_cells {
            println!("  {} {e}", e.rule_type);
        }
    }
}

fn print_tsv_summary(summary: &MarkerSummary) {
    println!("marker\ttotal_cells\tpositive_matches\tnegative_matches\tmismatches\tmatch_percentage\tcan_be_ruled_out\tmeets_match_criteria\trules");
    let rules: Vec<&str> = summary.applicable_rules.iter().map(|r| r.code()).collect();
    println!(
        "{}\t{}\t{}\t{}\t{}\t{:.2}\t{}\t{}\t{}",
        summary.marker,
        summary.total_cells,
        summary.positive_matches,
        summary.negative_matches,
        summary.mismatches,
        summary.match_percentage,
        summary.can_be_ruled_out,
        summary.meets_match_criteria,
        rules.join(",")
    );
}
