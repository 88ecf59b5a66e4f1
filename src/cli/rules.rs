use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::{load_rules, truncate, OutputFormat};
use crate::core::rule::RuleRecord;
use crate::core::types::RuleType;

#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules
    List {
        /// Path to a rule file (defaults to embedded)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Filter by rule type (single, homo, hetero, abspecific, lowf)
        #[arg(long = "type")]
        rule_type: Option<String>,

        /// Include disabled rules
        #[arg(long)]
        all: bool,
    },

    /// Show the rules targeting one marker
    Show {
        /// Target marker (e.g., "Fya")
        #[arg(required = true)]
        marker: String,

        /// Path to a rule file (defaults to embedded)
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Export a rule set to a file
    Export {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Path to a rule file to export (defaults to embedded)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

/// Execute rules subcommand
///
/// # Errors
///
/// Returns an error if the rule file cannot be loaded or written, or the
/// requested marker or type is unknown.
pub fn run(args: RulesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        RulesCommands::List {
            rules,
            rule_type,
            all,
        } => run_list(rules, rule_type.as_deref(), all, format, verbose),
        RulesCommands::Show { marker, rules } => run_show(&marker, rules, format),
        RulesCommands::Export { output, rules } => run_export(output, rules),
    }
}

/// One-line rendering of a record: typed form if well-formed, the error otherwise
fn describe(record: &RuleRecord) -> String {
    match record.to_rule() {
        Ok(rule) => rule.kind.to_string(),
        Err(e) => format!("INVALID: {e}"),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn run_list(
    rules_path: Option<PathBuf>,
    type_filter: Option<&str>,
    include_disabled: bool,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let book = load_rules(rules_path.as_deref())?;

    let type_filter = type_filter
        .map(|t| RuleType::parse(t).ok_or_else(|| anyhow::anyhow!("Unknown rule type '{t}'")))
        .transpose()?;

    let filtered: Vec<&RuleRecord> = book
        .records
        .iter()
        .filter(|r| include_disabled || r.enabled)
        .filter(|r| match type_filter {
            Some(t) => RuleType::parse(&r.rule_type) == Some(t),
            None => true,
        })
        .collect();

    match format {
        OutputFormat::Text => {
            let target_width = filtered
                .iter()
                .map(|r| r.target_antigen.len())
                .max()
                .unwrap_or(6)
                .max(6);

            println!("Rule Set ({} rules)\n", filtered.len());
            println!(
                "{:<t_w$} {:<10} {:<8} Rule",
                "Target",
                "Type",
                "Enabled",
                t_w = target_width
            );
            println!("{}", "-".repeat(target_width + 50));
            for r in &filtered {
                println!(
                    "{:<t_w$} {:<10} {:<8} {}",
                    r.target_antigen,
                    r.rule_type,
                    if r.enabled { "yes" } else { "no" },
                    truncate(&describe(r), 60),
                    t_w = target_width
                );
                if verbose {
                    if let Some(desc) = &r.description {
                        println!("  └─ {desc}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        OutputFormat::Tsv => {
            println!("target\ttype\tenabled\trule\tdescription");
            for r in &filtered {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    r.target_antigen,
                    r.rule_type,
                    r.enabled,
                    describe(r),
                    r.description.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn run_show(marker: &str, rules_path: Option<PathBuf>, format: OutputFormat) -> anyhow::Result<()> {
    let book = load_rules(rules_path.as_deref())?;
    let targeting: Vec<&RuleRecord> = book
        .records
        .iter()
        .filter(|r| r.target_antigen == marker)
        .collect();

    if targeting.is_empty() {
        anyhow::bail!("No rules target '{marker}'");
    }

    match format {
        OutputFormat::Text => {
            println!("Rules for {marker}: {}\n", targeting.len());
            for r in &targeting {
                let state = if r.enabled { "" } else { " (disabled)" };
                println!("  {}{state}", describe(r));
                if let Some(desc) = &r.description {
                    println!("    {desc}");
                }
                println!("    data: {}", r.rule_data);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&targeting)?);
        }
        OutputFormat::Tsv => {
            println!("type\tenabled\trule\trule_data");
            for r in &targeting {
                println!("{}\t{}\t{}\t{}", r.rule_type, r.enabled, describe(r), r.rule_data);
            }
        }
    }

    Ok(())
}

fn run_export(output: PathBuf, rules_path: Option<PathBuf>) -> anyhow::Result<()> {
    let book = load_rules(rules_path.as_deref())?;

    let json = book.to_json()?;
    std::fs::write(&output, json)?;

    println!("Exported {} rules to {}", book.len(), output.display());

    Ok(())
}
