use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::catalog::store::PanelCatalog;
use crate::cli::{count_to_f64, load_panels, truncate, OutputFormat};
use crate::core::types::PanelId;
use crate::parsing::tsv::parse_panel_grid_file;

#[derive(Args)]
pub struct PanelsArgs {
    #[command(subcommand)]
    pub command: PanelsCommands,
}

#[derive(Subcommand)]
pub enum PanelsCommands {
    /// List all panels in a catalog
    List {
        /// Panel catalog JSON file
        #[arg(long, required = true)]
        catalog: PathBuf,

        /// Only panels listing this marker
        #[arg(long)]
        marker: Option<String>,
    },

    /// Show the grid of one panel
    Show {
        /// Panel ID
        #[arg(required = true)]
        id: String,

        /// Panel catalog JSON file
        #[arg(long, required = true)]
        catalog: PathBuf,
    },

    /// Import a panel grid (TSV/CSV) into a catalog
    Import {
        /// Grid file: header `cell, marker...`, one row per cell
        #[arg(required = true)]
        grid: PathBuf,

        /// Panel ID
        #[arg(long, required = true)]
        id: String,

        /// Lot number
        #[arg(long, required = true)]
        lot: String,

        /// Template or display name
        #[arg(long)]
        name: Option<String>,

        /// Expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<NaiveDate>,

        /// Existing catalog to add to (a new catalog is created otherwise)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output catalog file
        #[arg(short, long, required = true)]
        output: PathBuf,
    },

    /// Export a catalog to a file (re-stamped with the current version)
    Export {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Panel catalog JSON file
        #[arg(long, required = true)]
        catalog: PathBuf,
    },
}

/// Execute panels subcommand
///
/// # Errors
///
/// Returns an error if a catalog or grid cannot be loaded or written, or the
/// requested panel does not exist.
pub fn run(args: PanelsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        PanelsCommands::List { catalog, marker } => {
            run_list(catalog, marker.as_deref(), format, verbose)
        }
        PanelsCommands::Show { id, catalog } => run_show(&id, catalog, format),
        PanelsCommands::Import {
            grid,
            id,
            lot,
            name,
            expires,
            catalog,
            output,
        } => run_import(grid, &id, &lot, name, expires, catalog, output, verbose),
        PanelsCommands::Export { output, catalog } => run_export(output, catalog),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn run_list(
    catalog_path: PathBuf,
    marker_filter: Option<&str>,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let catalog = load_panels(&catalog_path)?;

    let filtered: Vec<_> = match marker_filter {
        Some(marker) => catalog.panels_with_marker(marker),
        None => catalog.panels.iter().collect(),
    };

    match format {
        OutputFormat::Text => {
            let id_width = filtered
                .iter()
                .map(|p| p.id.0.len())
                .max()
                .unwrap_or(2)
                .max(2);
            let name_width = filtered
                .iter()
                .map(|p| p.name.len().min(30))
                .max()
                .unwrap_or(4)
                .max(4);
            let lot_width = filtered
                .iter()
                .map(|p| p.lot_number.len())
                .max()
                .unwrap_or(3)
                .max(3);

            println!("Panel Catalog ({} panels)\n", filtered.len());
            println!(
                "{:<id_w$} {:<name_w$} {:<lot_w$} {:<10} {:>5} {:>7}",
                "ID",
                "Name",
                "Lot",
                "Expires",
                "Cells",
                "Markers",
                id_w = id_width,
                name_w = name_width,
                lot_w = lot_width
            );
            println!("{}", "-".repeat(id_width + name_width + lot_width + 28));

            for p in &filtered {
                let expires = p
                    .expiration_date
                    .map_or_else(|| "-".to_string(), |d| d.to_string());
                println!(
                    "{:<id_w$} {:<name_w$} {:<lot_w$} {:<10} {:>5} {:>7}",
                    p.id.0,
                    truncate(&p.name, name_width),
                    p.lot_number,
                    expires,
                    p.cell_count(),
                    p.markers.len(),
                    id_w = id_width,
                    name_w = name_width,
                    lot_w = lot_width
                );
                if verbose {
                    let slots = p.cell_count() * p.markers.len();
                    let tested: usize = p
                        .markers
                        .iter()
                        .map(|m| {
                            let counts = p.symbol_counts(m);
                            counts.expressed + counts.absent
                        })
                        .sum();
                    let tested_pct = if slots == 0 {
                        0.0
                    } else {
                        100.0 * count_to_f64(tested) / count_to_f64(slots)
                    };
                    println!(
                        "  └─ Tested: {tested}/{slots} ({tested_pct:.0}%)  Markers: {}",
                        p.markers.join(" ")
                    );
                }
            }
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = filtered
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.id.0,
                        "name": p.name,
                        "lot_number": p.lot_number,
                        "expiration_date": p.expiration_date,
                        "cells": p.cell_count(),
                        "markers": p.markers,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("id\tname\tlot_number\texpiration_date\tcells\tmarkers");
            for p in &filtered {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    p.id,
                    p.name,
                    p.lot_number,
                    p.expiration_date.map(|d| d.to_string()).unwrap_or_default(),
                    p.cell_count(),
                    p.markers.join(",")
                );
            }
        }
    }

    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn run_show(id: &str, catalog_path: PathBuf, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = load_panels(&catalog_path)?;
    let panel = catalog
        .get(&PanelId::new(id))
        .ok_or_else(|| anyhow::anyhow!("Panel '{}' not found", id))?;

    match format {
        OutputFormat::Text => {
            println!("Panel: {}\n", panel.id);
            if !panel.name.is_empty() {
                println!("Name:    {}", panel.name);
            }
            println!("Lot:     {}", panel.lot_number);
            if let Some(date) = panel.expiration_date {
                println!("Expires: {date}");
            }
            println!("Cells:   {}", panel.cell_count());

            println!();
            let header: Vec<String> = panel.markers.iter().map(|m| format!("{m:>4}")).collect();
            println!("{:>4} {}", "Cell", header.join(""));
            for cell in panel.cell_numbers() {
                let row: Vec<String> = panel
                    .markers
                    .iter()
                    .map(|m| format!("{:>4}", panel.symbol(cell, m).as_char()))
                    .collect();
                println!("{cell:>4} {}", row.join(""));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&panel)?);
        }
        OutputFormat::Tsv => {
            println!("cell\t{}", panel.markers.join("\t"));
            for cell in panel.cell_numbers() {
                let row: Vec<String> = panel
                    .markers
                    .iter()
                    .map(|m| panel.symbol(cell, m).to_string())
                    .collect();
                println!("{cell}\t{}", row.join("\t"));
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments, clippy::needless_pass_by_value)]
fn run_import(
    grid: PathBuf,
    id: &str,
    lot: &str,
    name: Option<String>,
    expires: Option<NaiveDate>,
    catalog_path: Option<PathBuf>,
    output: PathBuf,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut catalog = match &catalog_path {
        Some(path) => PanelCatalog::load_from_file(path)?,
        None => PanelCatalog::new(),
    };

    let mut panel = parse_panel_grid_file(&grid, id, lot)?;
    if let Some(name) = name {
        panel = panel.with_name(name);
    }
    if let Some(date) = expires {
        panel = panel.with_expiration(date);
    }

    if verbose {
        eprintln!(
            "Parsed {} cells x {} markers from {}",
            panel.cell_count(),
            panel.markers.len(),
            grid.display()
        );
    }

    catalog.add_panel(panel)?;
    std::fs::write(&output, catalog.to_json()?)?;

    println!(
        "Imported panel {id} (lot {lot}); catalog now has {} panels: {}",
        catalog.len(),
        output.display()
    );

    Ok(())
}

fn run_export(output: PathBuf, catalog_path: PathBuf) -> anyhow::Result<()> {
    let catalog = load_panels(&catalog_path)?;

    let json = catalog.to_json()?;
    std::fs::write(&output, json)?;

    println!(
        "Exported {} panels to {}",
        catalog.len(),
        output.display()
    );

    Ok(())
}
