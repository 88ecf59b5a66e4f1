use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::core::panel::Panel;
use crate::core::reaction::PatientReactionSet;
use crate::core::types::{PanelId, PatientReaction, ReactionSymbol};
use crate::utils::validation::{
    check_cell_limit, check_marker_limit, check_reaction_limit, normalize_marker_name,
    MAX_CELLS, MAX_MARKERS, MAX_REACTIONS,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid symbol on line {line}: '{value}'")]
    InvalidSymbol { line: usize, value: String },

    #[error("Invalid cell number on line {line}: '{value}'")]
    InvalidCell { line: usize, value: String },

    #[error("Too many cells: {0} exceeds maximum allowed ({MAX_CELLS})")]
    TooManyCells(usize),

    #[error("Too many markers: {0} exceeds maximum allowed ({MAX_MARKERS})")]
    TooManyMarkers(usize),

    #[error("Too many reactions: {0} exceeds maximum allowed ({MAX_REACTIONS})")]
    TooManyReactions(usize),
}

/// Pick the delimiter from a file extension: `,` for `.csv`, tab otherwise
pub fn delimiter_for(path: &Path) -> char {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("csv") => ',',
        _ => '\t',
    }
}

/// Data lines of a file: (1-based line number, fields), skipping blanks and `#` comments
fn data_lines(text: &str, delimiter: char) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(move |(i, line)| {
        // Keep trailing empty fields; only strip the line ending and outer spaces
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return None;
        }
        Some((i + 1, line.split(delimiter).map(str::trim).collect()))
    })
}

/// Parse a panel grid file.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or other parse errors
/// if the content is invalid.
pub fn parse_panel_grid_file(
    path: &Path,
    id: &str,
    lot_number: &str,
) -> Result<Panel, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_panel_grid_text(&content, delimiter_for(path), id, lot_number)
}

/// Parse panel grid text: a header `cell, marker1, marker2, ...` followed by
/// one row per cell. Empty fields and short rows read as `-`.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for a missing or malformed header, rows
/// with too many fields, duplicate cells, or no cells at all;
/// `ParseError::InvalidSymbol` / `ParseError::InvalidCell` for bad values; and
/// the `TooMany*` variants when limits are exceeded.
pub fn parse_panel_grid_text(
    text: &str,
    delimiter: char,
    id: &str,
    lot_number: &str,
) -> Result<Panel, ParseError> {
    let mut lines = data_lines(text, delimiter);

    let (header_line, header) = lines
        .next()
        .ok_or_else(|| ParseError::InvalidFormat("No header found in panel grid".to_string()))?;
    let first = header.first().map(|s| s.to_lowercase()).unwrap_or_default();
    if first != "cell" {
        return Err(ParseError::InvalidFormat(format!(
            "Line {header_line}: header must start with 'cell', found '{first}'"
        )));
    }

    let mut markers = Vec::with_capacity(header.len() - 1);
    let mut seen = HashSet::new();
    for raw in &header[1..] {
        let marker = normalize_marker_name(raw).ok_or_else(|| {
            ParseError::InvalidFormat(format!("Line {header_line}: invalid marker name '{raw}'"))
        })?;
        if !seen.insert(marker.clone()) {
            return Err(ParseError::InvalidFormat(format!(
                "Line {header_line}: duplicate marker '{marker}'"
            )));
        }
        markers.push(marker);
    }
    if markers.is_empty() {
        return Err(ParseError::InvalidFormat(
            "Panel grid header lists no markers".to_string(),
        ));
    }
    if check_marker_limit(markers.len()).is_some() {
        return Err(ParseError::TooManyMarkers(markers.len()));
    }

    let mut panel = Panel::new(id, lot_number).with_markers(markers.iter().cloned());

    for (line_num, fields) in lines {
        if fields.len() > markers.len() + 1 {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has {} fields but the header has {}",
                fields.len(),
                markers.len() + 1
            )));
        }

        let cell = parse_cell_number(fields[0], line_num)?;
        if panel.cells.contains_key(&cell) {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num}: duplicate cell {cell}"
            )));
        }

        let mut row = Vec::with_capacity(markers.len());
        for (marker, value) in markers.iter().zip(&fields[1..]) {
            let symbol = ReactionSymbol::parse(value).ok_or_else(|| ParseError::InvalidSymbol {
                line: line_num,
                value: (*value).to_string(),
            })?;
            if symbol != ReactionSymbol::NotTested {
                row.push((marker.as_str(), symbol));
            }
        }

        // Check cell limit for DOS protection
        if check_cell_limit(panel.cell_count()).is_some() {
            return Err(ParseError::TooManyCells(panel.cell_count()));
        }

        panel.set_cell(cell, row);
    }

    if panel.cells.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No cells found in panel grid".to_string(),
        ));
    }

    tracing::debug!(
        "Parsed panel {id}: {} markers, {} cells",
        panel.markers.len(),
        panel.cell_count()
    );
    Ok(panel)
}

/// Parse a patient reactions file.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or other parse errors
/// if the content is invalid.
pub fn parse_reactions_file(path: &Path) -> Result<PatientReactionSet, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_reactions_text(&content, delimiter_for(path))
}

/// Parse patient reactions: `panel, cell, reaction` with an optional header.
/// A later row for the same (panel, cell) overwrites an earlier one. Empty
/// input yields an empty set.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for rows without three fields,
/// `ParseError::InvalidCell` / `ParseError::InvalidSymbol` for bad values, or
/// `ParseError::TooManyReactions` if the limit is exceeded.
pub fn parse_reactions_text(text: &str, delimiter: char) -> Result<PatientReactionSet, ParseError> {
    let mut reactions = PatientReactionSet::new();
    let mut rows = 0;
    let mut first_data_line = true;

    for (line_num, fields) in data_lines(text, delimiter) {
        // Check if first non-empty/non-comment line is a header
        if first_data_line {
            first_data_line = false;
            let first = fields.first().map(|s| s.to_lowercase()).unwrap_or_default();
            if first == "panel" || first == "panel_id" || first == "antigram" {
                continue;
            }
        }

        if fields.len() != 3 {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has {} fields, expected 3 (panel, cell, reaction)",
                fields.len()
            )));
        }
        if fields[0].is_empty() {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has an empty panel id"
            )));
        }

        let cell = parse_cell_number(fields[1], line_num)?;
        let reaction = PatientReaction::parse(fields[2]).ok_or_else(|| ParseError::InvalidSymbol {
            line: line_num,
            value: fields[2].to_string(),
        })?;

        if check_reaction_limit(rows).is_some() {
            return Err(ParseError::TooManyReactions(rows));
        }
        rows += 1;

        reactions.record(PanelId::new(fields[0]), cell, reaction);
    }

    Ok(reactions)
}

fn parse_cell_number(value: &str, line: usize) -> Result<u32, ParseError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ParseError::InvalidCell {
            line,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_panel_grid_text() {
        let tsv = "# Screen cells\ncell\tD\tC\tK\n1\t+\t0\t+\n2\t0\t\t0\n3\t+\t-\n";
        let panel = parse_panel_grid_text(tsv, '\t', "P1", "LOT-A").unwrap();
        assert_eq!(panel.markers, vec!["D", "C", "K"]);
        assert_eq!(panel.cell_count(), 3);
        assert_eq!(panel.symbol(1, "K"), ReactionSymbol::Expressed);
        // empty field and short row both read as not tested
        assert_eq!(panel.symbol(2, "C"), ReactionSymbol::NotTested);
        assert_eq!(panel.symbol(3, "K"), ReactionSymbol::NotTested);
    }

    #[test]
    fn test_parse_panel_grid_csv() {
        let csv = "cell,D,E\n1,+,0\n2,0,+\n";
        let panel = parse_panel_grid_text(csv, ',', "P2", "LOT-B").unwrap();
        assert_eq!(panel.symbol(2, "E"), ReactionSymbol::Expressed);
        assert_eq!(panel.lot_number, "LOT-B");
    }

    #[test]
    fn test_panel_grid_requires_header() {
        let err = parse_panel_grid_text("1\t+\t0\n", '\t', "P1", "L").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_panel_grid_invalid_symbol() {
        let err = parse_panel_grid_text("cell\tD\n1\tw\n", '\t', "P1", "L").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSymbol { line: 2, .. }));
    }

    #[test]
    fn test_panel_grid_invalid_cell() {
        let err = parse_panel_grid_text("cell\tD\n0\t+\n", '\t', "P1", "L").unwrap_err();
        assert!(matches!(err, ParseError::InvalidCell { line: 2, .. }));
    }

    #[test]
    fn test_panel_grid_duplicate_cell() {
        let err = parse_panel_grid_text("cell\tD\n1\t+\n1\t0\n", '\t', "P1", "L").unwrap_err();
        assert!(err.to_string().contains("duplicate cell 1"));
    }

    #[test]
    fn test_panel_grid_too_many_fields() {
        let err = parse_panel_grid_text("cell\tD\n1\t+\t0\n", '\t', "P1", "L").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_parse_reactions_text() {
        let tsv = "panel\tcell\treaction\nP1\t1\t0\nP1\t2\t+\nP2\t1\t0\nP1\t1\t+\n";
        let reactions = parse_reactions_text(tsv, '\t').unwrap();
        assert_eq!(reactions.len(), 3);
        // later row overwrites
        assert_eq!(
            reactions.get(&PanelId::new("P1"), 1),
            Some(PatientReaction::Positive)
        );
    }

    #[test]
    fn test_parse_reactions_no_header() {
        let reactions = parse_reactions_text("P1,1,0\nP1,2,+\n", ',').unwrap();
        assert_eq!(reactions.len(), 2);
    }

    #[test]
    fn test_parse_reactions_empty() {
        let reactions = parse_reactions_text("# nothing yet\n", '\t').unwrap();
        assert!(reactions.is_empty());
    }

    #[test]
    fn test_parse_reactions_rejects_not_tested() {
        let err = parse_reactions_text("P1\t1\t-\n", '\t').unwrap_err();
        assert!(matches!(err, ParseError::InvalidSymbol { line: 1, .. }));
    }

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for(Path::new("grid.csv")), ',');
        assert_eq!(delimiter_for(Path::new("grid.CSV")), ',');
        assert_eq!(delimiter_for(Path::new("grid.tsv")), '\t');
        assert_eq!(delimiter_for(Path::new("grid")), '\t');
    }
}
