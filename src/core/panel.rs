use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::core::types::{PanelId, ReactionSymbol};

/// One row of a panel grid: marker name -> symbol
pub type CellRow = BTreeMap<String, ReactionSymbol>;

/// A reagent panel (antigram): a set of reference cells with known marker expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    /// Unique identifier
    pub id: PanelId,

    /// Manufacturer lot label
    pub lot_number: String,

    /// Template or display name (e.g., "Panocell-10")
    #[serde(default)]
    pub name: String,

    /// Date after which the panel must not be used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,

    /// Markers tested, in the order printed on the panel sheet
    pub markers: Vec<String>,

    /// Cell number -> marker -> symbol
    pub cells: BTreeMap<u32, CellRow>,

    /// Set of marker names (populated on load)
    #[serde(skip)]
    marker_set: HashSet<String>,
}

impl Panel {
    pub fn new(id: impl Into<String>, lot_number: impl Into<String>) -> Self {
        Self {
            id: PanelId::new(id),
            lot_number: lot_number.into(),
            name: String::new(),
            expiration_date: None,
            markers: Vec::new(),
            cells: BTreeMap::new(),
            marker_set: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_markers<S: Into<String>>(mut self, markers: impl IntoIterator<Item = S>) -> Self {
        self.markers = markers.into_iter().map(Into::into).collect();
        self.rebuild_indexes();
        self
    }

    /// Add a cell row. Symbols for markers not listed on the panel are dropped.
    #[must_use]
    pub fn with_cell<S: Into<String>>(
        mut self,
        cell: u32,
        symbols: impl IntoIterator<Item = (S, ReactionSymbol)>,
    ) -> Self {
        self.set_cell(cell, symbols);
        self
    }

    /// Add a cell from a compact symbol string aligned with `markers` (e.g. `"+0-+"`)
    #[cfg(test)]
    #[must_use]
    pub fn with_cell_str(self, cell: u32, symbols: &str) -> Self {
        let pairs: Vec<(String, ReactionSymbol)> = self
            .markers
            .iter()
            .zip(symbols.chars())
            .map(|(m, c)| {
                let symbol =
                    ReactionSymbol::parse(&c.to_string()).unwrap_or(ReactionSymbol::NotTested);
                (m.clone(), symbol)
            })
            .collect();
        self.with_cell(cell, pairs)
    }

    pub fn set_cell<S: Into<String>>(
        &mut self,
        cell: u32,
        symbols: impl IntoIterator<Item = (S, ReactionSymbol)>,
    ) {
        if self.marker_set.len() != self.markers.len() {
            self.rebuild_indexes();
        }
        let row: CellRow = symbols
            .into_iter()
            .map(|(m, s)| (m.into(), s))
            .filter(|(m, _)| self.marker_set.contains(m))
            .collect();
        self.cells.insert(cell, row);
    }

    /// Rebuild the marker set after deserializing or editing `markers`, and drop
    /// row entries for markers the panel does not list
    pub fn rebuild_indexes(&mut self) {
        self.marker_set = self.markers.iter().cloned().collect();
        let marker_set = &self.marker_set;
        for row in self.cells.values_mut() {
            row.retain(|marker, _| marker_set.contains(marker));
        }
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        if self.marker_set.is_empty() {
            return self.markers.iter().any(|m| m == marker);
        }
        self.marker_set.contains(marker)
    }

    /// Symbol at (cell, marker). Unknown cells, unknown markers, and gaps in a row
    /// all read as not tested.
    pub fn symbol(&self, cell: u32, marker: &str) -> ReactionSymbol {
        self.cells
            .get(&cell)
            .and_then(|row| row.get(marker))
            .copied()
            .unwrap_or_default()
    }

    pub fn cell_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.keys().copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// True if the panel expired strictly before `on`
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|exp| exp < on)
    }

    /// Count of `+`, `0` and `-` entries for one marker across all cells
    pub fn symbol_counts(&self, marker: &str) -> SymbolCounts {
        let mut counts = SymbolCounts::default();
        for cell in self.cell_numbers() {
            match self.symbol(cell, marker) {
                ReactionSymbol::Expressed => counts.expressed += 1,
                ReactionSymbol::Absent => counts.absent += 1,
                ReactionSymbol::NotTested => counts.not_tested += 1,
            }
        }
        counts
    }
}

/// Counts of symbols for one marker on one panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCounts {
    pub expressed: usize,
    pub absent: usize,
    pub not_tested: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_panel() -> Panel {
        Panel::new("p1", "LOT-42")
            .with_markers(["D", "C", "K"])
            .with_cell_str(1, "+0-")
            .with_cell_str(2, "0++")
    }

    #[test]
    fn test_symbol_lookup() {
        let panel = make_panel();
        assert_eq!(panel.symbol(1, "D"), ReactionSymbol::Expressed);
        assert_eq!(panel.symbol(1, "C"), ReactionSymbol::Absent);
        assert_eq!(panel.symbol(1, "K"), ReactionSymbol::NotTested);
        assert_eq!(panel.symbol(2, "K"), ReactionSymbol::Expressed);
    }

    #[test]
    fn test_missing_cell_or_marker_reads_not_tested() {
        let panel = make_panel();
        assert_eq!(panel.symbol(9, "D"), ReactionSymbol::NotTested);
        assert_eq!(panel.symbol(1, "Fya"), ReactionSymbol::NotTested);
        assert!(!panel.has_marker("Fya"));
        assert!(panel.has_marker("K"));
    }

    #[test]
    fn test_unlisted_markers_are_dropped_from_rows() {
        let panel = Panel::new("p1", "L1")
            .with_markers(["D"])
            .with_cell(1, [("D", ReactionSymbol::Expressed), ("E", ReactionSymbol::Absent)]);
        assert_eq!(panel.cells[&1].len(), 1);
    }

    #[test]
    fn test_expiration() {
        let exp = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let panel = make_panel().with_expiration(exp);
        assert!(!panel.is_expired(exp));
        assert!(panel.is_expired(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()));
        assert!(!make_panel().is_expired(exp));
    }

    #[test]
    fn test_symbol_counts() {
        let counts = make_panel().symbol_counts("K");
        assert_eq!(counts.expressed, 1);
        assert_eq!(counts.not_tested, 1);
        assert_eq!(counts.absent, 0);
    }

    #[test]
    fn test_json_round_trip_keeps_grid() {
        let panel = make_panel();
        let json = serde_json::to_string(&panel).unwrap();
        let mut back: Panel = serde_json::from_str(&json).unwrap();
        back.rebuild_indexes();
        assert_eq!(back.symbol(2, "C"), ReactionSymbol::Expressed);
        assert!(back.has_marker("D"));
    }

    #[test]
    fn test_rebuild_drops_unlisted_row_entries() {
        let mut panel: Panel = serde_json::from_str(
            r#"{"id": "P1", "lot_number": "L", "markers": ["D"],
                "cells": {"1": {"D": "+", "Kpa": "+"}, "2": {"D": "0", "Kpa": "+"}}}"#,
        )
        .unwrap();
        panel.rebuild_indexes();
        assert_eq!(panel.symbol(1, "D"), ReactionSymbol::Expressed);
        assert_eq!(panel.symbol(2, "Kpa"), ReactionSymbol::NotTested);
        assert!(panel.cells.values().all(|row| !row.contains_key("Kpa")));
    }
}
