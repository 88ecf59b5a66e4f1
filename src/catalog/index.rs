use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::panel::CellRow;
use crate::core::types::{PanelId, ReactionSymbol};
use crate::parsing::tsv::ParseError;
use crate::utils::validation::normalize_marker_name;

use super::store::PanelCatalog;

/// Required symbol per marker, e.g. `D=+, C=0`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellPattern {
    pub required: BTreeMap<String, ReactionSymbol>,
}

impl CellPattern {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, marker: impl Into<String>, symbol: ReactionSymbol) -> Self {
        self.required.insert(marker.into(), symbol);
        self
    }

    /// Parse `MARKER=SYMBOL` terms separated by commas or whitespace
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` for terms without `=`, bad marker
    /// names, or an empty pattern, and `ParseError::InvalidSymbol` for symbols
    /// other than `+`, `0`, `-`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut pattern = Self::new();
        for (i, term) in text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .enumerate()
        {
            let (marker, symbol) = term.split_once('=').ok_or_else(|| {
                ParseError::InvalidFormat(format!("Expected MARKER=SYMBOL, found '{term}'"))
            })?;
            let marker = normalize_marker_name(marker).ok_or_else(|| {
                ParseError::InvalidFormat(format!("Invalid marker name '{marker}'"))
            })?;
            // An empty symbol is a typo here, not "not tested"
            let symbol = match symbol.trim() {
                "" => None,
                s => ReactionSymbol::parse(s),
            }
            .ok_or_else(|| ParseError::InvalidSymbol {
                line: i + 1,
                value: symbol.to_string(),
            })?;
            pattern.required.insert(marker, symbol);
        }
        if pattern.required.is_empty() {
            return Err(ParseError::InvalidFormat("Empty cell pattern".to_string()));
        }
        Ok(pattern)
    }
}

impl std::fmt::Display for CellPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let terms: Vec<String> = self
            .required
            .iter()
            .map(|(m, s)| format!("{m}={s}"))
            .collect();
        write!(f, "{}", terms.join(","))
    }
}

/// A cell satisfying a [`CellPattern`]
#[derive(Debug, Clone, Serialize)]
pub struct CellMatch {
    pub panel: PanelId,
    pub panel_name: String,
    pub lot_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    pub cell: u32,
    /// The full row, for display
    pub row: CellRow,
}

/// Finds cells across the catalog whose marker symbols match a pattern
pub struct CellFinder<'a> {
    catalog: &'a PanelCatalog,
    exclude_expired_on: Option<NaiveDate>,
}

impl<'a> CellFinder<'a> {
    pub fn new(catalog: &'a PanelCatalog) -> Self {
        Self {
            catalog,
            exclude_expired_on: None,
        }
    }

    /// Skip panels that expired strictly before `on`
    #[must_use]
    pub fn excluding_expired(mut self, on: NaiveDate) -> Self {
        self.exclude_expired_on = Some(on);
        self
    }

    /// All matching cells, ordered by (panel, cell). A marker a panel does not
    /// list reads as `-` on every cell of that panel.
    pub fn find(&self, pattern: &CellPattern) -> Vec<CellMatch> {
        let mut matches: Vec<CellMatch> = self
            .catalog
            .panels
            .iter()
            .filter(|panel| match self.exclude_expired_on {
                Some(on) => !panel.is_expired(on),
                None => true,
            })
            .flat_map(|panel| {
                panel
                    .cells
                    .iter()
                    .filter(|(&cell, _)| {
                        pattern
                            .required
                            .iter()
                            .all(|(marker, &symbol)| panel.symbol(cell, marker) == symbol)
                    })
                    .map(|(&cell, row)| CellMatch {
                        panel: panel.id.clone(),
                        panel_name: panel.name.clone(),
                        lot_number: panel.lot_number.clone(),
                        expiration_date: panel.expiration_date,
                        cell,
                        row: row.clone(),
                    })
            })
            .collect();

        matches.sort_by(|a, b| (&a.panel, a.cell).cmp(&(&b.panel, b.cell)));
        tracing::debug!("Pattern {pattern} matched {} cells", matches.len());
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::panel::Panel;

    fn make_catalog() -> PanelCatalog {
        let mut catalog = PanelCatalog::new();
        catalog
            .add_panel(
                Panel::new("P1", "LOT-A")
                    .with_markers(["D", "C", "K"])
                    .with_cell_str(1, "++0")
                    .with_cell_str(2, "+0+")
                    .with_cell_str(3, "00-"),
            )
            .unwrap();
        catalog
            .add_panel(
                Panel::new("P2", "LOT-B")
                    .with_markers(["D"])
                    .with_cell_str(1, "+")
                    .with_expiration(NaiveDate::from_ymd_opt(2020, 6, 30).unwrap()),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_parse_pattern() {
        let pattern = CellPattern::parse("D=+, C=0 K=-").unwrap();
        assert_eq!(pattern.required.len(), 3);
        assert_eq!(pattern.required["C"], ReactionSymbol::Absent);
        assert_eq!(pattern.to_string(), "C=0,D=+,K=-");
    }

    #[test]
    fn test_parse_pattern_errors() {
        assert!(CellPattern::parse("").is_err());
        assert!(CellPattern::parse("D").is_err());
        assert!(matches!(
            CellPattern::parse("D=x"),
            Err(ParseError::InvalidSymbol { .. })
        ));
        assert!(matches!(
            CellPattern::parse("D="),
            Err(ParseError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_find_across_panels() {
        let catalog = make_catalog();
        let finder = CellFinder::new(&catalog);
        let found = finder.find(&CellPattern::new().with("D", ReactionSymbol::Expressed));
        let keys: Vec<(&str, u32)> = found.iter().map(|m| (m.panel.as_str(), m.cell)).collect();
        assert_eq!(keys, vec![("P1", 1), ("P1", 2), ("P2", 1)]);
    }

    #[test]
    fn test_find_combined_pattern() {
        let catalog = make_catalog();
        let found = CellFinder::new(&catalog).find(&CellPattern::parse("D=+,C=0").unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cell, 2);
        assert_eq!(found[0].lot_number, "LOT-A");
    }

    #[test]
    fn test_missing_marker_reads_not_tested() {
        let catalog = make_catalog();
        let found = CellFinder::new(&catalog).find(&CellPattern::parse("K=-").unwrap());
        // P1 cell 3 has K=-, P2 does not list K at all
        let keys: Vec<(&str, u32)> = found.iter().map(|m| (m.panel.as_str(), m.cell)).collect();
        assert_eq!(keys, vec![("P1", 3), ("P2", 1)]);
    }

    #[test]
    fn test_excluding_expired() {
        let catalog = make_catalog();
        let found = CellFinder::new(&catalog)
            .excluding_expired(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .find(&CellPattern::parse("D=+").unwrap());
        assert!(found.iter().all(|m| m.panel.as_str() == "P1"));
        assert_eq!(found.len(), 2);
    }
}
