use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::panel::Panel;
use crate::core::reaction::PatientReactionSet;
use crate::core::types::{CellKey, PanelId, PatientReaction, ReactionSymbol};

/// Per-request lookup sets over panel expression and patient reactions.
///
/// Built once per identification call and dropped with it. All rule
/// evaluation and classification reduces to intersections and subset tests
/// over these sets.
#[derive(Debug, Default)]
pub struct ReactionIndex {
    /// Marker -> cells where it is `+`
    expressing: HashMap<String, HashSet<CellKey>>,

    /// Marker -> cells where it is `0`
    non_expressing: HashMap<String, HashSet<CellKey>>,

    /// Cells the patient reacted `+` to
    positive: HashSet<CellKey>,

    /// Cells the patient reacted `0` to
    negative: HashSet<CellKey>,

    /// Union of all panel markers
    universe: BTreeSet<String>,

    /// Panel -> lot label, for evidence records
    lots: HashMap<PanelId, String>,
}

impl ReactionIndex {
    /// Build the index from panels and the patient's reactions.
    ///
    /// Reactions recorded against panels not in `panels` are ignored.
    pub fn build<'a>(
        panels: impl IntoIterator<Item = &'a Panel>,
        reactions: &PatientReactionSet,
    ) -> Self {
        let mut index = Self::default();

        for panel in panels {
            index
                .lots
                .insert(panel.id.clone(), panel.lot_number.clone());

            for marker in &panel.markers {
                index.universe.insert(marker.clone());
                // Make sure every universe marker has (possibly empty) entries
                index.expressing.entry(marker.clone()).or_default();
                index.non_expressing.entry(marker.clone()).or_default();
            }

            // Only listed markers count; stray row entries are not evidence
            for cell in panel.cell_numbers() {
                let key = CellKey {
                    panel: panel.id.clone(),
                    cell,
                };
                for marker in &panel.markers {
                    match panel.symbol(cell, marker) {
                        ReactionSymbol::Expressed => {
                            index
                                .expressing
                                .entry(marker.clone())
                                .or_default()
                                .insert(key.clone());
                        }
                        ReactionSymbol::Absent => {
                            index
                                .non_expressing
                                .entry(marker.clone())
                                .or_default()
                                .insert(key.clone());
                        }
                        ReactionSymbol::NotTested => {}
                    }
                }
            }

            for (cell, reaction) in reactions.for_panel(&panel.id) {
                let key = CellKey {
                    panel: panel.id.clone(),
                    cell,
                };
                match reaction {
                    PatientReaction::Positive => index.positive.insert(key),
                    PatientReaction::Negative => index.negative.insert(key),
                };
            }
        }

        tracing::debug!(
            markers = index.universe.len(),
            positive = index.positive.len(),
            negative = index.negative.len(),
            "Built reaction index"
        );

        index
    }

    /// Every marker appearing as a column in at least one panel, sorted
    pub fn universe(&self) -> &BTreeSet<String> {
        &self.universe
    }

    /// Cells where `marker` is `+` (None if no panel lists the marker)
    pub fn expressing_cells(&self, marker: &str) -> Option<&HashSet<CellKey>> {
        self.expressing.get(marker)
    }

    /// Cells where `marker` is `0` (None if no panel lists the marker)
    pub fn non_expressing_cells(&self, marker: &str) -> Option<&HashSet<CellKey>> {
        self.non_expressing.get(marker)
    }

    /// Lot label of a panel, if the panel is indexed
    pub fn lot_number(&self, panel: &PanelId) -> Option<&str> {
        self.lots.get(panel).map(String::as_str)
    }

    /// Cells where `marker` is `+` and the patient reacted `0`
    pub fn expressed_negative(&self, marker: &str) -> BTreeSet<CellKey> {
        self.expressing_cells(marker)
            .into_iter()
            .flatten()
            .filter(|cell| self.negative.contains(*cell))
            .cloned()
            .collect()
    }

    /// Cells where `a` is `+`, `b` has symbol `b_symbol`, and the patient reacted `0`.
    ///
    /// Panels missing either marker contribute nothing, since their cells are in
    /// neither expression set for the missing marker.
    pub fn paired_negative(&self, a: &str, b: &str, b_symbol: ReactionSymbol) -> BTreeSet<CellKey> {
        let b_cells = match b_symbol {
            ReactionSymbol::Expressed => self.expressing_cells(b),
            ReactionSymbol::Absent => self.non_expressing_cells(b),
            ReactionSymbol::NotTested => None,
        };
        let (Some(a_cells), Some(b_cells)) = (self.expressing_cells(a), b_cells) else {
            return BTreeSet::new();
        };
        a_cells
            .iter()
            .filter(|cell| b_cells.contains(*cell) && self.negative.contains(*cell))
            .cloned()
            .collect()
    }

    /// A marker is a suspected antibody if a cell expressing it reacted `+`
    pub fn is_suspected_antibody(&self, marker: &str) -> bool {
        self.expressing_cells(marker)
            .is_some_and(|cells| !cells.is_disjoint(&self.positive))
    }

    /// Markers expressed on at least one cell that has any recorded patient reaction
    pub fn markers_with_observed_reactions(&self) -> BTreeSet<String> {
        self.expressing
            .iter()
            .filter(|(_, cells)| {
                cells
                    .iter()
                    .any(|c| self.positive.contains(c) || self.negative.contains(c))
            })
            .map(|(marker, _)| marker.clone())
            .collect()
    }

    /// Concordance statistics of one marker against the patient reactions
    pub fn concordance(&self, marker: &str) -> Concordance {
        // Universe markers always have both entries; anything else was never observed
        let (Some(expressing), Some(non_expressing)) =
            (self.expressing_cells(marker), self.non_expressing_cells(marker))
        else {
            return Concordance::default();
        };

        let positive_matches = expressing.intersection(&self.positive).count();
        let negative_matches = non_expressing.intersection(&self.negative).count();
        let mismatches = expressing.intersection(&self.negative).count()
            + non_expressing.intersection(&self.positive).count();
        // A cell can't be both + and 0 for one marker, so the union is a plain sum
        let total_cells = expressing.union(non_expressing).count();

        Concordance {
            total_cells,
            positive_matches,
            negative_matches,
            mismatches,
        }
    }

    /// Every `+` cell reacted `+` and every `0` cell reacted `0`
    pub fn is_perfect_match(&self, marker: &str) -> bool {
        self.expressing_cells(marker)
            .map_or(true, |cells| cells.is_subset(&self.positive))
            && self
                .non_expressing_cells(marker)
                .map_or(true, |cells| cells.is_subset(&self.negative))
    }
}

/// Raw concordance counts for one marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Concordance {
    pub total_cells: usize,
    pub positive_matches: usize,
    pub negative_matches: usize,
    pub mismatches: usize,
}

impl Concordance {
    /// Percentage of observed cells that concord (0 when nothing was observed)
    pub fn match_percentage(&self) -> f64 {
        if self.total_cells == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)] // Cell counts are far below 2^52
        let pct = (self.positive_matches + self.negative_matches) as f64
            / self.total_cells as f64
            * 100.0;
        pct
    }
}
