use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{PanelId, PatientReaction};

/// Patient reactions for one workup: panel -> cell number -> reaction.
///
/// Created at the start of a workup and cleared at its end. Re-recording a
/// reaction for the same cell overwrites the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientReactionSet {
    reactions: BTreeMap<PanelId, BTreeMap<u32, PatientReaction>>,
}

impl PatientReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reaction(mut self, panel: &str, cell: u32, reaction: PatientReaction) -> Self {
        self.record(PanelId::new(panel), cell, reaction);
        self
    }

    /// Record (or overwrite) the reaction for one cell
    pub fn record(&mut self, panel: PanelId, cell: u32, reaction: PatientReaction) {
        self.reactions.entry(panel).or_default().insert(cell, reaction);
    }

    /// Remove one reaction, returning it if present
    pub fn remove(&mut self, panel: &PanelId, cell: u32) -> Option<PatientReaction> {
        let cells = self.reactions.get_mut(panel)?;
        let removed = cells.remove(&cell);
        if cells.is_empty() {
            self.reactions.remove(panel);
        }
        removed
    }

    /// Drop every reaction, ending the workup
    pub fn clear(&mut self) {
        self.reactions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.values().all(BTreeMap::is_empty)
    }

    /// Total number of recorded reactions across all panels
    pub fn len(&self) -> usize {
        self.reactions.values().map(BTreeMap::len).sum()
    }

    pub fn get(&self, panel: &PanelId, cell: u32) -> Option<PatientReaction> {
        self.reactions.get(panel)?.get(&cell).copied()
    }

    /// All reactions recorded against one panel (empty if none)
    pub fn for_panel(&self, panel: &PanelId) -> BTreeMap<u32, PatientReaction> {
        self.reactions.get(panel).cloned().unwrap_or_default()
    }

    pub fn panels(&self) -> impl Iterator<Item = &PanelId> {
        self.reactions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PanelId, u32, PatientReaction)> {
        self.reactions
            .iter()
            .flat_map(|(panel, cells)| cells.iter().map(move |(&cell, &r)| (panel, cell, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites() {
        let mut set = PatientReactionSet::new();
        set.record(PanelId::new("p1"), 1, PatientReaction::Positive);
        set.record(PanelId::new("p1"), 1, PatientReaction::Negative);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get(&PanelId::new("p1"), 1),
            Some(PatientReaction::Negative)
        );
    }

    #[test]
    fn test_remove_last_reaction_empties_set() {
        let mut set = PatientReactionSet::new().with_reaction("p1", 3, PatientReaction::Positive);
        assert!(!set.is_empty());
        assert_eq!(
            set.remove(&PanelId::new("p1"), 3),
            Some(PatientReaction::Positive)
        );
        assert!(set.is_empty());
        assert_eq!(set.panels().count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut set = PatientReactionSet::new()
            .with_reaction("p1", 1, PatientReaction::Positive)
            .with_reaction("p2", 1, PatientReaction::Negative);
        assert_eq!(set.len(), 2);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_for_panel_unknown_is_empty() {
        let set = PatientReactionSet::new().with_reaction("p1", 1, PatientReaction::Positive);
        assert!(set.for_panel(&PanelId::new("p9")).is_empty());
        assert_eq!(set.for_panel(&PanelId::new("p1")).len(), 1);
    }
}
