//! Storage interfaces consumed by the identification engine.
//!
//! Persistence lives outside this crate. A caller provides panels, the current
//! patient's reactions and the rule records through these traits; the in-memory
//! catalog types implement them so the CLI and tests can run without a store.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::rules::RuleBook;
use crate::catalog::store::PanelCatalog;
use crate::core::panel::Panel;
use crate::core::reaction::PatientReactionSet;
use crate::core::rule::RuleRecord;
use crate::core::types::{PanelId, PatientReaction};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub trait PanelSource {
    /// # Errors
    ///
    /// Returns `SourceError` when the panel store cannot be read.
    fn list_panels(&self) -> Result<Vec<Panel>, SourceError>;
}

pub trait ReactionSource {
    /// Reactions recorded against one panel (empty if none)
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the reaction store cannot be read.
    fn reactions_for_panel(
        &self,
        panel: &PanelId,
    ) -> Result<BTreeMap<u32, PatientReaction>, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` when the reaction store cannot be read.
    fn is_empty(&self) -> Result<bool, SourceError>;
}

pub trait RuleSource {
    /// Enabled rule records, malformed ones included
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the rule store cannot be read.
    fn enabled_rules(&self) -> Result<Vec<RuleRecord>, SourceError>;
}

impl PanelSource for PanelCatalog {
    fn list_panels(&self) -> Result<Vec<Panel>, SourceError> {
        Ok(self.panels.clone())
    }
}

impl PanelSource for [Panel] {
    fn list_panels(&self) -> Result<Vec<Panel>, SourceError> {
        Ok(self.to_vec())
    }
}

impl ReactionSource for PatientReactionSet {
    fn reactions_for_panel(
        &self,
        panel: &PanelId,
    ) -> Result<BTreeMap<u32, PatientReaction>, SourceError> {
        Ok(self.for_panel(panel))
    }

    fn is_empty(&self) -> Result<bool, SourceError> {
        Ok(PatientReactionSet::is_empty(self))
    }
}

impl RuleSource for RuleBook {
    fn enabled_rules(&self) -> Result<Vec<RuleRecord>, SourceError> {
        Ok(self.enabled_records())
    }
}

impl RuleSource for [RuleRecord] {
    fn enabled_rules(&self) -> Result<Vec<RuleRecord>, SourceError> {
        Ok(self.iter().filter(|r| r.enabled).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_set_as_source() {
        let set = PatientReactionSet::new().with_reaction("P1", 4, PatientReaction::Positive);
        assert!(!ReactionSource::is_empty(&set).unwrap());
        let p1 = set.reactions_for_panel(&PanelId::new("P1")).unwrap();
        assert_eq!(p1.get(&4), Some(&PatientReaction::Positive));
        assert!(set
            .reactions_for_panel(&PanelId::new("P9"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rule_slice_filters_disabled() {
        let records = vec![
            RuleRecord::new("lowf", "Kpa", serde_json::json!({"antigens": ["Kpa"]})),
            RuleRecord::new("lowf", "Jsa", serde_json::json!({"antigens": ["Jsa"]})).disabled(),
        ];
        let enabled = records.as_slice().enabled_rules().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].target_antigen, "Kpa");
    }
}
