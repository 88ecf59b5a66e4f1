use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::store::{CatalogError, CATALOG_VERSION};
use crate::core::rule::RuleRecord;

/// Serializable rule file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFileData {
    #[serde(default = "default_version")]
    pub version: String,
    pub rules: Vec<RuleRecord>,
}

fn default_version() -> String {
    CATALOG_VERSION.to_string()
}

/// A collection of raw rule records
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    pub records: Vec<RuleRecord>,
}

impl RuleBook {
    /// Load the embedded default rule set
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ParseError` if the embedded file is malformed
    /// (checked at build time, so this should not happen).
    pub fn load_embedded() -> Result<Self, CatalogError> {
        // Embedded at compile time via build.rs
        const EMBEDDED_RULES: &str = include_str!("../../rules/default_rules.json");
        Self::from_json(EMBEDDED_RULES)
    }

    /// Load rules from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a `{"rules": [...]}` document
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ParseError` on malformed JSON. Malformed rule
    /// parameters are not an error here; they are skipped when the records are
    /// converted into typed rules.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: RuleFileData = serde_json::from_str(json)?;
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                "Rule file version mismatch (expected {}, found {})",
                CATALOG_VERSION,
                data.version
            );
        }
        tracing::info!("Loaded {} rule records", data.rules.len());
        Ok(Self {
            records: data.rules,
        })
    }

    /// Enabled records only
    pub fn enabled_records(&self) -> Vec<RuleRecord> {
        self.records.iter().filter(|r| r.enabled).cloned().collect()
    }

    /// Export to JSON
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ParseError` if serialization fails.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let data = RuleFileData {
            version: CATALOG_VERSION.to_string(),
            rules: self.records.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{Rule, RuleError, RuleKind};
    use crate::core::types::RuleType;
    use crate::matching::engine::typed_rules;
    use serde_json::json;

    fn embedded_rules() -> Vec<Rule> {
        typed_rules(&RuleBook::load_embedded().unwrap().records)
    }

    #[test]
    fn test_load_embedded_rules() {
        let book = RuleBook::load_embedded().unwrap();
        assert!(!book.is_empty());
        // Every seeded rule is well-formed and enabled
        assert!(book.records.iter().all(|r| r.to_rule().is_ok()));
        assert_eq!(book.enabled_records().len(), book.len());
    }

    #[test]
    fn test_embedded_rules_contents() {
        let rules = embedded_rules();
        let has = |t: RuleType, target: &str| {
            rules
                .iter()
                .any(|r| r.rule_type() == t && r.target() == target)
        };
        assert!(has(RuleType::SingleMarker, "D"));
        assert!(has(RuleType::LowFrequency, "Kpa"));
        assert!(has(RuleType::Heterozygous, "K"));
        assert!(has(RuleType::AntibodySpecific, "C"));
        assert!(has(RuleType::Homozygous, "Fya"));

        let lub = rules
            .iter()
            .find(|r| r.rule_type() == RuleType::Homozygous && r.target() == "Lub")
            .unwrap();
        match &lub.kind {
            RuleKind::HomozygousPairRuleOut { pairs, .. } => {
                assert_eq!(pairs, &vec![("Lub".to_string(), "Lua".to_string())]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_malformed_records_skipped() {
        let book = RuleBook {
            records: vec![
                RuleRecord::new("single", "D", json!({"antigens": ["D"]})),
                RuleRecord::new("bogus", "E", json!({})),
                RuleRecord::new("lowf", "Kpa", json!({"antigens": ["Kpa"]})).disabled(),
            ],
        };
        assert_eq!(book.enabled_records().len(), 2);

        let rules = typed_rules(&book.enabled_records());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target(), "D");
        assert_eq!(
            book.records[1].to_rule(),
            Err(RuleError::UnknownType("bogus".to_string()))
        );
    }

    #[test]
    fn test_from_json_defaults() {
        let book = RuleBook::from_json(
            r#"{"rules": [{"rule_type": "single", "target_antigen": "D", "rule_data": {"antigens": ["D"]}}]}"#,
        )
        .unwrap();
        assert_eq!(book.len(), 1);
        assert!(book.records[0].enabled);
        assert_eq!(book.records[0].description, None);
    }

    #[test]
    fn test_to_json_roundtrip() {
        let book = RuleBook::load_embedded().unwrap();
        let reloaded = RuleBook::from_json(&book.to_json().unwrap()).unwrap();
        assert_eq!(reloaded.records, book.records);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            RuleBook::from_json("{not json"),
            Err(CatalogError::ParseError(_))
        ));
    }
}
