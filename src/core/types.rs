use serde::{Deserialize, Serialize};

/// Unique identifier for a panel in the catalog
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanelId(pub String);

impl PanelId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PanelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single cell of a single panel. This is the unit every index set is built over.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub panel: PanelId,
    pub cell: u32,
}

impl CellKey {
    pub fn new(panel: impl Into<String>, cell: u32) -> Self {
        Self {
            panel: PanelId::new(panel),
            cell,
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.panel, self.cell)
    }
}

/// Expression of a marker on a panel cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReactionSymbol {
    /// `+`: the marker is expressed
    #[serde(rename = "+")]
    Expressed,
    /// `0`: the marker is absent
    #[serde(rename = "0")]
    Absent,
    /// `-`: the marker was not tested on this cell
    #[serde(rename = "-")]
    #[default]
    NotTested,
}

impl ReactionSymbol {
    /// Parse a grid symbol. An empty field counts as not tested.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "+" => Some(Self::Expressed),
            "0" => Some(Self::Absent),
            "-" | "" => Some(Self::NotTested),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Expressed => '+',
            Self::Absent => '0',
            Self::NotTested => '-',
        }
    }
}

impl std::fmt::Display for ReactionSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Observed reaction of the patient's serum against a panel cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientReaction {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "0")]
    Negative,
}

impl PatientReaction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "+" => Some(Self::Positive),
            "0" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatientReaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "+"),
            Self::Negative => write!(f, "0"),
        }
    }
}

/// The kind of an exclusion rule, as stored in rule records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "single")]
    SingleMarker,
    #[serde(rename = "homo")]
    Homozygous,
    #[serde(rename = "hetero")]
    Heterozygous,
    #[serde(rename = "abspecific")]
    AntibodySpecific,
    #[serde(rename = "lowf")]
    LowFrequency,
}

impl RuleType {
    pub const ALL: [RuleType; 5] = [
        Self::SingleMarker,
        Self::Homozygous,
        Self::Heterozygous,
        Self::AntibodySpecific,
        Self::LowFrequency,
    ];

    /// Parse the storage name of a rule type (`single`, `homo`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "single" => Some(Self::SingleMarker),
            "homo" => Some(Self::Homozygous),
            "hetero" => Some(Self::Heterozygous),
            "abspecific" => Some(Self::AntibodySpecific),
            "lowf" => Some(Self::LowFrequency),
            _ => None,
        }
    }

    /// Storage name, as used in rule files
    pub fn code(self) -> &'static str {
        match self {
            Self::SingleMarker => "single",
            Self::Homozygous => "homo",
            Self::Heterozygous => "hetero",
            Self::AntibodySpecific => "abspecific",
            Self::LowFrequency => "lowf",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleMarker => write!(f, "SingleAG"),
            Self::Homozygous => write!(f, "Homozygous"),
            Self::Heterozygous => write!(f, "Heterozygous"),
            Self::AntibodySpecific => write!(f, "ABSpecificRO"),
            Self::LowFrequency => write!(f, "LowF"),
        }
    }
}

/// Final classification of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Excluded by at least one satisfied rule
    RuledOut,
    /// Neither excluded nor confirmed ("still to rule out")
    Suspect,
    /// Expression pattern concords with every patient reaction
    Matched,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuledOut => write!(f, "ruled out"),
            Self::Suspect => write!(f, "still to rule out"),
            Self::Matched => write!(f, "matched"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_symbol_parse() {
        assert_eq!(ReactionSymbol::parse("+"), Some(ReactionSymbol::Expressed));
        assert_eq!(ReactionSymbol::parse(" 0 "), Some(ReactionSymbol::Absent));
        assert_eq!(ReactionSymbol::parse("-"), Some(ReactionSymbol::NotTested));
        assert_eq!(ReactionSymbol::parse(""), Some(ReactionSymbol::NotTested));
        assert_eq!(ReactionSymbol::parse("w+"), None);
    }

    #[test]
    fn test_patient_reaction_rejects_not_tested() {
        assert_eq!(PatientReaction::parse("+"), Some(PatientReaction::Positive));
        assert_eq!(PatientReaction::parse("0"), Some(PatientReaction::Negative));
        assert_eq!(PatientReaction::parse("-"), None);
    }

    #[test]
    fn test_rule_type_codes_round_trip() {
        for rule_type in RuleType::ALL {
            assert_eq!(RuleType::parse(rule_type.code()), Some(rule_type));
        }
        assert_eq!(RuleType::parse("bogus"), None);
    }

    #[test]
    fn test_symbol_serde_uses_grid_characters() {
        let json = serde_json::to_string(&ReactionSymbol::Expressed).unwrap();
        assert_eq!(json, "\"+\"");
        let back: ReactionSymbol = serde_json::from_str("\"0\"").unwrap();
        assert_eq!(back, ReactionSymbol::Absent);
    }
}
