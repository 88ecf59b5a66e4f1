//! Exclusion rules: raw storage records and the typed rules they convert into.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::types::RuleType;

/// Default threshold for heterozygous rules when a record omits `required_count`
pub const DEFAULT_HETEROZYGOUS_COUNT: usize = 3;

/// Default threshold for antibody-specific rules when a record omits `required_count`
pub const DEFAULT_ANTIBODY_SPECIFIC_COUNT: usize = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Unknown rule type '{0}'")]
    UnknownType(String),

    #[error("Rule has an empty target antigen")]
    EmptyTarget,

    #[error("{rule_type} rule for {target} is missing '{field}'")]
    MissingField {
        rule_type: RuleType,
        target: String,
        field: &'static str,
    },

    #[error("{rule_type} rule for {target} has an invalid '{field}': {reason}")]
    InvalidField {
        rule_type: RuleType,
        target: String,
        field: &'static str,
        reason: String,
    },

    #[error("{rule_type} rule targets {target} but its data names {found}")]
    TargetMismatch {
        rule_type: RuleType,
        target: String,
        found: String,
    },
}

/// A rule as stored: type code, target, and a free-form parameter blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub rule_type: String,
    pub target_antigen: String,
    #[serde(default)]
    pub rule_data: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl RuleRecord {
    pub fn new(rule_type: impl Into<String>, target: impl Into<String>, rule_data: Value) -> Self {
        Self {
            rule_type: rule_type.into(),
            target_antigen: target.into(),
            rule_data,
            enabled: true,
            description: None,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Convert into a typed rule, validating the parameter blob
    ///
    /// # Errors
    ///
    /// Returns a `RuleError` if the type is unknown, a required parameter is
    /// missing or has the wrong shape, or the parameters disagree with the target.
    pub fn to_rule(&self) -> Result<Rule, RuleError> {
        Rule::try_from(self)
    }
}

/// Exclusion condition of a rule, one variant per rule type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Exclude `target` when any cell expressing it reacts negative
    SingleMarkerRuleOut { target: String },

    /// Exclude `target` (= A) when a cell with A=+, B=0 reacts negative, for any pair (A,B)
    HomozygousPairRuleOut {
        target: String,
        pairs: Vec<(String, String)>,
    },

    /// Exclude `target` (= A) when at least `required_count` cells with A=+, B=+ react negative
    HeterozygousRuleOut {
        target: String,
        paired: String,
        required_count: usize,
    },

    /// Like heterozygous, but only while `antibody` is itself suspected
    AntibodySpecificRuleOut {
        target: String,
        antibody: String,
        antigen1: String,
        antigen2: String,
        required_count: usize,
    },

    /// Always exclude `target` (rare in the population)
    LowFrequencyAutoRuleOut { target: String },
}

impl RuleKind {
    pub fn target(&self) -> &str {
        match self {
            Self::SingleMarkerRuleOut { target }
            | Self::HomozygousPairRuleOut { target, .. }
            | Self::HeterozygousRuleOut { target, .. }
            | Self::AntibodySpecificRuleOut { target, .. }
            | Self::LowFrequencyAutoRuleOut { target } => target,
        }
    }

    pub fn rule_type(&self) -> RuleType {
        match self {
            Self::SingleMarkerRuleOut { .. } => RuleType::SingleMarker,
            Self::HomozygousPairRuleOut { .. } => RuleType::Homozygous,
            Self::HeterozygousRuleOut { .. } => RuleType::Heterozygous,
            Self::AntibodySpecificRuleOut { .. } => RuleType::AntibodySpecific,
            Self::LowFrequencyAutoRuleOut { .. } => RuleType::LowFrequency,
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleMarkerRuleOut { target } => write!(f, "SingleAG({target})"),
            Self::HomozygousPairRuleOut { target, pairs } => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .filter(|(a, _)| a == target)
                    .map(|(a, b)| format!("({a},{b})"))
                    .collect();
                write!(f, "Homo[{}]", pairs.join(","))
            }
            Self::HeterozygousRuleOut {
                target,
                paired,
                required_count,
            } => write!(f, "Hetero({target},{paired},{required_count})"),
            Self::AntibodySpecificRuleOut {
                antibody,
                antigen1,
                antigen2,
                required_count,
                ..
            } => write!(
                f,
                "ABSpecificRO({antibody},{antigen1},{antigen2},{required_count})"
            ),
            Self::LowFrequencyAutoRuleOut { target } => write!(f, "LowF({target})"),
        }
    }
}

/// A typed exclusion rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    #[serde(flatten)]
    pub kind: RuleKind,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            enabled: true,
            description: None,
        }
    }

    pub fn single(target: impl Into<String>) -> Self {
        Self::new(RuleKind::SingleMarkerRuleOut {
            target: target.into(),
        })
    }

    pub fn low_frequency(target: impl Into<String>) -> Self {
        Self::new(RuleKind::LowFrequencyAutoRuleOut {
            target: target.into(),
        })
    }

    pub fn homozygous<A: Into<String>, B: Into<String>>(
        target: impl Into<String>,
        pairs: impl IntoIterator<Item = (A, B)>,
    ) -> Self {
        Self::new(RuleKind::HomozygousPairRuleOut {
            target: target.into(),
            pairs: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        })
    }

    pub fn heterozygous(
        target: impl Into<String>,
        paired: impl Into<String>,
        required_count: usize,
    ) -> Self {
        Self::new(RuleKind::HeterozygousRuleOut {
            target: target.into(),
            paired: paired.into(),
            required_count,
        })
    }

    pub fn antibody_specific(
        antibody: impl Into<String>,
        antigen1: impl Into<String>,
        antigen2: impl Into<String>,
        required_count: usize,
    ) -> Self {
        let antigen1 = antigen1.into();
        Self::new(RuleKind::AntibodySpecificRuleOut {
            target: antigen1.clone(),
            antibody: antibody.into(),
            antigen1,
            antigen2: antigen2.into(),
            required_count,
        })
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn target(&self) -> &str {
        self.kind.target()
    }

    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }
}

impl TryFrom<&RuleRecord> for Rule {
    type Error = RuleError;

    fn try_from(record: &RuleRecord) -> Result<Self, Self::Error> {
        let rule_type = RuleType::parse(&record.rule_type)
            .ok_or_else(|| RuleError::UnknownType(record.rule_type.clone()))?;
        let target = record.target_antigen.trim().to_string();
        if target.is_empty() {
            return Err(RuleError::EmptyTarget);
        }
        let data = RuleData {
            rule_type,
            target: &target,
            value: &record.rule_data,
        };

        let kind = match rule_type {
            RuleType::SingleMarker => {
                data.require_listed("antigens")?;
                RuleKind::SingleMarkerRuleOut {
                    target: target.clone(),
                }
            }
            RuleType::LowFrequency => {
                data.require_listed("antigens")?;
                RuleKind::LowFrequencyAutoRuleOut {
                    target: target.clone(),
                }
            }
            RuleType::Homozygous => RuleKind::HomozygousPairRuleOut {
                target: target.clone(),
                pairs: data.pairs("antigen_pairs")?,
            },
            RuleType::Heterozygous => {
                let antigen_a = data.string("antigen_a")?;
                if antigen_a != target {
                    return Err(data.mismatch(antigen_a));
                }
                RuleKind::HeterozygousRuleOut {
                    target: target.clone(),
                    paired: data.string("antigen_b")?,
                    required_count: data.count("required_count", DEFAULT_HETEROZYGOUS_COUNT)?,
                }
            }
            RuleType::AntibodySpecific => {
                let antigen1 = data.string("antigen1")?;
                if antigen1 != target {
                    return Err(data.mismatch(antigen1));
                }
                RuleKind::AntibodySpecificRuleOut {
                    target: target.clone(),
                    antibody: data.string("antibody")?,
                    antigen1,
                    antigen2: data.string("antigen2")?,
                    required_count: data
                        .count("required_count", DEFAULT_ANTIBODY_SPECIFIC_COUNT)?,
                }
            }
        };

        Ok(Self {
            kind,
            enabled: record.enabled,
            description: record.description.clone(),
        })
    }
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        let rule_data = match &rule.kind {
            RuleKind::SingleMarkerRuleOut { target } | RuleKind::LowFrequencyAutoRuleOut { target } => {
                serde_json::json!({ "antigens": [target] })
            }
            RuleKind::HomozygousPairRuleOut { pairs, .. } => {
                let pairs: Vec<[&str; 2]> = pairs.iter().map(|(a, b)| [a.as_str(), b.as_str()]).collect();
                serde_json::json!({ "antigen_pairs": pairs })
            }
            RuleKind::HeterozygousRuleOut {
                target,
                paired,
                required_count,
            } => serde_json::json!({
                "antigen_a": target,
                "antigen_b": paired,
                "required_count": required_count,
            }),
            RuleKind::AntibodySpecificRuleOut {
                antibody,
                antigen1,
                antigen2,
                required_count,
                ..
            } => serde_json::json!({
                "antibody": antibody,
                "antigen1": antigen1,
                "antigen2": antigen2,
                "required_count": required_count,
            }),
        };

        Self {
            rule_type: rule.rule_type().code().to_string(),
            target_antigen: rule.target().to_string(),
            rule_data,
            enabled: rule.enabled,
            description: rule.description.clone(),
        }
    }
}

/// Field accessors over a rule's parameter blob that report errors in terms of the rule
struct RuleData<'a> {
    rule_type: RuleType,
    target: &'a str,
    value: &'a Value,
}

impl RuleData<'_> {
    fn field(&self, field: &'static str) -> Result<&Value, RuleError> {
        match self.value.get(field) {
            Some(Value::Null) | None => Err(RuleError::MissingField {
                rule_type: self.rule_type,
                target: self.target.to_string(),
                field,
            }),
            Some(v) => Ok(v),
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> RuleError {
        RuleError::InvalidField {
            rule_type: self.rule_type,
            target: self.target.to_string(),
            field,
            reason: reason.into(),
        }
    }

    fn mismatch(&self, found: String) -> RuleError {
        RuleError::TargetMismatch {
            rule_type: self.rule_type,
            target: self.target.to_string(),
            found,
        }
    }

    fn string(&self, field: &'static str) -> Result<String, RuleError> {
        let s = self
            .field(field)?
            .as_str()
            .ok_or_else(|| self.invalid(field, "expected a string"))?
            .trim();
        if s.is_empty() {
            return Err(self.invalid(field, "empty marker name"));
        }
        Ok(s.to_string())
    }

    fn count(&self, field: &'static str, default: usize) -> Result<usize, RuleError> {
        let Some(value) = self.value.get(field).filter(|v| !v.is_null()) else {
            return Ok(default);
        };
        let n = value
            .as_u64()
            .ok_or_else(|| self.invalid(field, "expected a non-negative integer"))?;
        if n == 0 {
            return Err(self.invalid(field, "must be at least 1"));
        }
        usize::try_from(n).map_err(|_| self.invalid(field, "too large"))
    }

    /// Require a non-empty marker list that names the target
    fn require_listed(&self, field: &'static str) -> Result<(), RuleError> {
        let list = self
            .field(field)?
            .as_array()
            .ok_or_else(|| self.invalid(field, "expected a list of markers"))?;
        if list.is_empty() {
            return Err(self.invalid(field, "empty list"));
        }
        if list.iter().any(|v| v.as_str() == Some(self.target)) {
            Ok(())
        } else {
            Err(self.mismatch(
                list.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            ))
        }
    }

    fn pairs(&self, field: &'static str) -> Result<Vec<(String, String)>, RuleError> {
        let list = self
            .field(field)?
            .as_array()
            .ok_or_else(|| self.invalid(field, "expected a list of [A, B] pairs"))?;
        if list.is_empty() {
            return Err(self.invalid(field, "empty list"));
        }
        list.iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(a), Value::String(b)]) => {
                    Ok((a.trim().to_string(), b.trim().to_string()))
                }
                _ => Err(self.invalid(field, format!("malformed pair {pair}"))),
            })
            .collect()
    }
}
