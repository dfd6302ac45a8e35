//! Gate decisions produced by validators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name reported for the built-in quality flag when it blocks a gate.
pub const QUALITY_FLAG: &str = "quality_acceptable";

/// Value of an additional decision flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// A yes/no condition such as `is_scifi`.
    Bool(bool),
    /// A categorical condition such as `genre = "horror"`.
    Category(String),
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Category(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self::Category(value)
    }
}

/// The outcome of validating a stage's output.
///
/// Serializes flat, so `{"quality_acceptable": true, "is_scifi": false}` is a
/// decision with one extra boolean flag. `good_quality` is accepted as an alias
/// for the quality field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the output is of acceptable quality.
    #[serde(alias = "good_quality")]
    pub quality_acceptable: bool,
    /// Additional domain-specific gate conditions.
    #[serde(flatten)]
    pub flags: BTreeMap<String, FlagValue>,
}

impl Decision {
    /// Creates a decision with no extra flags.
    #[must_use]
    pub fn new(quality_acceptable: bool) -> Self {
        Self {
            quality_acceptable,
            flags: BTreeMap::new(),
        }
    }

    /// An acceptable decision.
    #[must_use]
    pub fn accept() -> Self {
        Self::new(true)
    }

    /// An unacceptable decision.
    #[must_use]
    pub fn reject() -> Self {
        Self::new(false)
    }

    /// Adds a boolean or categorical flag.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Returns a boolean flag. Categorical flags and unknown names return `None`.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.flags.get(name)? {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Category(_) => None,
        }
    }

    /// Returns a categorical flag.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&str> {
        match self.flags.get(name)? {
            FlagValue::Category(c) => Some(c.as_str()),
            FlagValue::Bool(_) => None,
        }
    }

    /// Lists every condition that blocks the gate.
    ///
    /// A required flag blocks when it is false, missing, or not boolean.
    #[must_use]
    pub fn unmet(&self, required_flags: &[String]) -> Vec<String> {
        let mut unmet = Vec::new();
        if !self.quality_acceptable {
            unmet.push(QUALITY_FLAG.to_string());
        }
        for name in required_flags {
            if self.flag(name) != Some(true) {
                unmet.push(name.clone());
            }
        }
        unmet
    }

    /// Returns true when the gate may pass.
    #[must_use]
    pub fn passes(&self, required_flags: &[String]) -> bool {
        self.unmet(required_flags).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_accept_passes_without_requirements() {
        assert!(Decision::accept().passes(&[]));
        assert!(!Decision::reject().passes(&[]));
    }

    #[test]
    fn test_required_flag_false_blocks() {
        let decision = Decision::accept().with_flag("is_scifi", false);
        assert_eq!(decision.unmet(&required(&["is_scifi"])), vec!["is_scifi".to_string()]);
    }

    #[test]
    fn test_missing_required_flag_blocks() {
        let decision = Decision::accept();
        assert!(!decision.passes(&required(&["is_scifi"])));
    }

    #[test]
    fn test_categorical_flag_does_not_satisfy_requirement() {
        let decision = Decision::accept().with_flag("is_scifi", "maybe");
        assert_eq!(decision.category("is_scifi"), Some("maybe"));
        assert_eq!(decision.flag("is_scifi"), None);
        assert!(!decision.passes(&required(&["is_scifi"])));
    }

    #[test]
    fn test_unmet_reports_quality_first() {
        let decision = Decision::reject().with_flag("is_scifi", false);
        assert_eq!(
            decision.unmet(&required(&["is_scifi"])),
            vec![QUALITY_FLAG.to_string(), "is_scifi".to_string()]
        );
    }

    #[test]
    fn test_deserialize_flat_json() {
        let decision: Decision = serde_json::from_str(
            r#"{"quality_acceptable": true, "is_scifi": true, "genre": "space opera"}"#,
        )
        .unwrap();

        assert!(decision.quality_acceptable);
        assert_eq!(decision.flag("is_scifi"), Some(true));
        assert_eq!(decision.category("genre"), Some("space opera"));
    }

    #[test]
    fn test_deserialize_good_quality_alias() {
        let decision: Decision =
            serde_json::from_str(r#"{"good_quality": false, "is_scifi": true}"#).unwrap();
        assert!(!decision.quality_acceptable);
        assert_eq!(decision.flag("is_scifi"), Some(true));
    }

    #[test]
    fn test_deserialize_requires_quality() {
        let result: Result<Decision, _> = serde_json::from_str(r#"{"is_scifi": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_is_flat() {
        let json = serde_json::to_value(Decision::accept().with_flag("is_scifi", true)).unwrap();
        assert_eq!(json, serde_json::json!({"quality_acceptable": true, "is_scifi": true}));
    }
}
