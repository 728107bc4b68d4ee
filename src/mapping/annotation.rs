use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{CascadeError, Result};

/// Action applied to rows referencing an entity that is being soft-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SUCCESSOR")]
    Successor,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetNull => "SET NULL",
            Self::Cascade => "CASCADE",
            Self::Successor => "SUCCESSOR",
        }
    }
}

impl FromStr for Policy {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SET NULL" => Ok(Self::SetNull),
            "CASCADE" => Ok(Self::Cascade),
            "SUCCESSOR" => Ok(Self::Successor),
            _ => Err(CascadeError::UnknownPolicyType(s.to_string())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative `onSoftDelete` marker attached to a relationship field.
///
/// The policy is kept as declared and parsed during relationship discovery,
/// so a misspelled policy is reported with the exact text that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnSoftDelete {
    policy: String,
}

impl OnSoftDelete {
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
        }
    }

    pub fn set_null() -> Self {
        Self::new(Policy::SetNull.as_str())
    }

    pub fn cascade() -> Self {
        Self::new(Policy::Cascade.as_str())
    }

    pub fn successor() -> Self {
        Self::new(Policy::Successor.as_str())
    }

    pub fn declared(&self) -> &str {
        &self.policy
    }

    pub fn policy(&self) -> Result<Policy> {
        self.policy.parse()
    }
}

impl From<Policy> for OnSoftDelete {
    fn from(policy: Policy) -> Self {
        Self::new(policy.as_str())
    }
}

impl From<&str> for OnSoftDelete {
    fn from(policy: &str) -> Self {
        Self::new(policy)
    }
}

/// Soft-delete behaviour of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteable {
    /// Timestamp field holding the deletion time (null while alive).
    pub field: String,
    /// Rows of this type are physically removed instead of marked.
    #[serde(default)]
    pub hard_delete: bool,
}

impl SoftDeleteable {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            hard_delete: false,
        }
    }

    pub fn hard_delete(mut self) -> Self {
        self.hard_delete = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse_is_case_insensitive() {
        assert_eq!("set null".parse::<Policy>().unwrap(), Policy::SetNull);
        assert_eq!("Cascade".parse::<Policy>().unwrap(), Policy::Cascade);
        assert_eq!("SUCCESSOR".parse::<Policy>().unwrap(), Policy::Successor);
    }

    #[test]
    fn test_unknown_policy_keeps_declared_text() {
        let err = OnSoftDelete::new("FOO").policy().unwrap_err();
        match err {
            CascadeError::UnknownPolicyType(value) => assert_eq!(value, "FOO"),
            other => panic!("Expected UnknownPolicyType, got {:?}", other),
        }
    }

    #[test]
    fn test_on_soft_delete_serializes_as_string() {
        let json = serde_json::to_string(&OnSoftDelete::set_null()).unwrap();
        assert_eq!(json, "\"SET NULL\"");
        let parsed: OnSoftDelete = serde_json::from_str("\"cascade\"").unwrap();
        assert_eq!(parsed.policy().unwrap(), Policy::Cascade);
    }
}
