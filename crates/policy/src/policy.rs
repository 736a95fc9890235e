//! Policy configuration and enforcement.

use crate::{Error, Result, StatementKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Policy configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Statement kinds that are allowed.
    #[serde(default)]
    pub allow: AllowRules,

    /// Statement kinds that are denied (overrides allow).
    #[serde(default)]
    pub deny: DenyRules,

    /// Result size limits.
    #[serde(default)]
    pub limits: Limits,
}

/// Rules for allowed statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRules {
    /// Allowed statement kinds. Every kind when omitted.
    #[serde(default = "all_kinds")]
    pub statements: HashSet<StatementKind>,
}

impl Default for AllowRules {
    fn default() -> Self {
        Self {
            statements: all_kinds(),
        }
    }
}

fn all_kinds() -> HashSet<StatementKind> {
    StatementKind::ALL.into_iter().collect()
}

/// Rules for denied statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRules {
    /// Deny every statement of these kinds.
    #[serde(default)]
    pub statements: HashSet<StatementKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum rows returned by one statement. Unlimited when omitted.
    #[serde(default)]
    pub max_rows: Option<usize>,
}

/// Result of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl Policy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let policy: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Every statement runs, with no row limit.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Only reads run.
    pub fn read_only() -> Self {
        Self {
            allow: AllowRules {
                statements: HashSet::from([StatementKind::Read]),
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.max_rows == Some(0) {
            return Err(Error::Invalid("limits.max_rows must be at least 1".into()));
        }
        Ok(())
    }

    /// Check whether a statement of this kind may run.
    pub fn check(&self, kind: StatementKind) -> Decision {
        if self.deny.statements.contains(&kind) {
            return Decision::Deny {
                reason: format!("{kind} statements are denied by policy"),
            };
        }

        if self.allow.statements.contains(&kind) {
            Decision::Allow
        } else {
            Decision::Deny {
                reason: format!("{kind} statements are not in the allowlist"),
            }
        }
    }

    /// True when nothing but reads may run, so connections can be opened
    /// read-only.
    pub fn is_read_only(&self) -> bool {
        [StatementKind::Write, StatementKind::Schema, StatementKind::Other]
            .into_iter()
            .all(|kind| !self.check(kind).is_allowed())
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.limits.max_rows
    }
}
