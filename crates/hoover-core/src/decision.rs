//! Per-artifact cleanup decisions.

use serde::{Deserialize, Serialize};

/// Which timestamp an age judgement was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBasis {
    LastPull,
    Created,
    /// Neither a pull nor a creation time was available.
    Unknown,
}

impl std::fmt::Display for AgeBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgeBasis::LastPull => write!(f, "last pull"),
            AgeBasis::Created => write!(f, "creation"),
            AgeBasis::Unknown => write!(f, "no age signal"),
        }
    }
}

/// The policy evaluator's verdict for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Younger than the retention window.
    Keep { basis: AgeBasis },
    /// Eligible for deletion.
    Delete { basis: AgeBasis },
    /// Carries a protected tag.
    SkipProtected { tag: String },
    /// Lives in an excluded repository.
    SkipExcludedRepo,
    /// A tag matched an exclusion pattern.
    SkipExcludedTag { tag: String, pattern: String },
}

/// Flat view of a [`Decision`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Keep,
    Delete,
    SkipProtected,
    SkipExcludedRepo,
    SkipExcludedTag,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Keep { .. } => DecisionKind::Keep,
            Decision::Delete { .. } => DecisionKind::Delete,
            Decision::SkipProtected { .. } => DecisionKind::SkipProtected,
            Decision::SkipExcludedRepo => DecisionKind::SkipExcludedRepo,
            Decision::SkipExcludedTag { .. } => DecisionKind::SkipExcludedTag,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Decision::Delete { .. })
    }

    /// Human-readable reason, used in logs and reports.
    pub fn reason(&self) -> String {
        match self {
            Decision::Keep { basis } => format!("within retention window ({})", basis),
            Decision::Delete {
                basis: AgeBasis::Unknown,
            } => "no age signal, assumed old".to_string(),
            Decision::Delete { basis } => format!("retention window exceeded ({})", basis),
            Decision::SkipProtected { tag } => format!("protected tag '{}'", tag),
            Decision::SkipExcludedRepo => "repository excluded".to_string(),
            Decision::SkipExcludedTag { tag, pattern } => {
                format!("tag '{}' matches exclusion '{}'", tag, pattern)
            }
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Keep => write!(f, "KEEP"),
            DecisionKind::Delete => write!(f, "DELETE"),
            DecisionKind::SkipProtected => write!(f, "SKIP_PROTECTED"),
            DecisionKind::SkipExcludedRepo => write!(f, "SKIP_EXCLUDED_REPO"),
            DecisionKind::SkipExcludedTag => write!(f, "SKIP_EXCLUDED_TAG"),
        }
    }
}
