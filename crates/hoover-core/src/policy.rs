//! Retention policy and the policy evaluator.
//!
//! Evaluation walks [`RULES`] top to bottom and returns the decision of the
//! first rule that matches. The order is part of the contract: a protected
//! tag always wins over a repository exclusion, which wins over a tag
//! pattern exclusion, which wins over the age check.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::decision::{AgeBasis, Decision};
use crate::{Error, Result};

/// What to do with an artifact that has neither a pull nor a creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAgePolicy {
    /// Treat unknown age as old.
    #[default]
    Delete,
    /// Treat unknown age as fresh.
    Keep,
}

impl std::str::FromStr for MissingAgePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delete" => Ok(MissingAgePolicy::Delete),
            "keep" => Ok(MissingAgePolicy::Keep),
            _ => Err(format!("unknown missing-age policy: {}", s)),
        }
    }
}

/// A tag exclusion glob. `*` matches any run of characters; everything else
/// is literal. Matching is case-sensitive against the whole tag.
#[derive(Debug, Clone)]
pub struct TagPattern {
    glob: String,
    regex: Regex,
}

impl TagPattern {
    pub fn new(glob: impl Into<String>) -> Result<Self> {
        let glob = glob.into();
        if glob.is_empty() {
            return Err(Error::PolicyViolation(
                "tag exclusion pattern must not be empty".to_string(),
            ));
        }

        let body = glob
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("(?s)^{}$", body))
            .map_err(|e| Error::Internal(format!("pattern '{}': {}", glob, e)))?;

        Ok(Self { glob, regex })
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

impl PartialEq for TagPattern {
    fn eq(&self, other: &Self) -> bool {
        self.glob == other.glob
    }
}

impl Eq for TagPattern {}

impl std::fmt::Display for TagPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.glob)
    }
}

/// Retention rules for one run. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Minimum age before an artifact becomes eligible for deletion.
    pub retention: Duration,
    /// Tags that unconditionally protect an artifact.
    pub protected_tags: BTreeSet<String>,
    /// Repositories that are never touched.
    pub excluded_repositories: BTreeSet<String>,
    pub excluded_tag_patterns: Vec<TagPattern>,
    pub missing_age: MissingAgePolicy,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            retention: Duration::days(2),
            protected_tags: ["latest", "stable", "prod"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_repositories: BTreeSet::new(),
            excluded_tag_patterns: Vec::new(),
            missing_age: MissingAgePolicy::default(),
        }
    }
}

impl Policy {
    /// A policy with the given retention window and nothing protected.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            protected_tags: BTreeSet::new(),
            excluded_repositories: BTreeSet::new(),
            excluded_tag_patterns: Vec::new(),
            missing_age: MissingAgePolicy::default(),
        }
    }

    pub fn with_protected_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_repositories<I, S>(mut self, repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_repositories = repositories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_tag_patterns<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_tag_patterns = patterns
            .into_iter()
            .map(TagPattern::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn with_missing_age(mut self, missing_age: MissingAgePolicy) -> Self {
        self.missing_age = missing_age;
        self
    }
}

/// One step of the evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    ProtectedTag,
    ExcludedRepository,
    ExcludedTagPattern,
    Retention,
}

/// Evaluation order. First rule returning a decision wins.
pub const RULES: [Rule; 4] = [
    Rule::ProtectedTag,
    Rule::ExcludedRepository,
    Rule::ExcludedTagPattern,
    Rule::Retention,
];

impl Rule {
    /// Returns a decision if this rule matches the artifact.
    pub fn apply(self, artifact: &Artifact, policy: &Policy, now: DateTime<Utc>) -> Option<Decision> {
        match self {
            Rule::ProtectedTag => artifact
                .tags
                .iter()
                .find(|tag| policy.protected_tags.contains(tag.as_str()))
                .map(|tag| Decision::SkipProtected { tag: tag.clone() }),
            Rule::ExcludedRepository => policy
                .excluded_repositories
                .contains(&artifact.repository)
                .then_some(Decision::SkipExcludedRepo),
            Rule::ExcludedTagPattern => artifact.tags.iter().find_map(|tag| {
                policy
                    .excluded_tag_patterns
                    .iter()
                    .find(|pattern| pattern.matches(tag))
                    .map(|pattern| Decision::SkipExcludedTag {
                        tag: tag.clone(),
                        pattern: pattern.as_str().to_string(),
                    })
            }),
            Rule::Retention => Some(retention_decision(artifact, policy, now)),
        }
    }
}

fn retention_decision(artifact: &Artifact, policy: &Policy, now: DateTime<Utc>) -> Decision {
    let (reference, basis) = artifact.reference_time();
    match reference {
        None => match policy.missing_age {
            MissingAgePolicy::Delete => Decision::Delete { basis },
            MissingAgePolicy::Keep => Decision::Keep { basis },
        },
        Some(reference) if now.signed_duration_since(reference) < policy.retention => {
            Decision::Keep { basis }
        }
        Some(_) => Decision::Delete { basis },
    }
}

/// Decide what to do with one artifact. Pure and deterministic for a fixed `now`.
pub fn evaluate(artifact: &Artifact, policy: &Policy, now: DateTime<Utc>) -> Decision {
    RULES
        .iter()
        .find_map(|rule| rule.apply(artifact, policy, now))
        .unwrap_or_else(|| retention_decision(artifact, policy, now))
}
