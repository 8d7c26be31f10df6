//! Repository scoping.

use std::collections::BTreeSet;

/// Decides which repositories of a project a run may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFilter {
    /// Lowercased substrings; a repository must contain at least one.
    include: Vec<String>,
    excluded: BTreeSet<String>,
}

impl Default for RepositoryFilter {
    fn default() -> Self {
        Self::new(["cdp", "sdp"], Vec::<String>::new())
    }
}

impl RepositoryFilter {
    /// An empty `include` list admits nothing.
    pub fn new<I, S, E, T>(include: I, excluded: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            include: include
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_in_scope(&self, repository: &str) -> bool {
        if self.excluded.contains(repository) {
            return false;
        }
        let lowered = repository.to_lowercase();
        self.include.iter().any(|needle| lowered.contains(needle.as_str()))
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }
}
