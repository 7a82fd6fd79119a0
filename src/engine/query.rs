//! Query options - the context a permission is evaluated under

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Sorted multimap of context key to values, e.g. `channel=general`
///
/// Keys are lowercased on insert; values are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ContextSet {
    /// Create an empty context set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context set holding a single pair
    pub fn singleton(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.add(key, value);
        set
    }

    /// Add a key/value pair
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(key.into().to_lowercase())
            .or_default()
            .insert(value.into());
    }

    /// Builder variant of [`ContextSet::add`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// Merge all pairs from another set into this one
    pub fn add_all(&mut self, other: &ContextSet) {
        for (key, value) in other.iter() {
            self.add(key, value);
        }
    }

    /// Check whether the exact pair is present
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.entries
            .get(&key.to_lowercase())
            .map(|values| values.contains(value))
            .unwrap_or(false)
    }

    /// Check whether every pair of `self` is present in `other`
    pub fn is_satisfied_by(&self, other: &ContextSet) -> bool {
        self.iter().all(|(key, value)| other.contains(key, value))
    }

    /// Iterate over all pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
    }

    /// Total number of pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    /// Check if there are no pairs
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `key=value` tokens, as typed by an operator
    pub fn parse_pairs<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut set = Self::new();
        for token in tokens {
            let (key, value) = token.split_once('=')?;
            if key.is_empty() || value.is_empty() {
                return None;
            }
            set.add(key, value);
        }
        Some(set)
    }
}

impl std::fmt::Display for ContextSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "[{}]", pairs.join(", "))
    }
}

/// Whether contexts take part in evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Contextual,
    NonContextual,
}

/// The evaluation context of a permission check
///
/// Two equal `QueryOptions` always resolve to the same cached permission data,
/// so this type doubles as the cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryOptions {
    mode: QueryMode,
    contexts: ContextSet,
}

impl QueryOptions {
    /// Options that evaluate under the given contexts
    pub fn contextual(contexts: ContextSet) -> Self {
        Self {
            mode: QueryMode::Contextual,
            contexts,
        }
    }

    /// Options that ignore contexts entirely
    pub fn non_contextual() -> Self {
        Self {
            mode: QueryMode::NonContextual,
            contexts: ContextSet::new(),
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn contexts(&self) -> &ContextSet {
        &self.contexts
    }

    /// Check whether a node carrying `required` contexts applies here
    ///
    /// Non-contextual queries only accept context-free nodes.
    pub fn satisfies(&self, required: &ContextSet) -> bool {
        match self.mode {
            QueryMode::NonContextual => required.is_empty(),
            QueryMode::Contextual => required.is_satisfied_by(&self.contexts),
        }
    }
}

impl std::fmt::Display for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            QueryMode::NonContextual => write!(f, "non-contextual"),
            QueryMode::Contextual => write!(f, "{}", self.contexts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_set_ordering_is_stable() {
        let a = ContextSet::new().with("channel", "general").with("platform", "user");
        let b = ContextSet::new().with("Platform", "user").with("channel", "general");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "[channel=general, platform=user]");
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_satisfies() {
        let options = QueryOptions::contextual(
            ContextSet::new().with("platform", "user").with("channel", "general"),
        );

        assert!(options.satisfies(&ContextSet::new()));
        assert!(options.satisfies(&ContextSet::singleton("channel", "general")));
        assert!(!options.satisfies(&ContextSet::singleton("channel", "random")));

        let flat = QueryOptions::non_contextual();
        assert!(flat.satisfies(&ContextSet::new()));
        assert!(!flat.satisfies(&ContextSet::singleton("channel", "general")));
    }

    #[test]
    fn test_parse_pairs() {
        let set = ContextSet::parse_pairs(["channel=general", "group=42"]).unwrap();
        assert!(set.contains("channel", "general"));
        assert!(set.contains("group", "42"));

        assert!(ContextSet::parse_pairs(["nonsense"]).is_none());
        assert!(ContextSet::parse_pairs(["=x"]).is_none());
    }
}
