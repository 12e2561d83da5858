use crate::catalogue::Catalogue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// User-supplied replacements for leaf values, keyed by line ref.
///
/// The map is owned by the caller: it is edited one entry at a time as the user
/// types and handed to the evaluator whole on every recomputation. An entry
/// replaces the classifier's value for that leaf verbatim; derived lines are
/// always recomputed and never take an override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OverrideMap(BTreeMap<String, f64>);

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or replaces the manual value for a leaf, returning the previous one.
    pub fn set(&mut self, line_ref: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(line_ref.into(), value)
    }

    /// Returns the leaf to its automatically classified value.
    pub fn clear(&mut self, line_ref: &str) -> Option<f64> {
        self.0.remove(line_ref)
    }

    pub fn get(&self, line_ref: &str) -> Option<f64> {
        self.0.get(line_ref).copied()
    }

    pub fn contains(&self, line_ref: &str) -> bool {
        self.0.contains_key(line_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Entries that the evaluator will not apply to `catalogue`: refs that are
    /// unknown, derived, or headings.
    pub fn inapplicable(&self, catalogue: &Catalogue) -> Vec<String> {
        self.0
            .keys()
            .filter(|r| !catalogue.get(r).is_some_and(|item| item.is_leaf()))
            .cloned()
            .collect()
    }
}

impl FromIterator<(String, f64)> for OverrideMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, f64); N]> for OverrideMap {
    fn from(pairs: [(&str, f64); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Overrides for both columns of one statement. The prior column is usually empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementOverrides {
    #[serde(default)]
    pub current: OverrideMap,

    #[serde(default)]
    pub prior: OverrideMap,
}

impl StatementOverrides {
    pub fn current_only(current: OverrideMap) -> Self {
        Self {
            current,
            prior: OverrideMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.prior.is_empty()
    }
}
