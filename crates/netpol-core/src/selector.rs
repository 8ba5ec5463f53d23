//! Endpoint selector: a label predicate naming the workloads a rule covers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::LabelArray;

/// Matches endpoints whose labels carry every `matchLabels` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl EndpointSelector {
    /// Build from `(key, value)` pairs.
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    /// Keys may carry a `source:` prefix; it is ignored for matching.
    pub fn matches(&self, labels: &LabelArray) -> bool {
        self.match_labels.iter().all(|(k, v)| {
            let key = k.split_once(':').map_or(k.as_str(), |(_, key)| key);
            labels.get(key) == Some(v.as_str())
        })
    }
}
