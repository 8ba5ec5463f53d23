//! Label tuples used to select endpoints and to tag rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source recorded for labels created without one.
pub const LABEL_SOURCE_ANY: &str = "any";

/// A single `source:key=value` label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Label {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    LABEL_SOURCE_ANY.into()
}

impl Label {
    pub fn new(source: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source: source.into(),
        }
    }

    /// Parse `source:key=value`; source and value are optional.
    pub fn parse(s: &str) -> Self {
        let (source, rest) = match s.split_once(':') {
            Some((src, rest)) if !src.is_empty() => (src, rest),
            _ => (LABEL_SOURCE_ANY, s),
        };
        let (key, value) = rest.split_once('=').unwrap_or((rest, ""));
        Self::new(source, key, value)
    }

    /// `any` on either side matches every source.
    pub fn matches(&self, other: &Label) -> bool {
        let source_ok = self.source == LABEL_SOURCE_ANY
            || other.source == LABEL_SOURCE_ANY
            || self.source == other.source;
        source_ok && self.key == other.key && self.value == other.value
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}:{}", self.source, self.key)
        } else {
            write!(f, "{}:{}={}", self.source, self.key, self.value)
        }
    }
}

/// Ordered label list. Duplicates are allowed; order is preserved on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelArray(Vec<Label>);

impl LabelArray {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    /// Build from `source:key=value` strings.
    pub fn parse<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        Self(items.into_iter().map(Label::parse).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    /// True if every label in `needed` has a match here.
    pub fn contains(&self, needed: &LabelArray) -> bool {
        needed
            .iter()
            .all(|want| self.0.iter().any(|have| have.matches(want)))
    }

    /// Value of the first label with `key`, any source.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.value.as_str())
    }
}

impl From<Vec<Label>> for LabelArray {
    fn from(v: Vec<Label>) -> Self {
        Self(v)
    }
}

impl FromIterator<Label> for LabelArray {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
