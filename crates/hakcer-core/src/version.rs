//! Catalog versions and cache metadata.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A comparable catalog version.
///
/// Accepts JSON numbers or strings. Compared by dot-separated components:
/// numeric components numerically, others lexically, missing ones as `0`.
/// A leading `v` is ignored.
#[derive(Clone, Debug)]
pub struct RuleVersion(String);

impl RuleVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    fn components(&self) -> Vec<&str> {
        let s = self.0.strip_prefix(['v', 'V']).unwrap_or(&self.0);
        s.split('.').collect()
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl Ord for RuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.components();
        let b = other.components();
        for i in 0..a.len().max(b.len()) {
            let x = a.get(i).copied().unwrap_or("0");
            let y = b.get(i).copied().unwrap_or("0");
            match compare_component(x, y) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for RuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RuleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RuleVersion {}

impl fmt::Display for RuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RuleVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Int(u64),
    Float(f64),
}

impl<'de> Deserialize<'de> for RuleVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawVersion::deserialize(deserializer)? {
            RawVersion::Text(s) => Self::new(s),
            RawVersion::Int(n) => Self::new(n.to_string()),
            RawVersion::Float(n) => Self::new(n.to_string()),
        })
    }
}

/// Cache metadata for the built-in catalog currently in use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersionInfo {
    pub version: RuleVersion,
    pub rules_count: usize,
    /// Human label from the manifest source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Local fetch time (RFC 3339). Set on every successful fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
}

impl CatalogVersionInfo {
    /// `updated` wins over `cached_at` for display.
    pub fn display_label(&self) -> Option<&str> {
        self.updated.as_deref().or(self.cached_at.as_deref())
    }
}
