use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Time-ordered id carrying the type prefix.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Whether a raw id string lives in this id space.
            pub fn is_in_space(raw: &str) -> bool {
                raw.strip_prefix($prefix)
                    .is_some_and(|rest| rest.starts_with('_'))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(CustomRuleId, "custom");
branded_id!(HistoryId, "hist");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        assert!(CustomRuleId::new().as_str().starts_with("custom_"));
        assert!(HistoryId::new().as_str().starts_with("hist_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = CustomRuleId::new();
        let b = CustomRuleId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn id_space_membership() {
        assert!(CustomRuleId::is_in_space(CustomRuleId::new().as_str()));
        assert!(CustomRuleId::is_in_space("custom_123"));
        assert!(!CustomRuleId::is_in_space("customary-politeness"));
        assert!(!CustomRuleId::is_in_space("politeness-please"));
    }

    #[test]
    fn serde_transparent() {
        let id = HistoryId::from_raw("hist_abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"hist_abc\"");
        let back: HistoryId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
