//! The rule catalog compiled into the binary.
//!
//! Used until a remote manifest has been fetched, and again after a reset.

use hakcer_core::CompileOptions;

use crate::error::EngineError;
use crate::manifest::{Manifest, ValidatedManifest};

const BUNDLED_RULES: &str = include_str!("../rules/default-rules.json");

/// Parse and compile the bundled catalog.
pub fn bundled_manifest(options: &CompileOptions) -> Result<ValidatedManifest, EngineError> {
    Manifest::parse(BUNDLED_RULES)
        .and_then(|m| m.validate(options))
        .map_err(EngineError::Bundled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hakcer_core::ExecutionBudget;

    fn bundled() -> ValidatedManifest {
        bundled_manifest(&CompileOptions::default()).unwrap()
    }

    #[test]
    fn bundled_catalog_compiles() {
        let m = bundled();
        assert_eq!(m.version.as_str(), "1.0.0");
        assert!(m.rules.len() >= 20);
    }

    #[test]
    fn bundled_categories() {
        let m = bundled();
        for category in ["politeness", "filler", "verbosity", "redundancy", "formatting"] {
            assert!(
                m.rules.iter().any(|r| r.definition.category == category),
                "no rules in {category}"
            );
        }
    }

    #[test]
    fn please_rule_strips_courtesy() {
        let m = bundled();
        let rule = m
            .rules
            .iter()
            .find(|r| r.id() == "politeness-please")
            .unwrap();
        let out = rule
            .matcher
            .replace("Please fix it", &rule.definition.replace_string, &ExecutionBudget::default())
            .unwrap()
            .unwrap();
        assert_eq!(out.text, "fix it");
    }

    #[test]
    fn phrase_rules_shorten() {
        let m = bundled();
        let run = |id: &str, input: &str| {
            let rule = m.rules.iter().find(|r| r.id() == id).unwrap();
            rule.matcher
                .replace(input, &rule.definition.replace_string, &ExecutionBudget::default())
                .unwrap()
                .map(|r| r.text)
        };
        assert_eq!(
            run("verbosity-in-order-to", "in order to win").as_deref(),
            Some("to win")
        );
        assert_eq!(
            run("redundancy-end-result", "the end result").as_deref(),
            Some("the result")
        );
        assert_eq!(
            run("formatting-multiple-spaces", "a    b").as_deref(),
            Some("a b")
        );
        assert_eq!(run("formatting-blank-lines", "a\n\n\n\nb").as_deref(), Some("a\n\nb"));
    }
}
