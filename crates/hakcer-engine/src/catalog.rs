//! Immutable catalog snapshots handed to the analyzer.

use std::collections::HashSet;
use std::sync::Arc;

use hakcer_core::{CatalogVersionInfo, Matcher, RuleDefinition};
use serde::Serialize;

use crate::manifest::CompiledRule;

/// Where a rule comes from, and how its enabled state is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleOrigin {
    /// From the bundled or remote manifest. `None` means never toggled.
    Builtin { override_enabled: Option<bool> },
    /// User-created; the flag lives on the rule record.
    Custom { enabled: bool },
}

/// A catalog rule with its effective state.
#[derive(Clone, Debug)]
pub struct Rule {
    definition: RuleDefinition,
    origin: RuleOrigin,
    matcher: Arc<Matcher>,
}

impl Rule {
    pub(crate) fn builtin(compiled: &CompiledRule, override_enabled: Option<bool>) -> Self {
        Self {
            definition: compiled.definition.clone(),
            origin: RuleOrigin::Builtin { override_enabled },
            matcher: Arc::clone(&compiled.matcher),
        }
    }

    pub(crate) fn custom(compiled: &CompiledRule, enabled: bool) -> Self {
        Self {
            definition: compiled.definition.clone(),
            origin: RuleOrigin::Custom { enabled },
            matcher: Arc::clone(&compiled.matcher),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn category(&self) -> &str {
        &self.definition.category
    }

    pub fn replace_string(&self) -> &str {
        &self.definition.replace_string
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.origin, RuleOrigin::Custom { .. })
    }

    /// Built-ins default to enabled.
    pub fn is_enabled(&self) -> bool {
        match self.origin {
            RuleOrigin::Builtin { override_enabled } => override_enabled.unwrap_or(true),
            RuleOrigin::Custom { enabled } => enabled,
        }
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            id: self.definition.id.clone(),
            name: self.definition.name.clone(),
            description: self.definition.description.clone(),
            category: self.definition.category.clone(),
            pattern_string: self.definition.pattern_string.clone(),
            pattern_flags: self.definition.pattern_flags.clone(),
            replace_string: self.definition.replace_string.clone(),
            enabled: self.is_enabled(),
            is_custom: self.is_custom(),
        }
    }
}

/// Flat serializable view of a rule for display and export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub pattern_string: String,
    pub pattern_flags: String,
    pub replace_string: String,
    pub enabled: bool,
    pub is_custom: bool,
}

/// Which rules to list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    /// `"all"` (any case) or empty selects everything.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Category(raw.to_string())
        }
    }

    pub fn accepts(&self, rule: &Rule) -> bool {
        match self {
            Self::All => true,
            Self::Category(c) => rule.category() == c.as_str(),
        }
    }
}

/// Ordered rule set: built-ins in manifest order, then custom rules by creation.
#[derive(Clone, Debug)]
pub struct Catalog {
    rules: Vec<Rule>,
    version: CatalogVersionInfo,
}

impl Catalog {
    pub(crate) fn new(rules: Vec<Rule>, version: CatalogVersionInfo) -> Self {
        Self { rules, version }
    }

    /// Version of the built-in rules in this snapshot.
    pub fn version(&self) -> &CatalogVersionInfo {
        &self.version
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.is_enabled())
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn list(&self, filter: &CategoryFilter) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| filter.accepts(r))
            .cloned()
            .collect()
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(Rule::category)
            .filter(|c| seen.insert(*c))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
