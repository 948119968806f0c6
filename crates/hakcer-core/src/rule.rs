use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::pattern::{self, CompileOptions, Matcher, DEFAULT_FLAGS};

/// Category assigned to user-created rules.
pub const CUSTOM_CATEGORY: &str = "custom";

fn default_category() -> String {
    "general".to_string()
}

fn default_flags() -> String {
    DEFAULT_FLAGS.to_string()
}

fn default_enabled() -> bool {
    true
}

/// Persisted, serializable shape of a rule. Matches the remote manifest entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub pattern_string: String,
    #[serde(default = "default_flags")]
    pub pattern_flags: String,
    #[serde(default)]
    pub replace_string: String,
}

impl RuleDefinition {
    /// Check required fields and compile the pattern.
    pub fn compile(&self, options: &CompileOptions) -> Result<Matcher, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.pattern_string.is_empty() {
            return Err(ValidationError::EmptyPattern);
        }
        pattern::compile_with(&self.pattern_string, &self.pattern_flags, options)
    }
}

/// User input for a new custom rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub pattern_string: String,
    #[serde(default)]
    pub pattern_flags: Option<String>,
    #[serde(default)]
    pub replace_string: String,
}

impl RuleDraft {
    /// Trim the text fields and fill defaults. The replacement is kept verbatim.
    pub fn into_definition(self, id: String) -> RuleDefinition {
        let flags = self
            .pattern_flags
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(default_flags);
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| CUSTOM_CATEGORY.to_string());

        RuleDefinition {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            category,
            pattern_string: self.pattern_string.trim().to_string(),
            pattern_flags: flags,
            replace_string: self.replace_string,
        }
    }
}

/// How a custom rule is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRuleRecord {
    #[serde(flatten)]
    pub definition: RuleDefinition,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: String,
}
