//! Storage keys. Every persisted record lives under one of these.

pub const CUSTOM_RULES: &str = "customRules";
pub const RULE_OVERRIDES: &str = "ruleOverrides";
pub const RULE_CATALOG: &str = "ruleCatalog";
pub const RULE_CATALOG_VERSION: &str = "ruleCatalogVersion";
pub const PROMPT_HISTORY: &str = "promptHistory";
pub const TOTAL_STATS: &str = "totalStats";
