pub mod analysis;
pub mod errors;
pub mod history;
pub mod ids;
pub mod pattern;
pub mod rule;
pub mod template;
pub mod tokens;
pub mod version;

pub use analysis::{AnalysisResult, AppliedRule, SavingsStats, SkippedRule};
pub use errors::{MatcherError, ValidationError};
pub use history::{AggregateStats, Disposition, HistoryEntry};
pub use pattern::{CompileOptions, ExecutionBudget, Matcher, PatternFlags, Replacement};
pub use rule::{CustomRuleRecord, RuleDefinition, RuleDraft};
pub use tokens::TokenEstimator;
pub use version::{CatalogVersionInfo, RuleVersion};
