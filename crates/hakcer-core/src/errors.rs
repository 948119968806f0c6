use std::time::Duration;

/// Bad rule input: surfaced to the caller, no state is changed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule pattern must not be empty")]
    EmptyPattern,

    #[error("invalid flags {flags:?}: {reason}")]
    InvalidFlags { flags: String, reason: String },

    #[error("invalid pattern: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A rule failed while running against text. Isolated to that rule.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    #[error("time budget of {budget:?} exhausted after {matches} matches")]
    BudgetExceeded { budget: Duration, matches: usize },

    #[error("match limit of {limit} exceeded")]
    MatchLimit { limit: usize },
}

impl MatcherError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::MatchLimit { .. } => "match_limit",
        }
    }
}
