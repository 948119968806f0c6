use serde::{Deserialize, Serialize};

use crate::tokens::TokenEstimator;

/// A rule that changed the text during a pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub rule_id: String,
    pub match_count: usize,
}

/// A rule whose run failed and was left out of the pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRule {
    pub rule_id: String,
    pub reason: String,
}

/// Savings of one pass. Lengths are in Unicode scalar values.
///
/// `tokens_saved` comes from [`TokenEstimator`] and is an approximation.
/// Saved figures are signed since a rule may lengthen the text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsStats {
    pub original_length: usize,
    pub optimized_length: usize,
    pub characters_saved: i64,
    pub tokens_saved: i64,
    pub percent_saved: f64,
}

impl SavingsStats {
    pub fn compute(original: &str, optimized: &str, estimator: &TokenEstimator) -> Self {
        let original_length = original.chars().count();
        let optimized_length = optimized.chars().count();
        let characters_saved = signed(original_length) - signed(optimized_length);
        let tokens_saved = signed(estimator.estimate_chars(original_length))
            - signed(estimator.estimate_chars(optimized_length));

        // Empty input saves nothing by definition.
        let percent_saved = if original_length == 0 {
            0.0
        } else {
            characters_saved as f64 / original_length as f64 * 100.0
        };

        Self {
            original_length,
            optimized_length,
            characters_saved,
            tokens_saved,
            percent_saved,
        }
    }
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Output of one analysis. Owned by the caller, never stored by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub optimized_text: String,
    pub applied_rules: Vec<AppliedRule>,
    pub stats: SavingsStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_rules: Vec<SkippedRule>,
}

impl AnalysisResult {
    pub fn applied_rule_ids(&self) -> Vec<String> {
        self.applied_rules.iter().map(|r| r.rule_id.clone()).collect()
    }

    pub fn changed(&self) -> bool {
        !self.applied_rules.is_empty()
    }
}
