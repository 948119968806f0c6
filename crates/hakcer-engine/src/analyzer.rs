use hakcer_core::{
    AnalysisResult, AppliedRule, ExecutionBudget, SavingsStats, SkippedRule, TokenEstimator,
};
use tracing::{debug, warn};

use crate::catalog::Catalog;

/// Runs the enabled rules of a catalog snapshot over a prompt.
///
/// One pass in catalog order; each rule sees the output of the previous one.
/// Only rules that changed the text are reported as applied. A rule that fails is skipped and the pass continues with the text as it
/// was before that rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct Analyzer {
    budget: ExecutionBudget,
    estimator: TokenEstimator,
}

impl Analyzer {
    pub fn new(budget: ExecutionBudget, estimator: TokenEstimator) -> Self {
        Self { budget, estimator }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    pub fn analyze(&self, catalog: &Catalog, input: &str) -> AnalysisResult {
        let mut text = input.to_string();
        let mut applied_rules = Vec::new();
        let mut skipped_rules = Vec::new();

        for rule in catalog.enabled() {
            match rule.matcher().replace(&text, rule.replace_string(), &self.budget) {
                Ok(Some(replacement)) if replacement.text != text => {
                    text = replacement.text;
                    applied_rules.push(AppliedRule {
                        rule_id: rule.id().to_string(),
                        match_count: replacement.match_count,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        rule_id = rule.id(),
                        kind = e.error_kind(),
                        error = %e,
                        "rule skipped"
                    );
                    skipped_rules.push(SkippedRule {
                        rule_id: rule.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let stats = SavingsStats::compute(input, &text, &self.estimator);
        debug!(
            applied = applied_rules.len(),
            skipped = skipped_rules.len(),
            characters_saved = stats.characters_saved,
            "analysis complete"
        );

        AnalysisResult {
            optimized_text: text,
            applied_rules,
            stats,
            skipped_rules,
        }
    }
}
