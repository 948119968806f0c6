//! Heuristic token estimation.
//!
//! There is no real tokenizer here. Counts are `ceil(chars / chars_per_token)`
//! and are only meant for relative savings figures.

/// Approximate characters per token for English prose.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenEstimator {
    chars_per_token: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator {
    /// A ratio of zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_chars(text.chars().count())
    }

    pub fn estimate_chars(&self, chars: usize) -> usize {
        chars.div_ceil(self.chars_per_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up() {
        let est = TokenEstimator::default();
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("a"), 1);
        assert_eq!(est.estimate("abcd"), 1);
        assert_eq!(est.estimate("abcde"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let est = TokenEstimator::new(1);
        assert_eq!(est.estimate("héllo"), 5);
    }

    #[test]
    fn zero_ratio_clamped() {
        assert_eq!(TokenEstimator::new(0).chars_per_token(), 1);
    }
}
