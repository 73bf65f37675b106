//! Compression statistics for one original/condensed pair.

use crate::tokens::{CharEstimator, TokenCounter};

/// Before/after sizes with the counting method that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct CondenseStats {
    pub original_chars: usize,
    pub condensed_chars: usize,
    pub original_tokens: usize,
    pub condensed_tokens: usize,
    /// Label of the token counting method used.
    pub method: &'static str,
}

impl CondenseStats {
    pub fn char_reduction_pct(&self) -> f64 {
        reduction_pct(self.original_chars, self.condensed_chars)
    }

    pub fn token_reduction_pct(&self) -> f64 {
        reduction_pct(self.original_tokens, self.condensed_tokens)
    }
}

fn reduction_pct(original: usize, condensed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - condensed as f64 / original as f64) * 100.0
}

/// Measure a conversion. Falls back to the character estimator when the
/// preferred counter cannot initialize.
pub fn compute(original: &str, condensed: &str, counter: &dyn TokenCounter) -> CondenseStats {
    let (original_tokens, condensed_tokens, method) =
        match (counter.try_count(original), counter.try_count(condensed)) {
            (Ok(orig), Ok(cond)) => (orig, cond, counter.method()),
            _ => {
                let fallback = CharEstimator;
                (
                    fallback.try_count(original).unwrap_or(0),
                    fallback.try_count(condensed).unwrap_or(0),
                    fallback.method(),
                )
            }
        };
    CondenseStats {
        original_chars: original.chars().count(),
        condensed_chars: condensed.chars().count(),
        original_tokens,
        condensed_tokens,
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_percentages() {
        let stats = CondenseStats {
            original_chars: 200,
            condensed_chars: 50,
            original_tokens: 100,
            condensed_tokens: 40,
            method: "chars/4 estimate",
        };
        assert_eq!(stats.char_reduction_pct(), 75.0);
        assert_eq!(stats.token_reduction_pct(), 60.0);
    }

    #[test]
    fn test_empty_original() {
        let stats = compute("", "", &CharEstimator);
        assert_eq!(stats.token_reduction_pct(), 0.0);
        assert_eq!(stats.original_tokens, 0);
    }

    #[test]
    fn test_compute_uses_counter_method() {
        let stats = compute("aaaa bbbb cccc", "aaaa", &CharEstimator);
        assert_eq!(stats.method, "chars/4 estimate");
        assert!(stats.original_tokens > stats.condensed_tokens);
    }
}
