//! Pluggable token counting.
//!
//! The shaper's gates and caps treat the counter as opaque: any
//! implementation must be a pure, deterministic function of the input
//! string, with empty input counting as zero.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::error::TokenizerError;

/// Boundary-injected token estimator.
pub trait TokenCounter: Send + Sync {
    /// Count tokens, or report that the counter could not initialize.
    fn try_count(&self, text: &str) -> Result<usize, TokenizerError>;

    /// Short label naming the counting method, reported in stats output.
    fn method(&self) -> &'static str;
}

/// Default counter: the `cl100k_base` BPE vocabulary.
///
/// The vocabulary loads lazily on first use behind a `OnceLock`, so
/// initialization is idempotent and safe when several tasks race to the
/// first count. A failed load is cached and reported on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct BpeCounter;

static CL100K: OnceLock<Result<CoreBPE, String>> = OnceLock::new();

impl BpeCounter {
    fn bpe() -> Result<&'static CoreBPE, TokenizerError> {
        let slot = CL100K.get_or_init(|| tiktoken_rs::cl100k_base().map_err(|e| e.to_string()));
        match slot {
            Ok(bpe) => Ok(bpe),
            Err(message) => Err(TokenizerError {
                message: message.clone(),
            }),
        }
    }
}

impl TokenCounter for BpeCounter {
    fn try_count(&self, text: &str) -> Result<usize, TokenizerError> {
        if text.is_empty() {
            return Ok(0);
        }
        Ok(Self::bpe()?.encode_with_special_tokens(text).len())
    }

    fn method(&self) -> &'static str {
        "tiktoken/cl100k_base"
    }
}

/// Vocabulary-free estimator: one token per four characters. Matches the
/// fallback used when no BPE vocabulary is available, and keeps tests fast.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharEstimator;

impl TokenCounter for CharEstimator {
    fn try_count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.chars().count() / 4)
    }

    fn method(&self) -> &'static str {
        "chars/4 estimate"
    }
}
