//! Token counters.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::{Error, Result};

/// Bytes per token assumed by the heuristic.
pub const BYTES_PER_TOKEN: usize = 4;

/// Something that can count tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be tokenized.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// One token per four bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.len() / BYTES_PER_TOKEN)
    }
}

/// Counter backed by a `tokenizer.json` model file.
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
}

impl TokenizerCounter {
    /// Load a tokenizer from file.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be loaded.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path.as_ref())
            .map_err(|e| Error::Tokenizer(format!("failed to load tokenizer: {e}")))?;
        Ok(Self { tokenizer })
    }
}

impl std::fmt::Debug for TokenizerCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerCounter").finish_non_exhaustive()
    }
}

impl TokenCounter for TokenizerCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(format!("failed to tokenize: {e}")))?;
        Ok(encoding.get_ids().len())
    }
}

/// Token estimate for a file of `size` bytes.
#[must_use]
pub fn estimate_tokens_from_size(size: u64) -> usize {
    usize::try_from(size / BYTES_PER_TOKEN as u64).unwrap_or(usize::MAX)
}

/// Count tokens with `counter`, falling back to the heuristic when the
/// counter is absent or fails.
#[must_use]
pub fn estimate_tokens(text: &str, counter: Option<&dyn TokenCounter>) -> usize {
    counter
        .and_then(|c| match c.count_tokens(text) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(error = %e, "Precise token count failed, using heuristic");
                None
            }
        })
        .unwrap_or(text.len() / BYTES_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl TokenCounter for Failing {
        fn count_tokens(&self, _text: &str) -> Result<usize> {
            Err(Error::Tokenizer("no model".to_string()))
        }
    }

    struct Words;

    impl TokenCounter for Words {
        fn count_tokens(&self, text: &str) -> Result<usize> {
            Ok(text.split_whitespace().count())
        }
    }

    #[test]
    fn test_heuristic() {
        assert_eq!(HeuristicCounter.count_tokens("abcdefgh").unwrap(), 2);
        assert_eq!(HeuristicCounter.count_tokens("abc").unwrap(), 0);
    }

    #[test]
    fn test_estimate_from_size() {
        assert_eq!(estimate_tokens_from_size(0), 0);
        assert_eq!(estimate_tokens_from_size(7), 1);
        assert_eq!(estimate_tokens_from_size(4096), 1024);
    }

    #[test]
    fn test_estimate_uses_counter() {
        assert_eq!(estimate_tokens("one two three", Some(&Words)), 3);
    }

    #[test]
    fn test_estimate_falls_back() {
        let text = "a".repeat(40);
        assert_eq!(estimate_tokens(&text, Some(&Failing)), 10);
        assert_eq!(estimate_tokens(&text, None), 10);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let err = TokenizerCounter::from_file("/nonexistent/tokenizer.json").unwrap_err();
        assert!(err.to_string().contains("failed to load tokenizer"));
    }
}
