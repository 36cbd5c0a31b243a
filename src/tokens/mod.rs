//! Token estimation and display.

mod counter;

pub use counter::{
    estimate_tokens, estimate_tokens_from_size, HeuristicCounter, TokenCounter, TokenizerCounter,
    BYTES_PER_TOKEN,
};

/// Format a token count for display: `999`, `1.2K`, `3.5M`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_token_count(count: usize) -> String {
    if count < 1_000 {
        count.to_string()
    } else if count < 1_000_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    }
}

/// A model context limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub limit: usize,
}

impl TokenBudget {
    /// Create a budget with the given limit.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Whether `tokens` is over the limit.
    #[must_use]
    pub const fn exceeds(&self, tokens: usize) -> bool {
        tokens > self.limit
    }

    /// Human-readable estimate label.
    #[must_use]
    pub fn describe(&self, tokens: usize) -> String {
        let formatted = format_token_count(tokens);
        if self.exceeds(tokens) {
            format!(
                "~{formatted} (exceeds limit of {})",
                format_token_count(self.limit)
            )
        } else {
            format!("~{formatted} (rough estimate)")
        }
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOKEN_LIMIT)
    }
}
