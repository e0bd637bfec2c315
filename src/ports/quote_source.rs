//! Quote Source Port - Venue Adapter Interface
//!
//! Defines the trait every venue adapter implements and the error
//! taxonomy of the adapter boundary. Every failure kind collapses to the
//! same caller-visible absence at the orchestrator — the variants exist so
//! logs and metrics can name the distinguishing reason, and so an
//! `UnmappedSymbol` (a configuration gap, not a runtime fault) can be
//! surfaced distinctly for operators.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{InstrumentClass, Quote};

/// Failure kinds at the venue adapter boundary.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network-level failure: DNS, connect, TLS, or request timeout.
    #[error("transport failure: {message}")]
    Transport {
        /// Human-readable cause.
        message: String,
        /// Whether the failure was a timeout.
        timed_out: bool,
    },

    /// Upstream answered with a non-2xx status.
    #[error("upstream rejected request: HTTP {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Whether the rejection was a rate limit (HTTP 429).
        rate_limited: bool,
    },

    /// Response body could not be parsed or lacked required fields.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Index symbol with no provider code mapping. Fails closed — the
    /// pipeline never guesses index codes.
    #[error("no provider mapping for index symbol {0}")]
    UnmappedSymbol(String),

    /// Upstream produced a quote with a non-positive price.
    #[error("invalid quote for {symbol}: price {price}")]
    InvalidQuote {
        /// Canonical symbol.
        symbol: String,
        /// The rejected price.
        price: f64,
    },
}

impl FeedError {
    /// Short reason label for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Transport { timed_out: true, .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Upstream { rate_limited: true, .. } => "rate_limited",
            Self::Upstream { .. } => "upstream",
            Self::Malformed(_) => "malformed",
            Self::UnmappedSymbol(_) => "unmapped_symbol",
            Self::InvalidQuote { .. } => "invalid_quote",
        }
    }
}

/// Trait for venue quote adapters.
///
/// Implementors translate a canonical instrument identifier into one
/// upstream call and return a normalized quote. Errors never escape past
/// the orchestrator; callers beyond it only ever see "got a quote" or
/// "didn't". Adapters are stateless and safely callable concurrently.
#[async_trait]
pub trait QuoteSource: Send + Sync + 'static {
    /// Fetch one normalized quote for a canonical symbol.
    ///
    /// A returned quote always satisfies `quote.is_valid()`.
    async fn fetch(&self, symbol: &str, class: InstrumentClass) -> Result<Quote, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        let e = FeedError::Upstream { status: 429, rate_limited: true };
        assert_eq!(e.reason(), "rate_limited");
        let e = FeedError::UnmappedSymbol("INDEX:ZZZ".to_string());
        assert_eq!(e.reason(), "unmapped_symbol");
        let e = FeedError::Transport { message: "timed out".to_string(), timed_out: true };
        assert_eq!(e.reason(), "timeout");
    }
}
