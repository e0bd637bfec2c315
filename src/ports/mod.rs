//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `QuoteSource`: single-instrument quote acquisition per venue

pub mod quote_source;

pub use quote_source::{FeedError, QuoteSource};
