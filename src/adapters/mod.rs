//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `client`: shared rate-limited HTTP client for all upstreams
//! - `venues`: per-provider quote adapters and the class router
//! - `metrics`: Prometheus metrics export

pub mod client;
pub mod metrics;
pub mod venues;

pub use client::{FeedClient, FeedClientConfig};
pub use metrics::MetricsRegistry;
