//! # Agentscan Core
//!
//! Aggregation and pagination engine for AI-agent registrations indexed on
//! several chain subgraphs.
//!
//! ## Overview
//!
//! Every chain deployment of the agent registry is paginated and fails on its
//! own. This crate presents them as one filterable, sortable listing:
//!
//! - **Filter fingerprints** turn a filter set into a stable cache key
//! - **Fan-out** queries each chain concurrently behind a circuit breaker and API-key rotation
//! - **Fair merge** interleaves per-chain results and drops duplicate identities
//! - **Pagination cache** serves offset and cursor slices from one merged snapshot
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Subgraph GraphQL adapter and in-memory source |
//! | [`aggregator`] | `get_agents` / `get_agent` service and builder |
//! | [`cache`] | TTL store and pagination cache |
//! | [`circuit_breaker`] | Per-upstream circuit breaker |
//! | [`config`] | Environment-driven configuration |
//! | [`data_source`] | Chain source trait and request/response types |
//! | [`domain`] | Agent, filter and timestamp types |
//! | [`error`] | Core error types |
//! | [`fingerprint`] | Filter fingerprints |
//! | [`http_client`] | HTTP client abstraction |
//! | [`interleave`] | Round-robin merge and dedupe |
//! | [`key_rotation`] | Upstream API-key rotation |
//! | [`orchestrator`] | Bounded concurrent fan-out |
//! | [`pagination`] | Cursor codec and page slicing |
//! | [`registry`] | Per-chain client registry |
//! | [`singleflight`] | Coalescing of concurrent cache misses |
//! | [`source`] | Chain identifiers |
//! | [`throttling`] | Client-side request pacing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentscan_core::{AgentAggregator, AgentFilters, AggregatorConfig, Pagination};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let aggregator = AgentAggregator::builder()
//!         .with_config(AggregatorConfig::from_env()?)
//!         .build()?;
//!
//!     let filters = AgentFilters::default().with_mcp(true);
//!     let page = aggregator.get_agents(&filters, &Pagination::first(20)).await?;
//!     for agent in &page.items {
//!         println!("{} {}", agent.id, agent.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod aggregator;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod interleave;
pub mod key_rotation;
pub mod orchestrator;
pub mod pagination;
pub mod registry;
pub mod singleflight;
pub mod source;
pub mod throttling;

pub use adapters::{InMemorySource, SubgraphAdapter};
pub use aggregator::{AgentAggregator, AggregatorBuilder};
pub use cache::{CacheBackend, CacheMode, CacheStore, CachedPaginationSet, PaginationCache};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
};
pub use config::AggregatorConfig;
pub use data_source::{AgentPage, AgentSource, PageQuery, SourceError, SourceErrorKind};
pub use domain::{
    AgentCapabilities, AgentFilters, AgentId, AgentSummary, SortField, SortOrder, UtcDateTime,
};
pub use error::{CoreError, ValidationError};
pub use fingerprint::FilterFingerprint;
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use interleave::{dedupe_by_identity, interleave, merge_sources};
pub use key_rotation::{KeyRotationManager, RotationStrategy};
pub use orchestrator::{ChainQueryOrchestrator, FetchLimits, SourceOutcome};
pub use pagination::{decode_cursor, encode_cursor, AgentListPage, Pagination};
pub use registry::{ChainClientRegistry, ChainConfig};
pub use singleflight::SingleFlight;
pub use source::ChainId;
pub use throttling::RequestPacer;
