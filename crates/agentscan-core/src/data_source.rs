//! Chain source trait and request/response types.
//!
//! Every chain deployment of the agent registry is reached through an
//! [`AgentSource`]. Sources paginate with their own opaque cursor; the
//! orchestrator only follows it.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | [`fetch_page`](AgentSource::fetch_page) | [`PageQuery`] | [`AgentPage`] |
//! | [`fetch_agent`](AgentSource::fetch_agent) | token id | `Option<AgentSummary>` |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{AgentFilters, AgentSummary, ChainId};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The upstream throttled the request (HTTP 429 or an equivalent gateway message).
    RateLimited,
    /// 5xx, timeout or connection failure.
    Unavailable,
    /// The subgraph is missing or does not expose the expected schema yet.
    NotDeployed,
    /// The gateway refused the credentials for this deployment.
    Unauthorized,
    /// The upstream circuit breaker short-circuited the call.
    CircuitOpen,
    InvalidRequest,
    UnsupportedChain,
    Internal,
}

/// Structured source error used by rotation, breaker and orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_deployed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotDeployed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unauthorized,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn circuit_open(upstream: &str) -> Self {
        Self {
            kind: SourceErrorKind::CircuitOpen,
            message: format!("{upstream} circuit breaker is open; skipping upstream call"),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unsupported_chain(chain_id: ChainId) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedChain,
            message: format!("chain {chain_id} is not configured"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the same call may succeed with another credential.
    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Known outage shapes that are logged quietly instead of surfaced as warnings.
    pub const fn is_expected(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::NotDeployed
                | SourceErrorKind::Unauthorized
                | SourceErrorKind::CircuitOpen
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::NotDeployed => "source.not_deployed",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::CircuitOpen => "source.circuit_open",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::UnsupportedChain => "source.unsupported_chain",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// One page request against a single chain source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub filters: AgentFilters,
    pub first: usize,
    pub cursor: Option<String>,
}

impl PageQuery {
    pub fn new(filters: AgentFilters, first: usize) -> Result<Self, SourceError> {
        if first == 0 {
            return Err(SourceError::invalid_request(
                "page size must be greater than zero",
            ));
        }
        Ok(Self {
            filters,
            first,
            cursor: None,
        })
    }

    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One page of agents in the source's native order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPage {
    pub items: Vec<AgentSummary>,
    /// Cursor for the following page; `None` once the source is exhausted.
    pub next_cursor: Option<String>,
    pub total: Option<usize>,
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Chain source contract.
///
/// Implementations must be `Send + Sync`; one instance per chain is shared by
/// every request through the [`ChainClientRegistry`](crate::ChainClientRegistry).
pub trait AgentSource: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Fetches one page of agents matching `query.filters`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the upstream is throttled, unreachable, not
    /// deployed, or answers with something that cannot be decoded.
    fn fetch_page<'a>(
        &'a self,
        query: &'a PageQuery,
        api_key: &'a str,
    ) -> SourceFuture<'a, AgentPage>;

    /// Looks up a single agent by registry token id.
    fn fetch_agent<'a>(
        &'a self,
        token_id: &'a str,
        api_key: &'a str,
    ) -> SourceFuture<'a, Option<AgentSummary>>;
}
