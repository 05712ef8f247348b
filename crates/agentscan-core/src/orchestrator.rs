//! Concurrent, bounded fan-out across chain sources.
//!
//! Each chain is paged independently behind its own circuit breaker and the
//! shared key rotation. A chain that fails contributes nothing; the fan-out as
//! a whole always settles with one outcome per chain.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::data_source::{AgentPage, AgentSource, PageQuery, SourceError};
use crate::key_rotation::KeyRotationManager;
use crate::registry::ChainClientRegistry;
use crate::{AgentFilters, AgentSummary, ChainId};

/// Per-source paging bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub page_size: usize,
    /// Hard stop on items taken from one source per fetch.
    pub per_source_cap: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            per_source_cap: 200,
        }
    }
}

/// What one chain contributed to a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    pub chain_id: ChainId,
    pub items: Vec<AgentSummary>,
    pub pages: usize,
    pub error: Option<SourceError>,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fans out one bounded paginated fetch per chain.
#[derive(Debug, Clone)]
pub struct ChainQueryOrchestrator {
    registry: Arc<ChainClientRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    keys: Arc<KeyRotationManager>,
    limits: FetchLimits,
}

impl ChainQueryOrchestrator {
    pub fn new(
        registry: Arc<ChainClientRegistry>,
        breakers: Arc<CircuitBreakerRegistry>,
        keys: Arc<KeyRotationManager>,
        limits: FetchLimits,
    ) -> Self {
        Self {
            registry,
            breakers,
            keys,
            limits,
        }
    }

    pub const fn limits(&self) -> FetchLimits {
        self.limits
    }

    /// Queries every chain in `chains` concurrently and waits for all of them.
    /// Outcomes come back in the order of `chains`.
    pub async fn fetch_all(
        &self,
        chains: &[ChainId],
        filters: &AgentFilters,
    ) -> Vec<SourceOutcome> {
        let fetches = chains
            .iter()
            .map(|chain_id| self.fetch_chain(*chain_id, filters));
        let outcomes = join_all(fetches).await;

        let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
        debug!(
            sources = outcomes.len(),
            failed,
            items = outcomes.iter().map(|outcome| outcome.items.len()).sum::<usize>(),
            "chain fan-out settled"
        );
        outcomes
    }

    /// Runs `call` against one chain's client behind its breaker and key rotation.
    pub async fn call_chain<T, F, Fut>(&self, chain_id: ChainId, call: F) -> Result<T, SourceError>
    where
        F: Fn(Arc<dyn AgentSource>, String) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let client = self.registry.get(chain_id)?;
        let upstream = self
            .registry
            .config(chain_id)
            .map(|config| config.upstream.clone())
            .unwrap_or_else(|| format!("subgraph-gateway:{chain_id}"));
        let breaker = self.breakers.get_or_create(&upstream);
        let call = &call;

        breaker
            .execute(move || {
                self.keys
                    .execute_with_retry(move |key| call(Arc::clone(&client), key))
            })
            .await
    }

    async fn fetch_chain(&self, chain_id: ChainId, filters: &AgentFilters) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            chain_id,
            items: Vec::new(),
            pages: 0,
            error: None,
        };

        let mut cursor = None;
        loop {
            let remaining = self.limits.per_source_cap.saturating_sub(outcome.items.len());
            if remaining == 0 {
                break;
            }
            let first = self.limits.page_size.min(remaining);

            let page = match self.fetch_page(chain_id, filters, first, cursor.take()).await {
                Ok(page) => page,
                Err(error) => {
                    log_source_failure(chain_id, &error);
                    outcome.items.clear();
                    outcome.error = Some(error);
                    return outcome;
                }
            };

            outcome.pages += 1;
            let exhausted = page.items.len() < first || page.next_cursor.is_none();
            outcome.items.extend(page.items.into_iter().take(remaining));
            if exhausted {
                break;
            }
            cursor = page.next_cursor;
        }

        debug!(
            chain_id = %chain_id,
            items = outcome.items.len(),
            pages = outcome.pages,
            "chain fetch complete"
        );
        outcome
    }

    async fn fetch_page(
        &self,
        chain_id: ChainId,
        filters: &AgentFilters,
        first: usize,
        cursor: Option<String>,
    ) -> Result<AgentPage, SourceError> {
        let query = PageQuery::new(filters.clone(), first)?.after(cursor);
        let query = &query;
        self.call_chain(chain_id, move |client, key| async move {
            client.fetch_page(query, &key).await
        })
        .await
    }
}

fn log_source_failure(chain_id: ChainId, error: &SourceError) {
    if error.is_expected() {
        debug!(
            chain_id = %chain_id,
            code = error.code(),
            error = %error,
            "chain source unavailable; skipping"
        );
    } else {
        warn!(
            chain_id = %chain_id,
            code = error.code(),
            error = %error,
            "chain source failed; skipping"
        );
    }
}
