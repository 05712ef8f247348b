use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::data_source::{AgentPage, AgentSource, PageQuery, SourceError, SourceFuture};
use crate::{AgentFilters, AgentSummary, ChainId};

/// In-process [`AgentSource`] serving a fixed list of agents.
///
/// Items are served in the order given, paged with a skip cursor like the
/// subgraph adapter. Failures can be scripted per call or per key, which makes
/// it the workhorse for offline fixtures and resilience tests.
#[derive(Debug)]
pub struct InMemorySource {
    chain_id: ChainId,
    agents: Vec<AgentSummary>,
    latency: Duration,
    permanent_failure: Option<SourceError>,
    rejected_key: Option<(String, SourceError)>,
    scripted_failures: Mutex<VecDeque<SourceError>>,
    page_calls: AtomicUsize,
    agent_calls: AtomicUsize,
    requested_sizes: Mutex<Vec<usize>>,
    seen_keys: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new(chain_id: ChainId, agents: Vec<AgentSummary>) -> Self {
        Self {
            chain_id,
            agents,
            latency: Duration::ZERO,
            permanent_failure: None,
            rejected_key: None,
            scripted_failures: Mutex::new(VecDeque::new()),
            page_calls: AtomicUsize::new(0),
            agent_calls: AtomicUsize::new(0),
            requested_sizes: Mutex::new(Vec::new()),
            seen_keys: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `error`.
    pub fn failing_with(mut self, error: SourceError) -> Self {
        self.permanent_failure = Some(error);
        self
    }

    /// Calls made with `key` fail with `error`.
    pub fn rejecting_key(mut self, key: impl Into<String>, error: SourceError) -> Self {
        self.rejected_key = Some((key.into(), error));
        self
    }

    /// The next `errors.len()` calls fail in order, then the source recovers.
    pub fn failing_next(self, errors: impl IntoIterator<Item = SourceError>) -> Self {
        lock(&self.scripted_failures).extend(errors);
        self
    }

    /// Delays every call, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn agent_calls(&self) -> usize {
        self.agent_calls.load(Ordering::SeqCst)
    }

    /// Page sizes requested so far, in call order.
    pub fn requested_sizes(&self) -> Vec<usize> {
        lock(&self.requested_sizes).clone()
    }

    /// Keys presented so far, in call order.
    pub fn seen_keys(&self) -> Vec<String> {
        lock(&self.seen_keys).clone()
    }

    async fn admit(&self, api_key: &str) -> Result<(), SourceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        lock(&self.seen_keys).push(api_key.to_owned());

        if let Some(error) = &self.permanent_failure {
            return Err(error.clone());
        }
        if let Some((key, error)) = &self.rejected_key {
            if key == api_key {
                return Err(error.clone());
            }
        }
        match lock(&self.scripted_failures).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn matching(&self, filters: &AgentFilters) -> Vec<&AgentSummary> {
        let filters = filters.normalized();
        self.agents
            .iter()
            .filter(|agent| matches_filters(agent, &filters))
            .collect()
    }
}

impl AgentSource for InMemorySource {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn fetch_page<'a>(
        &'a self,
        query: &'a PageQuery,
        api_key: &'a str,
    ) -> SourceFuture<'a, AgentPage> {
        Box::pin(async move {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.requested_sizes).push(query.first);
            self.admit(api_key).await?;

            let matching = self.matching(&query.filters);
            let total = matching.len();
            let skip = query
                .cursor
                .as_deref()
                .and_then(|cursor| cursor.parse::<usize>().ok())
                .unwrap_or(0)
                .min(total);
            let end = skip.saturating_add(query.first).min(total);

            Ok(AgentPage {
                items: matching[skip..end].iter().map(|agent| (*agent).clone()).collect(),
                next_cursor: (end < total).then(|| end.to_string()),
                total: Some(total),
            })
        })
    }

    fn fetch_agent<'a>(
        &'a self,
        token_id: &'a str,
        api_key: &'a str,
    ) -> SourceFuture<'a, Option<AgentSummary>> {
        Box::pin(async move {
            self.agent_calls.fetch_add(1, Ordering::SeqCst);
            self.admit(api_key).await?;
            Ok(self
                .agents
                .iter()
                .find(|agent| agent.token_id() == token_id)
                .cloned())
        })
    }
}

/// Applies the listing predicates the subgraph evaluates server-side.
///
/// Expects filters in [`AgentFilters::normalized`] form.
pub fn matches_filters(agent: &AgentSummary, filters: &AgentFilters) -> bool {
    let flag_matches =
        |wanted: Option<bool>, actual: bool| wanted.map_or(true, |wanted| wanted == actual);

    flag_matches(filters.mcp, agent.capabilities.mcp)
        && flag_matches(filters.a2a, agent.capabilities.a2a)
        && flag_matches(filters.x402, agent.capabilities.x402)
        && flag_matches(filters.active, agent.active)
        && filters
            .owner
            .as_deref()
            .map_or(true, |owner| agent.owner.eq_ignore_ascii_case(owner))
        && filters.name_contains.as_deref().map_or(true, |needle| {
            agent.name.to_lowercase().contains(&needle.to_lowercase())
        })
        && filters.skills.iter().all(|skill| agent.skills.contains(skill))
        && filters.domains.iter().all(|domain| agent.domains.contains(domain))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentCapabilities, AgentId, UtcDateTime};

    fn agent(token: &str, mcp: bool) -> AgentSummary {
        AgentSummary::new(
            AgentId::new(ChainId::SEPOLIA, token).expect("valid id"),
            format!("Agent {token}"),
            "0xAbC",
            UtcDateTime::from_unix_seconds(1_700_000_000).expect("valid ts"),
        )
        .with_capabilities(AgentCapabilities {
            mcp,
            ..AgentCapabilities::default()
        })
    }

    #[tokio::test]
    async fn pages_with_skip_cursor() {
        let source = InMemorySource::new(
            ChainId::SEPOLIA,
            (1..=5).map(|n| agent(&n.to_string(), true)).collect(),
        );
        let query = PageQuery::new(AgentFilters::default(), 2).expect("valid query");

        let first = source.fetch_page(&query, "k").await.expect("page");
        let second = source
            .fetch_page(&query.clone().after(first.next_cursor.clone()), "k")
            .await
            .expect("page");

        assert_eq!(first.next_cursor.as_deref(), Some("2"));
        assert_eq!(second.items[0].token_id(), "3");
        assert_eq!(source.page_calls(), 2);
    }

    #[tokio::test]
    async fn applies_capability_and_owner_predicates() {
        let source =
            InMemorySource::new(ChainId::SEPOLIA, vec![agent("1", true), agent("2", false)]);
        let filters = AgentFilters {
            owner: Some("0xabc".into()),
            ..AgentFilters::default().with_mcp(true)
        };
        let query = PageQuery::new(filters, 10).expect("valid query");

        let page = source.fetch_page(&query, "k").await.expect("page");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].token_id(), "1");
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let source = InMemorySource::new(ChainId::SEPOLIA, vec![agent("1", true)])
            .failing_next([SourceError::rate_limited("429")]);
        let query = PageQuery::new(AgentFilters::default(), 10).expect("valid query");

        assert!(source.fetch_page(&query, "k").await.is_err());
        assert!(source.fetch_page(&query, "k").await.is_ok());
    }

    #[tokio::test]
    async fn finds_single_agent() {
        let source = InMemorySource::new(ChainId::SEPOLIA, vec![agent("7", false)]);
        assert!(source.fetch_agent("7", "k").await.expect("ok").is_some());
        assert!(source.fetch_agent("8", "k").await.expect("ok").is_none());
    }
}
