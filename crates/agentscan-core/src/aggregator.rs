//! Public listing service.
//!
//! ```text
//! get_agents(filters, pagination)
//!   -> resolve chain scope -> fingerprint
//!   -> cache hit?  slice
//!   -> miss: single-flight { fan out -> interleave + dedupe -> store } -> slice
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::SubgraphAdapter;
use crate::cache::{CacheBackend, CacheMode, CacheStore, CachedPaginationSet, PaginationCache};
use crate::circuit_breaker::{CircuitBreakerRegistry, CircuitSnapshot};
use crate::config::AggregatorConfig;
use crate::data_source::AgentSource;
use crate::fingerprint::FilterFingerprint;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::interleave::merge_sources;
use crate::key_rotation::KeyRotationManager;
use crate::orchestrator::ChainQueryOrchestrator;
use crate::pagination::{slice, AgentListPage, Pagination};
use crate::registry::{ChainClientRegistry, ChainConfig, SourceFactory};
use crate::throttling::RequestPacer;
use crate::{AgentFilters, AgentId, AgentSummary, ChainId, CoreError, ValidationError};

/// Multi-chain agent listing with a shared pagination cache.
#[derive(Debug)]
pub struct AgentAggregator {
    registry: Arc<ChainClientRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    orchestrator: ChainQueryOrchestrator,
    cache: PaginationCache,
    flights: crate::singleflight::SingleFlight<Arc<CachedPaginationSet>>,
    default_limit: usize,
    max_limit: usize,
}

impl AgentAggregator {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }

    /// Returns one page of agents matching `filters`.
    ///
    /// Sources that fail are skipped; the call only fails on invalid input.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a zero limit or a chain that is not
    /// configured.
    pub async fn get_agents(
        &self,
        filters: &AgentFilters,
        pagination: &Pagination,
    ) -> Result<AgentListPage, CoreError> {
        let limit = pagination.resolved_limit(self.default_limit, self.max_limit)?;
        let offset = pagination.resolved_offset();
        let chains = self.registry.resolve(&filters.chain_ids)?;
        let scoped = AgentFilters {
            chain_ids: chains.clone(),
            ..filters.normalized()
        };
        let fingerprint = FilterFingerprint::from_filters(&scoped);

        let set = self
            .load_set(&chains, &scoped, &fingerprint, pagination.cache_mode)
            .await;
        let sort = (!scoped.uses_fetch_order()).then_some((scoped.sort, scoped.order));
        Ok(slice(&set, offset, limit, sort))
    }

    /// Looks up one agent by its `chainId:tokenId` identity.
    ///
    /// Unlike listings, a failing upstream is reported to the caller.
    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentSummary>, CoreError> {
        let id = AgentId::parse(agent_id)?;
        let chain_id = id.chain_id();
        self.registry.resolve(&[chain_id])?;

        let token_id = id.token_id().to_owned();
        let found = self
            .orchestrator
            .call_chain(chain_id, move |client, key| {
                let token_id = token_id.clone();
                async move { client.fetch_agent(&token_id, &key).await }
            })
            .await?;
        Ok(found)
    }

    /// Drops the cached listing for `filters`, if any.
    pub async fn invalidate(&self, filters: &AgentFilters) -> Result<(), CoreError> {
        let chains = self.registry.resolve(&filters.chain_ids)?;
        let scoped = AgentFilters {
            chain_ids: chains,
            ..filters.normalized()
        };
        self.cache
            .invalidate(&FilterFingerprint::from_filters(&scoped).key)
            .await;
        Ok(())
    }

    pub fn supported_chains(&self) -> Vec<ChainId> {
        self.registry.supported_chains()
    }

    /// Breaker state for a chain's upstream, once it has been called.
    pub fn circuit_snapshot(&self, chain_id: ChainId) -> Option<CircuitSnapshot> {
        let upstream = self.registry.config(chain_id)?.upstream.as_str();
        self.breakers.get(upstream).map(|breaker| breaker.snapshot())
    }

    async fn load_set(
        &self,
        chains: &[ChainId],
        filters: &AgentFilters,
        fingerprint: &FilterFingerprint,
        mode: CacheMode,
    ) -> Arc<CachedPaginationSet> {
        let key = fingerprint.key.as_str();
        if mode.reads() {
            if let Some(hit) = self.cache.get(key).await {
                debug!(key, total = hit.total, "pagination cache hit");
                return Arc::new(hit);
            }
        }
        if !mode.writes() {
            let (items, _) = self.fetch_merged(chains, filters).await;
            return Arc::new(CachedPaginationSet::new(items, fingerprint.hash.as_str()));
        }

        let loaded = self
            .flights
            .run(key, move || async move {
                if mode.reads() {
                    if let Some(hit) = self.cache.get(key).await {
                        return Ok::<_, Infallible>(Arc::new(hit));
                    }
                }
                debug!(key, "pagination cache miss; fetching sources");

                let (items, all_failed) = self.fetch_merged(chains, filters).await;
                if all_failed {
                    let set = CachedPaginationSet::new(items, fingerprint.hash.as_str());
                    return Ok(Arc::new(set));
                }
                let set = self
                    .cache
                    .set(key, items, &fingerprint.hash, None)
                    .await;
                Ok(Arc::new(set))
            })
            .await;

        match loaded {
            Ok(set) => set,
            Err(never) => match never {},
        }
    }

    /// Fans out, merges, and reports whether every queried source failed.
    async fn fetch_merged(
        &self,
        chains: &[ChainId],
        filters: &AgentFilters,
    ) -> (Vec<AgentSummary>, bool) {
        let outcomes = self.orchestrator.fetch_all(chains, filters).await;
        let all_failed = !outcomes.is_empty() && outcomes.iter().all(|outcome| !outcome.is_ok());
        let merged = merge_sources(outcomes.into_iter().map(|outcome| outcome.items).collect());
        (merged, all_failed)
    }
}

/// Builds an [`AgentAggregator`] from configuration, with optional overrides
/// for the transport, the cache store, or the sources themselves.
#[derive(Default)]
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    sources: Vec<Arc<dyn AgentSource>>,
}

impl AggregatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads configuration from the environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        Ok(Self::new().with_config(AggregatorConfig::from_env()?))
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Serves the source's chain from `source` instead of a subgraph.
    /// Once any source is supplied, configured chains are ignored.
    pub fn with_source(mut self, source: Arc<dyn AgentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn with_user_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.user_api_key = Some(key.into());
        self
    }

    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.config.chains.push(chain);
        self
    }

    pub fn build(self) -> Result<AgentAggregator, ValidationError> {
        let config = self.config;
        let keys = Arc::new(KeyRotationManager::new(config.api_keys(), config.key_strategy)?);

        let registry = if self.sources.is_empty() {
            let http_client = self
                .http_client
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()) as Arc<dyn HttpClient>);
            ChainClientRegistry::new(config.chains.clone(), subgraph_factory(&config, http_client))
        } else {
            ChainClientRegistry::from_sources(self.sources)
        };
        let registry = Arc::new(registry);
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker));

        let backend = self.cache_backend.unwrap_or_else(|| {
            Arc::new(CacheStore::new(config.cache_ttl)) as Arc<dyn CacheBackend>
        });

        info!(
            chains = registry.supported_chains().len(),
            keys = keys.len(),
            strategy = keys.strategy().as_str(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "agent aggregator ready"
        );

        Ok(AgentAggregator {
            orchestrator: ChainQueryOrchestrator::new(
                Arc::clone(&registry),
                Arc::clone(&breakers),
                keys,
                config.fetch,
            ),
            registry,
            breakers,
            cache: PaginationCache::new(backend, config.cache_ttl),
            flights: crate::singleflight::SingleFlight::new(),
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        })
    }
}

fn subgraph_factory(config: &AggregatorConfig, http_client: Arc<dyn HttpClient>) -> SourceFactory {
    let gateway_url = config.gateway_url.clone();
    let timeout_ms = config.request_timeout_ms;
    let requests_per_second = config.requests_per_second;

    Arc::new(move |chain: &ChainConfig| {
        let mut adapter = SubgraphAdapter::new(chain, gateway_url.clone(), Arc::clone(&http_client))
            .with_timeout_ms(timeout_ms);
        if requests_per_second > 0 {
            adapter = adapter.with_pacer(RequestPacer::per_second(requests_per_second));
        }
        Arc::new(adapter) as Arc<dyn AgentSource>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySource;
    use crate::{AgentCapabilities, UtcDateTime, ValidationError};

    fn agent(chain: ChainId, token: &str, age: i64) -> AgentSummary {
        AgentSummary::new(
            AgentId::new(chain, token).expect("valid id"),
            format!("agent {token}"),
            "0xowner",
            UtcDateTime::from_unix_seconds(1_700_000_000 - age).expect("valid ts"),
        )
        .with_capabilities(AgentCapabilities {
            mcp: true,
            ..AgentCapabilities::default()
        })
    }

    fn aggregator(source: Arc<InMemorySource>) -> AgentAggregator {
        AgentAggregator::builder()
            .with_api_key("k1")
            .with_source(source)
            .build()
            .expect("valid aggregator")
    }

    #[test]
    fn build_requires_a_key() {
        let error = AgentAggregator::builder()
            .with_source(Arc::new(InMemorySource::new(ChainId::SEPOLIA, Vec::new())))
            .build()
            .expect_err("no keys");
        assert_eq!(error, ValidationError::NoApiKeys);
    }

    #[tokio::test]
    async fn cache_modes_control_source_traffic() {
        let source = Arc::new(InMemorySource::new(
            ChainId::SEPOLIA,
            vec![agent(ChainId::SEPOLIA, "1", 0), agent(ChainId::SEPOLIA, "2", 10)],
        ));
        let aggregator = aggregator(Arc::clone(&source));
        let filters = AgentFilters::default();

        aggregator.get_agents(&filters, &Pagination::first(10)).await.expect("page");
        aggregator.get_agents(&filters, &Pagination::first(10)).await.expect("page");
        assert_eq!(source.page_calls(), 1);

        let refresh = Pagination::first(10).with_cache_mode(CacheMode::Refresh);
        aggregator.get_agents(&filters, &refresh).await.expect("page");
        assert_eq!(source.page_calls(), 2);

        let bypass = Pagination::first(10).with_cache_mode(CacheMode::Bypass);
        aggregator.get_agents(&filters, &bypass).await.expect("page");
        aggregator.get_agents(&filters, &Pagination::first(10)).await.expect("page");
        assert_eq!(source.page_calls(), 3, "bypass neither reads nor writes");
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let source = Arc::new(InMemorySource::new(
            ChainId::SEPOLIA,
            vec![agent(ChainId::SEPOLIA, "1", 0)],
        ));
        let aggregator = aggregator(Arc::clone(&source));
        let filters = AgentFilters::default();

        aggregator.get_agents(&filters, &Pagination::first(5)).await.expect("page");
        aggregator.invalidate(&filters).await.expect("configured chains");
        aggregator.get_agents(&filters, &Pagination::first(5)).await.expect("page");

        assert_eq!(source.page_calls(), 2);
    }

    #[tokio::test]
    async fn explicit_full_scope_shares_the_cache_with_default_scope() {
        let source = Arc::new(InMemorySource::new(
            ChainId::SEPOLIA,
            vec![agent(ChainId::SEPOLIA, "1", 0)],
        ));
        let aggregator = aggregator(Arc::clone(&source));

        aggregator
            .get_agents(&AgentFilters::default(), &Pagination::first(5))
            .await
            .expect("page");
        aggregator
            .get_agents(&AgentFilters::for_chains([ChainId::SEPOLIA]), &Pagination::first(5))
            .await
            .expect("page");

        assert_eq!(source.page_calls(), 1);
    }

    #[tokio::test]
    async fn total_outage_is_not_cached() {
        let source = Arc::new(
            InMemorySource::new(ChainId::SEPOLIA, vec![agent(ChainId::SEPOLIA, "1", 0)])
                .failing_next([crate::SourceError::unavailable("502")]),
        );
        let aggregator = aggregator(Arc::clone(&source));
        let filters = AgentFilters::default();

        let outage = aggregator.get_agents(&filters, &Pagination::first(5)).await.expect("page");
        let recovered = aggregator.get_agents(&filters, &Pagination::first(5)).await.expect("page");

        assert!(outage.items.is_empty());
        assert_eq!(recovered.total, 1);
    }

    #[tokio::test]
    async fn get_agent_routes_by_chain() {
        let source = Arc::new(InMemorySource::new(
            ChainId::SEPOLIA,
            vec![agent(ChainId::SEPOLIA, "42", 0)],
        ));
        let aggregator = aggregator(Arc::clone(&source));

        let found = aggregator.get_agent("11155111:42").await.expect("lookup");
        assert_eq!(found.map(|agent| agent.id.to_string()), Some(String::from("11155111:42")));

        assert!(matches!(
            aggregator.get_agent("137:1").await,
            Err(CoreError::Validation(ValidationError::UnsupportedChain { chain_id: 137 }))
        ));
        assert!(matches!(
            aggregator.get_agent("nonsense").await,
            Err(CoreError::Validation(ValidationError::MalformedAgentId { .. }))
        ));
    }
}
