//! Per-chain source clients, created on first use and shared afterwards.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::data_source::{AgentSource, SourceError};
use crate::{ChainId, ValidationError};

/// One configured chain deployment of the agent registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub name: String,
    pub subgraph_id: String,
    /// Circuit breaker name for this chain's upstream.
    pub upstream: String,
}

impl ChainConfig {
    pub fn new(chain_id: ChainId, subgraph_id: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: chain_id
                .known_name()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("chain-{chain_id}")),
            subgraph_id: subgraph_id.into(),
            upstream: format!("subgraph-gateway:{chain_id}"),
        }
    }

    /// Names the breaker this chain reports to. Chains sharing a name share
    /// one breaker.
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = upstream.into();
        self
    }
}

impl FromStr for ChainConfig {
    type Err = ValidationError;

    /// Parses `chainId=subgraphId[@upstream]`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidChainSpec {
            value: value.to_owned(),
        };
        let (chain, target) = value.trim().split_once('=').ok_or_else(invalid)?;
        let (subgraph, upstream) = match target.split_once('@') {
            Some((subgraph, upstream)) => (subgraph.trim(), Some(upstream.trim())),
            None => (target.trim(), None),
        };
        if subgraph.is_empty() || upstream.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        let config = Self::new(chain.trim().parse()?, subgraph);
        Ok(match upstream {
            Some(upstream) => config.with_upstream(upstream),
            None => config,
        })
    }
}

pub type SourceFactory = Arc<dyn Fn(&ChainConfig) -> Arc<dyn AgentSource> + Send + Sync>;

/// Owns the chain catalog and lazily builds one [`AgentSource`] per chain.
pub struct ChainClientRegistry {
    chains: BTreeMap<ChainId, ChainConfig>,
    clients: DashMap<ChainId, Arc<dyn AgentSource>>,
    factory: SourceFactory,
}

impl Debug for ChainClientRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClientRegistry")
            .field("chains", &self.chains.keys().collect::<Vec<_>>())
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl ChainClientRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainConfig>, factory: SourceFactory) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|config| (config.chain_id, config))
                .collect(),
            clients: DashMap::new(),
            factory,
        }
    }

    /// Registry whose chains are served by pre-built sources.
    pub fn from_sources(sources: impl IntoIterator<Item = Arc<dyn AgentSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.chain_id(), source))
            .collect::<BTreeMap<_, _>>();
        let chains = sources
            .keys()
            .map(|chain_id| ChainConfig::new(*chain_id, format!("local-{chain_id}")))
            .collect::<Vec<_>>();
        let clients = sources.into_iter().collect::<DashMap<_, _>>();
        let fallback: SourceFactory = Arc::new(|config: &ChainConfig| {
            Arc::new(crate::adapters::InMemorySource::new(config.chain_id, Vec::new()))
                as Arc<dyn AgentSource>
        });

        let mut registry = Self::new(chains, fallback);
        registry.clients = clients;
        registry
    }

    /// Returns the client for `chain_id`, creating it on first use.
    pub fn get(&self, chain_id: ChainId) -> Result<Arc<dyn AgentSource>, SourceError> {
        if let Some(existing) = self.clients.get(&chain_id) {
            return Ok(Arc::clone(existing.value()));
        }
        let config = self
            .chains
            .get(&chain_id)
            .ok_or_else(|| SourceError::unsupported_chain(chain_id))?;

        let client = self
            .clients
            .entry(chain_id)
            .or_insert_with(|| {
                debug!(
                    chain_id = %chain_id,
                    subgraph = %config.subgraph_id,
                    "creating chain client"
                );
                (self.factory)(config)
            })
            .value()
            .clone();
        Ok(client)
    }

    pub fn config(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    /// Configured chains in ascending id order.
    pub fn supported_chains(&self) -> Vec<ChainId> {
        self.chains.keys().copied().collect()
    }

    /// Resolves a requested chain scope. Empty means every configured chain;
    /// otherwise ids are deduplicated, sorted, and must all be configured.
    pub fn resolve(&self, requested: &[ChainId]) -> Result<Vec<ChainId>, ValidationError> {
        if requested.is_empty() {
            return Ok(self.supported_chains());
        }

        let mut resolved = requested.to_vec();
        resolved.sort_unstable();
        resolved.dedup();
        if let Some(unknown) = resolved.iter().find(|chain| !self.chains.contains_key(chain)) {
            return Err(ValidationError::UnsupportedChain {
                chain_id: unknown.value(),
            });
        }
        Ok(resolved)
    }
}
