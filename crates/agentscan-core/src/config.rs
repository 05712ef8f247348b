//! Aggregator configuration.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | Gateway base URL | `AGENTSCAN_GATEWAY_URL` | `GRAPH_GATEWAY_URL` |
//! | Chains (`id=subgraph[@upstream],...`) | `AGENTSCAN_CHAINS` | - |
//! | Shared API key | `AGENTSCAN_GRAPH_API_KEY` | `GRAPH_API_KEY` |
//! | User API key | `AGENTSCAN_USER_GRAPH_API_KEY` | - |
//! | Key strategy | `AGENTSCAN_KEY_STRATEGY` | - |
//! | Cache TTL (s) | `AGENTSCAN_CACHE_TTL_SECS` | - |
//! | Source page size | `AGENTSCAN_PAGE_SIZE` | - |
//! | Per-source cap | `AGENTSCAN_SOURCE_CAP` | - |
//! | Default / max page limit | `AGENTSCAN_DEFAULT_LIMIT` / `AGENTSCAN_MAX_LIMIT` | - |
//! | Request timeout (ms) | `AGENTSCAN_REQUEST_TIMEOUT_MS` | - |
//! | Breaker threshold | `AGENTSCAN_BREAKER_THRESHOLD` | - |
//! | Breaker cooldown (ms) | `AGENTSCAN_BREAKER_COOLDOWN_MS` | - |
//! | Requests per second per chain | `AGENTSCAN_REQUESTS_PER_SECOND` | - |

use std::str::FromStr;
use std::time::Duration;

use crate::adapters::DEFAULT_GATEWAY_URL;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::key_rotation::RotationStrategy;
use crate::orchestrator::FetchLimits;
use crate::registry::ChainConfig;
use crate::ValidationError;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub gateway_url: String,
    pub chains: Vec<ChainConfig>,
    pub api_key: Option<String>,
    pub user_api_key: Option<String>,
    pub key_strategy: RotationStrategy,
    pub cache_ttl: Duration,
    pub fetch: FetchLimits,
    pub default_limit: usize,
    pub max_limit: usize,
    pub request_timeout_ms: u64,
    pub breaker: CircuitBreakerConfig,
    /// `0` disables client-side pacing.
    pub requests_per_second: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            chains: Vec::new(),
            api_key: None,
            user_api_key: None,
            key_strategy: RotationStrategy::default(),
            cache_ttl: Duration::from_secs(300),
            fetch: FetchLimits::default(),
            default_limit: 20,
            max_limit: 100,
            request_timeout_ms: 10_000,
            breaker: CircuitBreakerConfig::default(),
            requests_per_second: 10,
        }
    }
}

impl AggregatorConfig {
    /// Reads the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(&lookup))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(url) = read("AGENTSCAN_GATEWAY_URL", Some("GRAPH_GATEWAY_URL")) {
            config.gateway_url = url;
        }
        if let Some(chains) = read("AGENTSCAN_CHAINS", None) {
            config.chains = parse_chains(&chains)?;
        }
        config.api_key = read("AGENTSCAN_GRAPH_API_KEY", Some("GRAPH_API_KEY"));
        config.user_api_key = read("AGENTSCAN_USER_GRAPH_API_KEY", None);
        if let Some(strategy) = read("AGENTSCAN_KEY_STRATEGY", None) {
            config.key_strategy = strategy.parse()?;
        }

        let ttl = read("AGENTSCAN_CACHE_TTL_SECS", None);
        if let Some(secs) = parse_setting::<u64>("AGENTSCAN_CACHE_TTL_SECS", ttl)? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        let page_size = read("AGENTSCAN_PAGE_SIZE", None);
        if let Some(size) = parse_positive("AGENTSCAN_PAGE_SIZE", page_size)? {
            config.fetch.page_size = size;
        }
        let source_cap = read("AGENTSCAN_SOURCE_CAP", None);
        if let Some(cap) = parse_positive("AGENTSCAN_SOURCE_CAP", source_cap)? {
            config.fetch.per_source_cap = cap;
        }
        let default_limit = read("AGENTSCAN_DEFAULT_LIMIT", None);
        if let Some(limit) = parse_positive("AGENTSCAN_DEFAULT_LIMIT", default_limit)? {
            config.default_limit = limit;
        }
        let max_limit = read("AGENTSCAN_MAX_LIMIT", None);
        if let Some(limit) = parse_positive("AGENTSCAN_MAX_LIMIT", max_limit)? {
            config.max_limit = limit;
        }
        if let Some(ms) = parse_setting::<u64>(
            "AGENTSCAN_REQUEST_TIMEOUT_MS",
            read("AGENTSCAN_REQUEST_TIMEOUT_MS", None),
        )? {
            config.request_timeout_ms = ms.max(1);
        }
        if let Some(threshold) = parse_setting::<u32>(
            "AGENTSCAN_BREAKER_THRESHOLD",
            read("AGENTSCAN_BREAKER_THRESHOLD", None),
        )? {
            config.breaker.failure_threshold = threshold.max(1);
        }
        if let Some(ms) = parse_setting::<u64>(
            "AGENTSCAN_BREAKER_COOLDOWN_MS",
            read("AGENTSCAN_BREAKER_COOLDOWN_MS", None),
        )? {
            config.breaker.cooldown = Duration::from_millis(ms);
        }
        if let Some(rps) = parse_setting::<u32>(
            "AGENTSCAN_REQUESTS_PER_SECOND",
            read("AGENTSCAN_REQUESTS_PER_SECOND", None),
        )? {
            config.requests_per_second = rps;
        }

        if config.default_limit > config.max_limit {
            config.default_limit = config.max_limit;
        }
        Ok(config)
    }

    /// Candidate upstream keys in priority order.
    pub fn api_keys(&self) -> Vec<String> {
        self.api_key
            .iter()
            .chain(self.user_api_key.iter())
            .cloned()
            .collect()
    }
}

/// Parses `id=subgraph[@upstream][,id=subgraph...]`.
pub fn parse_chains(raw: &str) -> Result<Vec<ChainConfig>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ChainConfig::from_str)
        .collect()
}

fn parse_setting<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ValidationError> {
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|_| ValidationError::InvalidSetting { name, value })
    })
    .transpose()
}

fn parse_positive(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<usize>, ValidationError> {
    match parse_setting::<usize>(name, raw.clone())? {
        Some(0) => Err(ValidationError::InvalidSetting {
            name,
            value: raw.unwrap_or_default(),
        }),
        other => Ok(other),
    }
}
