use thiserror::Error;

use crate::data_source::SourceError;

/// Validation and configuration errors exposed by `agentscan-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("agent id cannot be empty")]
    EmptyAgentId,
    #[error("agent id must look like 'chainId:tokenId': '{value}'")]
    MalformedAgentId { value: String },

    #[error("chain id must be a positive integer: '{value}'")]
    InvalidChainId { value: String },
    #[error("chain {chain_id} is not configured")]
    UnsupportedChain { chain_id: u64 },
    #[error("chain entry must look like 'chainId=subgraphId': '{value}'")]
    InvalidChainSpec { value: String },

    #[error("page limit must be greater than zero")]
    ZeroLimit,
    #[error(
        "invalid sort field '{value}', expected one of \
         created_at, updated_at, name, chain_id, token_id"
    )]
    InvalidSortField { value: String },
    #[error("invalid sort order '{value}', expected asc or desc")]
    InvalidSortOrder { value: String },

    #[error("at least one upstream api key is required")]
    NoApiKeys,
    #[error("invalid key rotation strategy '{value}', expected round-robin or failover")]
    InvalidRotationStrategy { value: String },
    #[error("setting {name} has invalid value '{value}'")]
    InvalidSetting { name: &'static str, value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unix timestamp out of range: {value}")]
    TimestampOutOfRange { value: i64 },
}

/// Top-level error type for aggregation operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
