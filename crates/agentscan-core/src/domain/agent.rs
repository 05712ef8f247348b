use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ChainId, UtcDateTime, ValidationError};

/// Global agent identity: the registry token id scoped to the chain it lives on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId {
    chain_id: ChainId,
    token_id: String,
}

impl AgentId {
    pub fn new(chain_id: ChainId, token_id: impl Into<String>) -> Result<Self, ValidationError> {
        let token_id = token_id.into();
        let trimmed = token_id.trim();
        if trimmed.is_empty() || trimmed.contains(':') {
            return Err(ValidationError::MalformedAgentId {
                value: format!("{chain_id}:{token_id}"),
            });
        }

        Ok(Self {
            chain_id,
            token_id: trimmed.to_owned(),
        })
    }

    /// Parses the `chainId:tokenId` form.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAgentId);
        }

        let malformed = || ValidationError::MalformedAgentId {
            value: trimmed.to_owned(),
        };
        let (chain, token) = trimmed.split_once(':').ok_or_else(malformed)?;
        let chain_id = chain.parse::<ChainId>().map_err(|_| malformed())?;
        Self::new(chain_id, token).map_err(|_| malformed())
    }

    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.token_id)
    }
}

impl FromStr for AgentId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for AgentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.to_string()
    }
}

/// Protocol endpoints an agent advertises in its registration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub mcp: bool,
    pub a2a: bool,
    pub x402: bool,
}

/// Snapshot of one registered agent as returned by a chain source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub active: bool,
    pub capabilities: AgentCapabilities,
    pub owner: String,
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub created_at: UtcDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<UtcDateTime>,
}

impl AgentSummary {
    /// Minimal summary; remaining fields start empty and are filled by the caller.
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        owner: impl Into<String>,
        created_at: UtcDateTime,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            image: None,
            active: true,
            capabilities: AgentCapabilities::default(),
            owner: owner.into(),
            operators: Vec::new(),
            skills: Vec::new(),
            domains: Vec::new(),
            created_at,
            updated_at: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub const fn chain_id(&self) -> ChainId {
        self.id.chain_id()
    }

    pub fn token_id(&self) -> &str {
        self.id.token_id()
    }
}
