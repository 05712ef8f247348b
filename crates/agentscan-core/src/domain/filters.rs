use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ChainId, ValidationError};

/// Field a listing can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    ChainId,
    TokenId,
}

impl SortField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Name => "name",
            Self::ChainId => "chain_id",
            Self::TokenId => "token_id",
        }
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "created_at" | "createdat" => Ok(Self::CreatedAt),
            "updated_at" | "updatedat" => Ok(Self::UpdatedAt),
            "name" => Ok(Self::Name),
            "chain_id" | "chainid" => Ok(Self::ChainId),
            "token_id" | "tokenid" => Ok(Self::TokenId),
            other => Err(ValidationError::InvalidSortField {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ValidationError::InvalidSortOrder {
                value: other.to_owned(),
            }),
        }
    }
}

/// Filter set for an agent listing.
///
/// Every field here changes which agents qualify or the order they are served in,
/// so all of them take part in the listing fingerprint. Pagination knobs live in
/// [`Pagination`](crate::Pagination) instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFilters {
    /// Chains to query. Empty means every configured chain.
    #[serde(default)]
    pub chain_ids: Vec<ChainId>,
    pub mcp: Option<bool>,
    pub a2a: Option<bool>,
    pub x402: Option<bool>,
    pub active: Option<bool>,
    pub owner: Option<String>,
    pub name_contains: Option<String>,
    /// OASF skill slugs an agent must advertise.
    #[serde(default)]
    pub skills: Vec<String>,
    /// OASF domain slugs an agent must advertise.
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl AgentFilters {
    pub fn for_chains(chain_ids: impl IntoIterator<Item = ChainId>) -> Self {
        Self {
            chain_ids: chain_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_mcp(mut self, mcp: bool) -> Self {
        self.mcp = Some(mcp);
        self
    }

    pub fn with_a2a(mut self, a2a: bool) -> Self {
        self.a2a = Some(a2a);
        self
    }

    pub fn with_sort(mut self, sort: SortField, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    /// Canonical form of the filter set: owner and name trimmed (owner also
    /// lowercased) and dropped when blank, skill and domain slugs trimmed,
    /// blank ones dropped, then sorted and deduplicated.
    ///
    /// Listings fingerprint and fetch this form, so two filter sets share a
    /// cache entry only when the upstream sees the same query for both.
    pub fn normalized(&self) -> Self {
        Self {
            owner: normalized_text(self.owner.as_deref()).map(str::to_ascii_lowercase),
            name_contains: normalized_text(self.name_contains.as_deref()).map(str::to_owned),
            skills: sorted_set(&self.skills),
            domains: sorted_set(&self.domains),
            ..self.clone()
        }
    }

    /// True when the listing is served in the order it was fetched.
    pub fn uses_fetch_order(&self) -> bool {
        self.sort == SortField::CreatedAt && self.order == SortOrder::Desc
    }
}

fn normalized_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn sorted_set(values: &[String]) -> Vec<String> {
    let mut out = values
        .iter()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_parses_snake_and_camel_case() {
        assert_eq!("createdAt".parse::<SortField>(), Ok(SortField::CreatedAt));
        assert_eq!("token_id".parse::<SortField>(), Ok(SortField::TokenId));
        assert!(matches!(
            "reputation".parse::<SortField>(),
            Err(ValidationError::InvalidSortField { .. })
        ));
    }

    #[test]
    fn default_filters_keep_fetch_order() {
        let filters = AgentFilters::default();
        assert!(filters.uses_fetch_order());

        let by_name = filters.with_sort(SortField::Name, SortOrder::Asc);
        assert!(!by_name.uses_fetch_order());
    }

    #[test]
    fn normalized_drops_blank_slugs_and_trims_text() {
        let filters = AgentFilters {
            owner: Some(" 0xABC ".into()),
            name_contains: Some("   ".into()),
            skills: vec![" nlp".into(), String::new(), "code".into(), "nlp".into()],
            domains: vec!["  ".into()],
            ..AgentFilters::default()
        };

        let normalized = filters.normalized();

        assert_eq!(normalized.owner.as_deref(), Some("0xabc"));
        assert_eq!(normalized.name_contains, None);
        assert_eq!(normalized.skills, vec!["code", "nlp"]);
        assert!(normalized.domains.is_empty());
        assert_eq!(normalized.normalized(), normalized);
    }
}
