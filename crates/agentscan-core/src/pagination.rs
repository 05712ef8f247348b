//! Page slicing over a cached merged set.
//!
//! Cursors are the decimal offset of the next page. They carry no signature or
//! expiry; the cache TTL bounds how long a cursor stays meaningful.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheMode, CachedPaginationSet};
use crate::{AgentSummary, SortField, SortOrder, ValidationError};

/// Offset-or-cursor page request. `offset` wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    #[serde(skip)]
    pub cache_mode: CacheMode,
}

impl Pagination {
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn at_offset(offset: usize, limit: usize) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn after_cursor(cursor: impl Into<String>, limit: usize) -> Self {
        Self {
            cursor: Some(cursor.into()),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn resolved_offset(&self) -> usize {
        self.offset
            .or_else(|| self.cursor.as_deref().map(decode_cursor))
            .unwrap_or(0)
    }

    /// Applies the default when unset and clamps to `max_limit`.
    pub fn resolved_limit(
        &self,
        default_limit: usize,
        max_limit: usize,
    ) -> Result<usize, ValidationError> {
        match self.limit {
            Some(0) => Err(ValidationError::ZeroLimit),
            Some(limit) => Ok(limit.min(max_limit.max(1))),
            None => Ok(default_limit.clamp(1, max_limit.max(1))),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentListPage {
    pub items: Vec<AgentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub total: usize,
}

pub fn encode_cursor(offset: usize) -> String {
    offset.to_string()
}

/// Non-numeric cursors fall back to the first page.
pub fn decode_cursor(cursor: &str) -> usize {
    cursor.trim().parse().unwrap_or(0)
}

/// Cuts `[offset, offset + limit)` out of the cached set, re-sorting a copy first
/// when an order other than the fetch order is requested.
pub fn slice(
    set: &CachedPaginationSet,
    offset: usize,
    limit: usize,
    sort: Option<(SortField, SortOrder)>,
) -> AgentListPage {
    let total = set.items.len();
    let start = offset.min(total);
    let end = offset.saturating_add(limit).min(total);

    let items = match sort {
        Some((field, order)) if !(field == SortField::CreatedAt && order == SortOrder::Desc) => {
            let mut ordered = set.items.iter().collect::<Vec<_>>();
            ordered.sort_by(|left, right| compare(left, right, field, order));
            ordered[start..end].iter().map(|item| (*item).clone()).collect()
        }
        _ => set.items[start..end].to_vec(),
    };

    let next_cursor = (end < total).then(|| encode_cursor(end));

    AgentListPage {
        items,
        next_cursor,
        total,
    }
}

/// Stable-sorts a copy of `items`; ties keep their relative order.
pub fn sorted_copy(
    items: &[AgentSummary],
    field: SortField,
    order: SortOrder,
) -> Vec<AgentSummary> {
    let mut copy = items.to_vec();
    copy.sort_by(|left, right| compare(left, right, field, order));
    copy
}

fn compare(
    left: &AgentSummary,
    right: &AgentSummary,
    field: SortField,
    order: SortOrder,
) -> Ordering {
    let ordering = match field {
        SortField::CreatedAt => left.created_at.cmp(&right.created_at),
        SortField::UpdatedAt => left
            .updated_at
            .unwrap_or(left.created_at)
            .cmp(&right.updated_at.unwrap_or(right.created_at)),
        SortField::Name => left.name.to_lowercase().cmp(&right.name.to_lowercase()),
        SortField::ChainId => left.chain_id().cmp(&right.chain_id()),
        SortField::TokenId => compare_token_ids(left.token_id(), right.token_id()),
    };

    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare_token_ids(left: &str, right: &str) -> Ordering {
    match (left.parse::<u128>(), right.parse::<u128>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentId, ChainId, UtcDateTime};

    fn agent(token: &str, name: &str) -> AgentSummary {
        AgentSummary::new(
            AgentId::new(ChainId::SEPOLIA, token).expect("valid id"),
            name,
            "0xowner",
            UtcDateTime::from_unix_seconds(1_700_000_000).expect("valid ts"),
        )
    }

    fn set_of(items: Vec<AgentSummary>) -> CachedPaginationSet {
        CachedPaginationSet::new(items, "hash")
    }

    fn names(items: &[AgentSummary]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_str()).collect()
    }

    #[test]
    fn cursor_round_trips_and_degrades_to_zero() {
        assert_eq!(decode_cursor(&encode_cursor(40)), 40);
        assert_eq!(decode_cursor("not-a-number"), 0);
        assert_eq!(decode_cursor("-5"), 0);
        assert_eq!(decode_cursor(""), 0);
    }

    #[test]
    fn consecutive_slices_are_disjoint_prefixes() {
        let set = set_of((0..10).map(|n| agent(&n.to_string(), "x")).collect());

        let first = slice(&set, 0, 4, None);
        let second = slice(&set, 4, 4, None);
        let third = slice(&set, 8, 4, None);

        assert_eq!(first.next_cursor.as_deref(), Some("4"));
        assert_eq!(second.next_cursor.as_deref(), Some("8"));
        assert_eq!(third.next_cursor, None);
        assert_eq!(third.items.len(), 2);

        let union = [first.items, second.items, third.items].concat();
        assert_eq!(union, set.items);
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let set = set_of(vec![agent("1", "a")]);
        let page = slice(&set, 5, 10, None);

        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn name_sort_is_ascending_and_idempotent() {
        let items = vec![agent("1", "b"), agent("2", "a"), agent("3", "c")];

        let once = sorted_copy(&items, SortField::Name, SortOrder::Asc);
        let twice = sorted_copy(&once, SortField::Name, SortOrder::Asc);

        assert_eq!(names(&once), ["a", "b", "c"]);
        assert_eq!(once, twice);
        assert_eq!(names(&items), ["b", "a", "c"], "source list untouched");
    }

    #[test]
    fn sort_ties_keep_cached_order() {
        let set = set_of(vec![agent("1", "same"), agent("2", "Same"), agent("3", "other")]);
        let page = slice(&set, 0, 3, Some((SortField::Name, SortOrder::Desc)));

        let tokens = page.items.iter().map(|item| item.token_id()).collect::<Vec<_>>();
        assert_eq!(tokens, ["1", "2", "3"]);
    }

    #[test]
    fn token_ids_sort_numerically() {
        let items = vec![agent("10", "x"), agent("9", "y"), agent("100", "z")];
        let sorted = sorted_copy(&items, SortField::TokenId, SortOrder::Asc);
        let tokens = sorted.iter().map(|item| item.token_id()).collect::<Vec<_>>();
        assert_eq!(tokens, ["9", "10", "100"]);
    }

    #[test]
    fn offset_takes_precedence_over_cursor() {
        let pagination = Pagination {
            cursor: Some(String::from("20")),
            offset: Some(5),
            limit: Some(10),
            ..Pagination::default()
        };
        assert_eq!(pagination.resolved_offset(), 5);
        assert_eq!(Pagination::after_cursor("20", 10).resolved_offset(), 20);
        assert_eq!(Pagination::after_cursor("garbage", 10).resolved_offset(), 0);
    }

    #[test]
    fn limit_is_defaulted_clamped_and_validated() {
        assert_eq!(Pagination::default().resolved_limit(20, 100), Ok(20));
        assert_eq!(Pagination::first(500).resolved_limit(20, 100), Ok(100));
        assert_eq!(Pagination::first(0).resolved_limit(20, 100), Err(ValidationError::ZeroLimit));
    }
}
