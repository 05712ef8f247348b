//! # Domain Models
//!
//! Canonical domain types for agent registry listings.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AgentId`] | `chainId:tokenId` identity |
//! | [`AgentSummary`] | Registered agent snapshot |
//! | [`AgentCapabilities`] | MCP / A2A / x402 flags |
//! | [`AgentFilters`] | Listing filter set |
//! | [`SortField`] / [`SortOrder`] | Listing order |
//! | [`UtcDateTime`] | UTC timestamp |

mod agent;
mod filters;
mod timestamp;

pub use agent::{AgentCapabilities, AgentId, AgentSummary};
pub use filters::{AgentFilters, SortField, SortOrder};
pub use timestamp::UtcDateTime;
