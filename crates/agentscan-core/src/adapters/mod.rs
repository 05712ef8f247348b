mod memory;
mod subgraph;

pub use memory::{matches_filters, InMemorySource};
pub use subgraph::{
    classify_graphql_error, classify_status, where_clause, SubgraphAdapter, DEFAULT_GATEWAY_URL,
};
