use agentscan_core::{AgentAggregator, AgentFilters, CacheMode, ChainId, Pagination};
use serde_json::Value;
use tracing::debug;

use crate::cli::ListArgs;
use crate::error::CliError;

pub async fn run(args: &ListArgs, aggregator: &AgentAggregator) -> Result<Value, CliError> {
    let filters = filters_from(args)?;
    let pagination = pagination_from(args);
    debug!(
        chains = filters.chain_ids.len(),
        offset = pagination.resolved_offset(),
        limit = ?pagination.limit,
        cache_mode = ?pagination.cache_mode,
        "listing agents"
    );

    let page = aggregator.get_agents(&filters, &pagination).await?;
    Ok(serde_json::to_value(page)?)
}

fn filters_from(args: &ListArgs) -> Result<AgentFilters, CliError> {
    let chain_ids = args
        .chains
        .iter()
        .map(|raw| raw.parse::<ChainId>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AgentFilters {
        chain_ids,
        mcp: args.mcp,
        a2a: args.a2a,
        x402: args.x402,
        active: args.active,
        owner: args.owner.clone(),
        name_contains: args.name.clone(),
        skills: args.skills.clone(),
        domains: args.domains.clone(),
        sort: args.sort.into(),
        order: args.order.into(),
    })
}

fn pagination_from(args: &ListArgs) -> Pagination {
    let cache_mode = if args.cache.no_cache {
        CacheMode::Bypass
    } else if args.cache.refresh {
        CacheMode::Refresh
    } else {
        CacheMode::Use
    };

    Pagination {
        cursor: args.cursor.clone(),
        offset: args.offset,
        limit: args.limit,
        cache_mode,
    }
}
