use agentscan_core::AgentAggregator;
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ChainEntry {
    chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
}

pub fn run(aggregator: &AgentAggregator) -> Result<Value, CliError> {
    let chains = aggregator
        .supported_chains()
        .into_iter()
        .map(|chain_id| ChainEntry {
            chain_id: chain_id.value(),
            name: chain_id.known_name(),
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_value(chains)?)
}
