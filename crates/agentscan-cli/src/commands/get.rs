use agentscan_core::AgentAggregator;
use serde_json::Value;
use tracing::debug;

use crate::cli::GetArgs;
use crate::error::CliError;

pub async fn run(args: &GetArgs, aggregator: &AgentAggregator) -> Result<Value, CliError> {
    debug!(agent_id = %args.id, "looking up agent");
    match aggregator.get_agent(&args.id).await? {
        Some(agent) => Ok(serde_json::to_value(agent)?),
        None => Err(CliError::NotFound(args.id.clone())),
    }
}
