mod chains;
mod get;
mod list;

use agentscan_core::{AgentAggregator, AggregatorBuilder};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let aggregator = AggregatorBuilder::from_env()?.build()?;
    dispatch(&cli.command, &aggregator).await
}

async fn dispatch(command: &Command, aggregator: &AgentAggregator) -> Result<Value, CliError> {
    match command {
        Command::List(args) => list::run(args, aggregator).await,
        Command::Get(args) => get::run(args, aggregator).await,
        Command::Chains => chains::run(aggregator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agentscan_core::{AgentId, AgentSummary, ChainId, InMemorySource, UtcDateTime};
    use clap::Parser;

    fn aggregator() -> AgentAggregator {
        let agents = (1..=3)
            .map(|token| {
                AgentSummary::new(
                    AgentId::new(ChainId::SEPOLIA, token.to_string()).expect("valid id"),
                    format!("Agent {token}"),
                    "0xowner",
                    UtcDateTime::from_unix_seconds(1_700_000_000 + token).expect("valid ts"),
                )
            })
            .collect();
        AggregatorBuilder::new()
            .with_api_key("test-key")
            .with_source(Arc::new(InMemorySource::new(ChainId::SEPOLIA, agents)))
            .build()
            .expect("aggregator")
    }

    async fn dispatch_argv(argv: &[&str]) -> Result<Value, CliError> {
        let cli = Cli::try_parse_from(argv).expect("valid args");
        dispatch(&cli.command, &aggregator()).await
    }

    #[tokio::test]
    async fn list_renders_a_page() {
        let value = dispatch_argv(&["agentscan", "list", "--limit", "2"]).await.expect("page");
        assert_eq!(value["total"], 3);
        assert_eq!(value["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["next_cursor"], "2");
    }

    #[tokio::test]
    async fn get_reports_missing_agents() {
        let found = dispatch_argv(&["agentscan", "get", "11155111:2"]).await.expect("agent");
        assert_eq!(found["name"], "Agent 2");

        let missing = dispatch_argv(&["agentscan", "get", "11155111:9"]).await;
        assert!(matches!(missing, Err(CliError::NotFound(_))));
    }

    #[tokio::test]
    async fn chains_lists_known_names() {
        let value = dispatch_argv(&["agentscan", "chains"]).await.expect("chains");
        assert_eq!(value[0]["chain_id"], 11_155_111);
        assert_eq!(value[0]["name"], "sepolia");
    }
}
