//! Contract tests for the subgraph adapter.
//!
//! A scripted transport stands in for the gateway, so these tests pin down the
//! exact requests the adapter sends and how gateway answers are classified.

use agentscan_core::{
    AgentAggregator, AgentFilters, AgentSource, AggregatorConfig, ChainConfig, ChainId,
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, PageQuery, Pagination,
    SourceErrorKind, SubgraphAdapter,
};
use agentscan_core::http_client::HttpFuture;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

/// Records every request and answers through a caller-supplied responder.
struct ScriptedHttpClient {
    requests: Mutex<Vec<HttpRequest>>,
    responder: Box<Responder>,
}

impl ScriptedHttpClient {
    fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let response = (self.responder)(&request);
            self.requests.lock().expect("lock").push(request);
            response
        })
    }
}

fn agent_payload(token: u32) -> Value {
    json!({
        "id": format!("84532:{token}"),
        "agentId": token.to_string(),
        "owner": "0xAbCd",
        "operators": [],
        "createdAt": (1_700_000_000 + token).to_string(),
        "registrationFile": {
            "name": format!("Agent {token}"),
            "mcpEndpoint": "https://agent.example/mcp",
            "x402support": false,
            "skills": [],
            "domains": []
        }
    })
}

fn agents_body(tokens: std::ops::RangeInclusive<u32>) -> String {
    json!({ "data": { "agents": tokens.map(agent_payload).collect::<Vec<_>>() } }).to_string()
}

fn graphql_error(message: &str) -> HttpResponse {
    HttpResponse::ok_json(json!({ "errors": [{ "message": message }] }).to_string())
}

fn variables(request: &HttpRequest) -> Value {
    let body = request.body.as_deref().expect("body");
    let body: Value = serde_json::from_str(body).expect("json body");
    body["variables"].clone()
}

fn adapter(client: Arc<ScriptedHttpClient>) -> SubgraphAdapter {
    SubgraphAdapter::new(
        &ChainConfig::new(ChainId::BASE_SEPOLIA, "QmBaseSepolia"),
        "https://gateway.example/api/",
        client,
    )
}

// =============================================================================
// Request shape
// =============================================================================

#[tokio::test]
async fn when_page_is_fetched_adapter_posts_graphql_with_bearer_key() {
    // Given: A gateway returning a full page of two agents
    let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::ok_json(agents_body(1..=2))));
    let adapter = adapter(Arc::clone(&client));
    let query = PageQuery::new(AgentFilters::default().with_mcp(true), 2).expect("valid query");

    // When: The first page is fetched
    let page = adapter.fetch_page(&query, "secret-key").await.expect("page");

    // Then: The request targets the subgraph with the key only in the auth header
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://gateway.example/api/subgraphs/id/QmBaseSepolia");
    assert!(!request.url.contains("secret-key"));
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("Bearer secret-key")
    );
    assert_eq!(
        variables(request),
        json!({
            "first": 2,
            "skip": 0,
            "where": { "registrationFile_": { "mcpEndpoint_not": null } }
        })
    );

    // And: A full page yields a skip cursor for the next one
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id.to_string(), "84532:1");
    assert!(page.items[0].capabilities.mcp);
    assert_eq!(page.next_cursor.as_deref(), Some("2"));
}

#[tokio::test]
async fn when_cursor_is_followed_adapter_skips_fetched_items() {
    // Given: A gateway returning a short final page
    let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::ok_json(agents_body(3..=3))));
    let adapter = adapter(Arc::clone(&client));
    let query = PageQuery::new(AgentFilters::default(), 2)
        .expect("valid query")
        .after(Some("2".into()));

    // When: The page after the cursor is fetched
    let page = adapter.fetch_page(&query, "k").await.expect("page");

    // Then: The cursor becomes the skip and the short page ends pagination
    assert_eq!(variables(&client.requests()[0])["skip"], 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn when_single_agent_is_fetched_adapter_queries_by_full_identity() {
    // Given: A gateway that knows agent 12
    let client = ScriptedHttpClient::new(|_| {
        Ok(HttpResponse::ok_json(json!({ "data": { "agent": agent_payload(12) } }).to_string()))
    });
    let adapter = adapter(Arc::clone(&client));

    // When: The agent is fetched by token id
    let agent = adapter.fetch_agent("12", "k").await.expect("lookup");

    // Then: The subgraph is asked for the chain-qualified id
    assert_eq!(variables(&client.requests()[0]), json!({ "id": "84532:12" }));
    let agent = agent.expect("agent exists");
    assert_eq!(agent.name, "Agent 12");
    assert_eq!(agent.owner, "0xabcd");
}

// =============================================================================
// Error classification
// =============================================================================

#[tokio::test]
async fn when_gateway_answers_with_errors_adapter_classifies_them() {
    let cases: Vec<(HttpResponse, SourceErrorKind)> = vec![
        (HttpResponse::with_status(429, "slow down"), SourceErrorKind::RateLimited),
        (HttpResponse::with_status(503, "maintenance"), SourceErrorKind::Unavailable),
        (HttpResponse::with_status(401, "bad key"), SourceErrorKind::Unauthorized),
        (graphql_error("subgraph not found: QmX"), SourceErrorKind::NotDeployed),
        (graphql_error("bad indexers: all failed"), SourceErrorKind::Unavailable),
        (HttpResponse::ok_json("<html>"), SourceErrorKind::Internal),
    ];

    for (response, expected) in cases {
        // Given: A gateway giving one kind of failure
        let client = ScriptedHttpClient::new(move |_| Ok(response.clone()));
        let adapter = adapter(client);
        let query = PageQuery::new(AgentFilters::default(), 10).expect("valid query");

        // When: A page is fetched
        let error = adapter.fetch_page(&query, "k").await.expect_err("failure");

        // Then: The failure maps to the expected kind
        assert_eq!(error.kind(), expected, "{error}");
    }
}

#[tokio::test]
async fn when_transport_times_out_adapter_reports_a_retryable_outage() {
    // Given: A transport that times out
    let client = ScriptedHttpClient::new(|_| Err(HttpError::new("request timeout")));
    let adapter = adapter(client);
    let query = PageQuery::new(AgentFilters::default(), 10).expect("valid query");

    // When: A page is fetched
    let error = adapter.fetch_page(&query, "k").await.expect_err("timeout");

    // Then: The outage can be retried with another key
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.retryable());
}

// =============================================================================
// Aggregation over subgraphs
// =============================================================================

fn subgraph_aggregator(
    client: Arc<ScriptedHttpClient>,
    keys: (&str, Option<&str>),
) -> AgentAggregator {
    let config = AggregatorConfig {
        gateway_url: "https://gateway.example/api".into(),
        chains: vec![
            ChainConfig::new(ChainId::BASE_SEPOLIA, "QmBaseSepolia"),
            ChainConfig::new(ChainId::SEPOLIA, "QmSepolia"),
        ],
        api_key: Some(keys.0.to_owned()),
        user_api_key: keys.1.map(str::to_owned),
        requests_per_second: 0,
        ..AggregatorConfig::default()
    };
    AgentAggregator::builder()
        .with_config(config)
        .with_http_client(client)
        .build()
        .expect("aggregator builds")
}

#[tokio::test]
async fn when_a_chain_is_not_deployed_aggregator_lists_the_others_quietly() {
    // Given: Base Sepolia serves agents while the Sepolia subgraph is missing
    let client = ScriptedHttpClient::new(|request| {
        if request.url.ends_with("QmSepolia") {
            Ok(graphql_error("subgraph not found: QmSepolia"))
        } else {
            Ok(HttpResponse::ok_json(agents_body(1..=3)))
        }
    });
    let aggregator = subgraph_aggregator(Arc::clone(&client), ("shared", None));

    // When: Agents are listed across both chains
    let page = aggregator
        .get_agents(&AgentFilters::default(), &Pagination::first(10))
        .await
        .expect("listing");

    // Then: The deployed chain's agents come back and the listing does not fail
    assert_eq!(page.total, 3);
    assert!(page.items.iter().all(|item| item.chain_id() == ChainId::BASE_SEPOLIA));
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn when_shared_key_is_throttled_aggregator_falls_back_to_user_key() {
    // Given: The gateway throttles the shared key only
    let client = ScriptedHttpClient::new(|request| {
        if request.headers.get("authorization").map(String::as_str) == Some("Bearer shared") {
            Ok(HttpResponse::with_status(429, "quota exceeded"))
        } else {
            Ok(HttpResponse::ok_json(json!({ "data": { "agent": agent_payload(7) } }).to_string()))
        }
    });
    let aggregator = subgraph_aggregator(Arc::clone(&client), ("shared", Some("mine")));

    // When: One agent is looked up
    let agent = aggregator.get_agent("84532:7").await.expect("lookup");

    // Then: The second attempt used the caller's key and succeeded
    assert_eq!(agent.map(|agent| agent.name), Some(String::from("Agent 7")));
    let tokens = client
        .requests()
        .iter()
        .filter_map(|request| request.headers.get("authorization").cloned())
        .collect::<Vec<_>>();
    assert_eq!(tokens, vec!["Bearer shared", "Bearer mine"]);
}

#[tokio::test]
async fn when_chains_name_one_upstream_aggregator_trips_a_single_breaker() {
    // Given: Two chains configured against one shared upstream that is down
    let client = ScriptedHttpClient::new(|_| Ok(HttpResponse::with_status(503, "maintenance")));
    let chains = "84532=QmBaseSepolia@testnets, 11155111=QmSepolia@testnets";
    let config = AggregatorConfig {
        gateway_url: "https://gateway.example/api".into(),
        chains: agentscan_core::config::parse_chains(chains).expect("valid chains"),
        api_key: Some("shared".into()),
        requests_per_second: 0,
        ..AggregatorConfig::default()
    };
    let aggregator = AgentAggregator::builder()
        .with_config(config)
        .with_http_client(Arc::clone(&client) as Arc<dyn HttpClient>)
        .build()
        .expect("aggregator builds");

    // When: Listings keep failing on both chains
    for _ in 0..3 {
        aggregator
            .get_agents(&AgentFilters::default(), &Pagination::first(10))
            .await
            .expect("failures are absorbed");
    }
    let calls = client.requests().len();
    aggregator
        .get_agents(&AgentFilters::default(), &Pagination::first(10))
        .await
        .expect("open circuit is absorbed");

    // Then: Both chains report the same open breaker and the upstream is left alone
    let base = aggregator.circuit_snapshot(ChainId::BASE_SEPOLIA).expect("breaker");
    let sepolia = aggregator.circuit_snapshot(ChainId::SEPOLIA).expect("breaker");
    assert_eq!(base.state, agentscan_core::CircuitState::Open);
    assert_eq!(base, sepolia);
    assert_eq!(client.requests().len(), calls);
}
