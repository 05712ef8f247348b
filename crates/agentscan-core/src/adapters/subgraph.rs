//! GraphQL adapter for agent-registry subgraphs behind a hosted gateway.
//!
//! Each chain deployment is one subgraph, queried with a GraphQL POST to
//! `<gateway>/subgraphs/id/<subgraph id>`. The API key travels as a bearer
//! token and never appears in URLs or logs.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::data_source::{AgentPage, AgentSource, PageQuery, SourceError, SourceFuture};
use crate::http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::registry::ChainConfig;
use crate::throttling::RequestPacer;
use crate::{AgentCapabilities, AgentFilters, AgentId, AgentSummary, ChainId, UtcDateTime};

pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.thegraph.com/api";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const AGENT_FIELDS: &str = "id agentId owner operators createdAt updatedAt \
registrationFile { name description image active mcpEndpoint a2aEndpoint x402support \
skills domains }";

/// Subgraph-backed [`AgentSource`] for one chain.
#[derive(Clone)]
pub struct SubgraphAdapter {
    chain_id: ChainId,
    gateway_url: String,
    subgraph_id: String,
    http_client: Arc<dyn HttpClient>,
    pacer: Option<RequestPacer>,
    timeout_ms: u64,
}

impl std::fmt::Debug for SubgraphAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubgraphAdapter")
            .field("chain_id", &self.chain_id)
            .field("gateway_url", &self.gateway_url)
            .field("subgraph_id", &self.subgraph_id)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl SubgraphAdapter {
    pub fn new(
        config: &ChainConfig,
        gateway_url: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            chain_id: config.chain_id,
            gateway_url: gateway_url.into().trim_end_matches('/').to_owned(),
            subgraph_id: config.subgraph_id.clone(),
            http_client,
            pacer: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_pacer(mut self, pacer: RequestPacer) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/subgraphs/id/{}",
            self.gateway_url,
            urlencoding::encode(&self.subgraph_id)
        )
    }

    async fn post_query<T>(
        &self,
        query: &str,
        variables: Value,
        api_key: &str,
    ) -> Result<T, SourceError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        let body = json!({ "query": query, "variables": variables }).to_string();
        let request = HttpRequest::post_json(self.endpoint(), body)
            .with_header("accept", "application/json")
            .with_auth(&HttpAuth::BearerToken(api_key.to_owned()))
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(transport_error)?;
        debug!(
            chain_id = %self.chain_id,
            status = response.status,
            bytes = response.body.len(),
            "subgraph response"
        );
        decode_response(&response)
    }
}

impl AgentSource for SubgraphAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn fetch_page<'a>(
        &'a self,
        query: &'a PageQuery,
        api_key: &'a str,
    ) -> SourceFuture<'a, AgentPage> {
        Box::pin(async move {
            let skip = query
                .cursor
                .as_deref()
                .and_then(|cursor| cursor.parse::<usize>().ok())
                .unwrap_or(0);
            let variables = json!({
                "first": query.first,
                "skip": skip,
                "where": where_clause(&query.filters),
            });
            let data: AgentsData = self.post_query(&list_query(), variables, api_key).await?;

            let fetched = data.agents.len();
            let items = data
                .agents
                .into_iter()
                .map(|payload| payload.into_summary(self.chain_id))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(AgentPage {
                items,
                next_cursor: (fetched >= query.first).then(|| (skip + fetched).to_string()),
                total: None,
            })
        })
    }

    fn fetch_agent<'a>(
        &'a self,
        token_id: &'a str,
        api_key: &'a str,
    ) -> SourceFuture<'a, Option<AgentSummary>> {
        Box::pin(async move {
            let variables = json!({ "id": format!("{}:{}", self.chain_id, token_id) });
            let data: AgentData = self.post_query(&single_query(), variables, api_key).await?;
            data.agent
                .map(|payload| payload.into_summary(self.chain_id))
                .transpose()
        })
    }
}

fn list_query() -> String {
    format!(
        "query Agents($first: Int!, $skip: Int!, $where: Agent_filter) {{ \
agents(first: $first, skip: $skip, where: $where, \
orderBy: createdAt, orderDirection: desc) {{ {AGENT_FIELDS} }} }}"
    )
}

fn single_query() -> String {
    format!("query Agent($id: ID!) {{ agent(id: $id) {{ {AGENT_FIELDS} }} }}")
}

/// Translates listing filters into an `Agent_filter` object.
///
/// Capability, status, name and taxonomy predicates live on the nested
/// registration file and are grouped under `registrationFile_`.
pub fn where_clause(filters: &AgentFilters) -> Value {
    let filters = filters.normalized();
    let mut root = Map::new();
    let mut registration = Map::new();

    if let Some(owner) = filters.owner {
        root.insert("owner".into(), Value::String(owner));
    }

    for (field, wanted) in [("mcpEndpoint", filters.mcp), ("a2aEndpoint", filters.a2a)] {
        match wanted {
            Some(true) => {
                registration.insert(format!("{field}_not"), Value::Null);
            }
            Some(false) => {
                registration.insert(field.to_owned(), Value::Null);
            }
            None => {}
        }
    }
    if let Some(x402) = filters.x402 {
        registration.insert("x402support".into(), Value::Bool(x402));
    }
    if let Some(active) = filters.active {
        registration.insert("active".into(), Value::Bool(active));
    }
    if let Some(name) = filters.name_contains {
        registration.insert("name_contains_nocase".into(), Value::String(name));
    }
    if !filters.skills.is_empty() {
        registration.insert("skills_contains".into(), json!(filters.skills));
    }
    if !filters.domains.is_empty() {
        registration.insert("domains_contains".into(), json!(filters.domains));
    }

    if !registration.is_empty() {
        root.insert("registrationFile_".into(), Value::Object(registration));
    }
    Value::Object(root)
}

fn transport_error(error: HttpError) -> SourceError {
    if error.retryable() {
        SourceError::unavailable(format!("subgraph transport error: {}", error.message()))
    } else {
        SourceError::internal(format!("subgraph transport error: {}", error.message()))
    }
}

/// Maps a non-success HTTP status to a source error.
pub fn classify_status(status: u16, body: &str) -> SourceError {
    let snippet = body.chars().take(200).collect::<String>();
    match status {
        429 => SourceError::rate_limited(format!(
            "subgraph gateway throttled request (429): {snippet}"
        )),
        408 | 500..=599 => {
            SourceError::unavailable(format!("subgraph gateway returned {status}: {snippet}"))
        }
        401 | 403 => SourceError::unauthorized(format!(
            "subgraph gateway rejected credentials ({status})"
        )),
        _ => SourceError::invalid_request(format!("subgraph gateway returned {status}: {snippet}")),
    }
}

/// Maps a GraphQL `errors[].message` to a source error.
///
/// Missing deployments and schema mismatches are expected while a chain's
/// subgraph is still being rolled out.
pub fn classify_graphql_error(message: &str) -> SourceError {
    let lowered = message.to_ascii_lowercase();

    if lowered.contains("not authorized")
        || lowered.contains("unauthorized")
        || lowered.contains("auth error")
    {
        SourceError::unauthorized(message)
    } else if lowered.contains("not found")
        || lowered.contains("has no field")
        || lowered.contains("unknown argument")
        || lowered.contains("unknown type")
        || lowered.contains("no value provided for required argument")
    {
        SourceError::not_deployed(message)
    } else if lowered.contains("too many requests") || lowered.contains("rate limit") {
        SourceError::rate_limited(message)
    } else if lowered.contains("bad indexers")
        || lowered.contains("indexer")
        || lowered.contains("timeout")
    {
        SourceError::unavailable(message)
    } else {
        SourceError::internal(message)
    }
}

fn decode_response<T>(response: &HttpResponse) -> Result<T, SourceError>
where
    T: for<'de> Deserialize<'de>,
{
    if !response.is_success() {
        return Err(classify_status(response.status, &response.body));
    }

    let envelope: GraphqlEnvelope<T> = serde_json::from_str(&response.body).map_err(|error| {
        SourceError::internal(format!("failed to parse subgraph response: {error}"))
    })?;

    if let Some(first) = envelope.errors.first() {
        return Err(classify_graphql_error(&first.message));
    }
    envelope
        .data
        .ok_or_else(|| SourceError::internal("subgraph response carried neither data nor errors"))
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AgentsData {
    #[serde(default)]
    agents: Vec<AgentPayload>,
}

#[derive(Debug, Deserialize)]
struct AgentData {
    agent: Option<AgentPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentPayload {
    agent_id: String,
    owner: String,
    #[serde(default)]
    operators: Vec<String>,
    created_at: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    registration_file: Option<RegistrationPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationPayload {
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
    active: Option<bool>,
    mcp_endpoint: Option<String>,
    a2a_endpoint: Option<String>,
    #[serde(rename = "x402support")]
    x402_support: Option<bool>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    domains: Vec<String>,
}

impl AgentPayload {
    fn into_summary(self, chain_id: ChainId) -> Result<AgentSummary, SourceError> {
        let id = AgentId::new(chain_id, self.agent_id.as_str())
            .map_err(|error| SourceError::internal(error.to_string()))?;
        let created_at = parse_unix_seconds(&self.created_at)?;
        let updated_at = self
            .updated_at
            .as_deref()
            .map(parse_unix_seconds)
            .transpose()?;
        let registration = self.registration_file.unwrap_or_default();

        let name = registration
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Agent #{}", id.token_id()));
        let capabilities = AgentCapabilities {
            mcp: registration.mcp_endpoint.is_some_and(|endpoint| !endpoint.is_empty()),
            a2a: registration.a2a_endpoint.is_some_and(|endpoint| !endpoint.is_empty()),
            x402: registration.x402_support.unwrap_or(false),
        };

        let mut summary = AgentSummary::new(id, name, self.owner.to_ascii_lowercase(), created_at)
            .with_capabilities(capabilities);
        summary.description = registration.description;
        summary.image = registration.image;
        summary.active = registration.active.unwrap_or(true);
        summary.operators = self.operators;
        summary.skills = registration.skills;
        summary.domains = registration.domains;
        summary.updated_at = updated_at;
        Ok(summary)
    }
}

/// Subgraph `BigInt` timestamps arrive as decimal strings of unix seconds.
fn parse_unix_seconds(raw: &str) -> Result<UtcDateTime, SourceError> {
    let seconds = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| SourceError::internal(format!("invalid subgraph timestamp '{raw}'")))?;
    UtcDateTime::from_unix_seconds(seconds)
        .map_err(|error| SourceError::internal(error.to_string()))
}
