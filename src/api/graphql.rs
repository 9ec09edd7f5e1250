use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::retry::{retry_if, BackoffPolicy};
use crate::api::transport::Transport;
use crate::error::GraphQlError;
use crate::sui::events::MoveData;

const PAGE_SIZE: u32 = 50;

const COUNT_CALLS_QUERY: &str = r#"
query CountCalls($function: String!, $sender: SuiAddress!, $first: Int!, $after: String) {
  transactionBlocks(filter: { function: $function, sentAddress: $sender }, first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    nodes { digest }
  }
}"#;

const RECENT_CALLS_QUERY: &str = r#"
query RecentCalls($function: String!, $last: Int!) {
  transactionBlocks(filter: { function: $function }, last: $last) {
    nodes {
      digest
      sender { address }
      effects { events { nodes { contents { data } } } }
    }
  }
}"#;

/// Client for the chain indexer's GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    transport: Transport,
    url: String,
    policy: BackoffPolicy,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlocksData {
    transaction_blocks: TransactionBlockConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockConnection {
    page_info: Option<PageInfo>,
    #[serde(default)]
    nodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTransactionNode {
    digest: Option<String>,
    sender: Option<RawSender>,
    effects: Option<RawEffects>,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEffects {
    events: Option<RawEventConnection>,
}

#[derive(Debug, Deserialize)]
struct RawEventConnection {
    #[serde(default)]
    nodes: Vec<RawEventNode>,
}

#[derive(Debug, Deserialize)]
struct RawEventNode {
    contents: Option<RawEventContents>,
}

#[derive(Debug, Deserialize)]
struct RawEventContents {
    data: Option<MoveData>,
}

/// One decoded invocation of a Move function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub digest: String,
    pub sender: String,
    pub events: Vec<MoveData>,
}

impl TryFrom<RawTransactionNode> for FunctionCall {
    type Error = GraphQlError;

    fn try_from(node: RawTransactionNode) -> Result<Self, Self::Error> {
        let digest = node.digest.ok_or(GraphQlError::MissingField("digest"))?;
        let sender = node
            .sender
            .and_then(|s| s.address)
            .ok_or(GraphQlError::MissingField("sender.address"))?;
        let events = node
            .effects
            .and_then(|e| e.events)
            .map(|events| {
                events
                    .nodes
                    .into_iter()
                    .filter_map(|n| n.contents.and_then(|c| c.data))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { digest, sender, events })
    }
}

impl GraphQlClient {
    pub fn new(transport: Transport, url: &str) -> Self {
        Self {
            transport,
            url: url.to_string(),
            policy: BackoffPolicy::graphql(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute a query and return its `data` object.
    ///
    /// Connection resets and timeouts are retried under the GraphQL policy; HTTP
    /// statuses and GraphQL `errors` payloads fail immediately.
    pub async fn run(&self, query: &str, variables: Value) -> Result<Value, GraphQlError> {
        let body = json!({ "query": query, "variables": variables });

        let response: GraphQlResponse = retry_if(
            &self.policy,
            "GraphQL request",
            || async {
                self.transport
                    .post_json::<_, GraphQlResponse>(
                        &self.url,
                        &body,
                        &[("Content-Type", "application/json")],
                    )
                    .await
                    .map_err(GraphQlError::from)
            },
            |e: &GraphQlError| e.is_retryable(),
        )
        .await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response
                .errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(GraphQlError::Query(messages.join("; ")));
        }

        response.data.ok_or(GraphQlError::MissingField("data"))
    }

    pub async fn run_typed<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GraphQlError> {
        let data = self.run(query, variables).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Exact number of calls `sender` has made to `function`, draining every page.
    pub async fn count_function_calls(&self, function: &str, sender: &str) -> Result<u64, GraphQlError> {
        let mut count = 0u64;
        let mut cursor: Option<String> = None;

        loop {
            let page: TransactionBlocksData = self
                .run_typed(
                    COUNT_CALLS_QUERY,
                    json!({
                        "function": function,
                        "sender": sender,
                        "first": PAGE_SIZE,
                        "after": cursor,
                    }),
                )
                .await?;

            let connection = page.transaction_blocks;
            count += connection.nodes.len() as u64;

            match connection.page_info {
                Some(PageInfo { has_next_page: true, end_cursor: Some(next) }) => cursor = Some(next),
                Some(PageInfo { has_next_page: true, end_cursor: None }) => {
                    warn!("Indexer reported another page for {} without a cursor, stopping", function);
                    break;
                }
                _ => break,
            }
        }

        debug!("{} has called {} {} times", sender, function, count);
        Ok(count)
    }

    /// The `last` most recent invocations of `function`.
    ///
    /// Nodes missing a digest or sender are logged and skipped; they never fail the batch.
    pub async fn recent_function_calls(
        &self,
        function: &str,
        last: u32,
    ) -> Result<Vec<FunctionCall>, GraphQlError> {
        let data: TransactionBlocksData = self
            .run_typed(RECENT_CALLS_QUERY, json!({ "function": function, "last": last }))
            .await?;

        let calls = data
            .transaction_blocks
            .nodes
            .into_iter()
            .filter_map(|node| {
                let decoded = serde_json::from_value::<RawTransactionNode>(node)
                    .map_err(GraphQlError::from)
                    .and_then(FunctionCall::try_from);
                match decoded {
                    Ok(call) => Some(call),
                    Err(e) => {
                        warn!("Skipping malformed transaction node: {}", e);
                        None
                    }
                }
            })
            .collect();

        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn client(server: &mockito::ServerGuard) -> GraphQlClient {
        let transport = Transport::new(None)
            .unwrap()
            .with_policy(BackoffPolicy::fixed(Duration::from_millis(1), 1));
        GraphQlClient::new(transport, &format!("{}/graphql", server.url()))
            .with_policy(BackoffPolicy::fixed(Duration::from_millis(1), 2))
    }

    fn page(nodes: usize, has_next: bool, cursor: Option<&str>) -> String {
        let nodes: Vec<Value> = (0..nodes).map(|i| json!({ "digest": format!("d{}", i) })).collect();
        json!({
            "data": {
                "transactionBlocks": {
                    "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                    "nodes": nodes
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_count_function_calls_drains_all_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "variables": { "after": null } })))
            .with_body(page(50, true, Some("c1")))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "variables": { "after": "c1" } })))
            .with_body(page(50, true, Some("c2")))
            .create_async()
            .await;
        let third = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "variables": { "after": "c2" } })))
            .with_body(page(7, false, None))
            .create_async()
            .await;

        let count = client(&server)
            .count_function_calls("0xpkg::meme::place_dev_order", "0xcreator")
            .await
            .unwrap();

        assert_eq!(count, 107);
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_count_stops_when_cursor_missing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_body(page(3, true, None))
            .expect(1)
            .create_async()
            .await;

        let count = client(&server).count_function_calls("f", "s").await.unwrap();
        assert_eq!(count, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_errors_fail_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_body(r#"{"data": null, "errors": [{"message": "Query is too complex"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client(&server).run("{ x }", json!({})).await.unwrap_err();
        match err {
            GraphQlError::Query(msg) => assert!(msg.contains("too complex")),
            other => panic!("unexpected error: {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_recent_calls_skip_malformed_nodes() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "data": {
                "transactionBlocks": {
                    "nodes": [
                        {
                            "digest": "AAA",
                            "sender": { "address": "0xcreator" },
                            "effects": { "events": { "nodes": [
                                { "contents": { "data": { "Struct": [
                                    { "name": "amount", "value": { "Number": "42" } }
                                ] } } }
                            ] } }
                        },
                        { "digest": "BBB", "sender": null },
                        { "digest": "CCC", "sender": { "address": "0xother" }, "effects": null }
                    ]
                }
            }
        });
        let _mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({ "variables": { "last": 15 } })))
            .with_body(body.to_string())
            .create_async()
            .await;

        let calls = client(&server).recent_function_calls("0xpkg::meme::sell", 15).await.unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].sender, "0xcreator");
        assert_eq!(calls[0].events.len(), 1);
        assert_eq!(calls[1].digest, "CCC");
        assert!(calls[1].events.is_empty());
    }
}
