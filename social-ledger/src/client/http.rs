use super::{
    LedgerClient,
    model::{
        AccountProps, AccountVote, Content, ConversionRequest, DynamicGlobalProperties,
        FeedHistory, FollowEntry, HistoryItem, Witness, WithdrawRoute,
    },
};
use crate::{chain::Chain, config::LedgerConfig, error::LedgerError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Ledger API a call is routed to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Api {
    Database,
    Follow,
}

impl Api {
    /// Steem serves the legacy response shapes from `condenser_api`, Golos still exposes the
    /// original plugin apis.
    fn name(self, chain: Chain) -> &'static str {
        match (chain, self) {
            (Chain::Steem, _) => "condenser_api",
            (Chain::Golos, Api::Database) => "database_api",
            (Chain::Golos, Api::Follow) => "follow_api",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Transport failure talking to one node, eligible for failover to the next node.
struct NodeFailure(String);

/// JSON-RPC 2.0 over HTTP [`LedgerClient`].
///
/// Nodes are tried in configured order: a node that cannot be reached or answers with a
/// non-success status hands the call to the next node. A JSON-RPC error from a node that did
/// answer is final.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    chain: Chain,
    nodes: Vec<Url>,
    rates_ttl: Duration,
    http: Client,
}

impl HttpLedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.nodes.is_empty() {
            return Err(LedgerError::NodesEmpty);
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            chain: config.chain,
            nodes: config.nodes,
            rates_ttl: config.rates_ttl,
            http,
        })
    }

    /// Client for the [`Chain`] defaults (local node first, then public nodes).
    pub fn for_chain(chain: Chain) -> Result<Self, LedgerError> {
        Self::new(LedgerConfig::for_chain(chain))
    }

    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    async fn call<T>(&self, api: Api, method: &str, params: Value) -> Result<T, LedgerError>
    where
        T: DeserializeOwned,
    {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "call",
            "params": [api.name(self.chain), method, params],
        });

        let mut last_failure = String::from("no node attempted");

        for node in &self.nodes {
            match self.call_node(node, &body).await {
                Ok(response) => return self.parse_response(method, response),
                Err(NodeFailure(message)) => {
                    warn!(%node, method, %message, "ledger node failed, trying next node");
                    last_failure = message;
                }
            }
        }

        Err(LedgerError::Rpc {
            method: method.to_string(),
            message: last_failure,
        })
    }

    async fn call_node(&self, node: &Url, body: &Value) -> Result<RpcResponse, NodeFailure> {
        let response = self
            .http
            .post(node.clone())
            .json(body)
            .send()
            .await
            .map_err(|error| NodeFailure(format!("request failed: {error}")))?;

        if let Err(status_error) = response.error_for_status_ref() {
            return Err(NodeFailure(format!("HTTP error: {status_error}")));
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|error| NodeFailure(format!("JSON parse failed: {error}")))
    }

    fn parse_response<T>(&self, method: &str, response: RpcResponse) -> Result<T, LedgerError>
    where
        T: DeserializeOwned,
    {
        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                message: format!("{} (code {})", error.message, error.code),
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        debug!(method, "ledger call succeeded");

        serde_json::from_value(result)
            .map_err(|error| LedgerError::Malformed(format!("{method}: {error}")))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn rates_ttl(&self) -> Duration {
        self.rates_ttl
    }

    async fn get_account_history(
        &self,
        account: &str,
        from: u64,
        limit: u64,
    ) -> Result<Vec<HistoryItem>, LedgerError> {
        self.call(Api::Database, "get_account_history", json!([account, from, limit]))
            .await
    }

    async fn get_account_operation_count(&self, account: &str) -> Result<u64, LedgerError> {
        // from = -1 addresses the newest entry
        let newest: Vec<HistoryItem> = self
            .call(Api::Database, "get_account_history", json!([account, -1, 0]))
            .await?;

        Ok(newest.last().map_or(0, |item| item.index() + 1))
    }

    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, LedgerError> {
        self.call(Api::Database, "get_dynamic_global_properties", json!([]))
            .await
    }

    async fn get_feed_history(&self) -> Result<FeedHistory, LedgerError> {
        self.call(Api::Database, "get_feed_history", json!([])).await
    }

    async fn get_account(&self, account: &str) -> Result<AccountProps, LedgerError> {
        let accounts: Vec<AccountProps> = self
            .call(Api::Database, "get_accounts", json!([[account]]))
            .await?;

        accounts
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn get_followers(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError> {
        self.call(Api::Follow, "get_followers", json!([account, start, "blog", limit]))
            .await
    }

    async fn get_following(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError> {
        self.call(Api::Follow, "get_following", json!([account, start, "blog", limit]))
            .await
    }

    async fn get_blog_identifiers(&self, account: &str) -> Result<Vec<String>, LedgerError> {
        let state: Value = self
            .call(Api::Database, "get_state", json!([format!("/@{account}/blog")]))
            .await?;

        let blog = state
            .get("accounts")
            .and_then(|accounts| accounts.get(account))
            .and_then(|account| account.get("blog"))
            .cloned()
            .unwrap_or(Value::Array(vec![]));

        let identifiers: Vec<String> = serde_json::from_value(blog)?;
        Ok(identifiers
            .into_iter()
            .filter(|identifier| !identifier.is_empty())
            .collect())
    }

    async fn get_content(&self, author: &str, permlink: &str) -> Result<Content, LedgerError> {
        self.call(Api::Database, "get_content", json!([author, permlink]))
            .await
    }

    async fn get_account_votes(&self, account: &str) -> Result<Vec<AccountVote>, LedgerError> {
        self.call(Api::Database, "get_account_votes", json!([account]))
            .await
    }

    async fn get_withdraw_routes(&self, account: &str) -> Result<Vec<WithdrawRoute>, LedgerError> {
        self.call(Api::Database, "get_withdraw_routes", json!([account, "all"]))
            .await
    }

    async fn get_conversion_requests(
        &self,
        account: &str,
    ) -> Result<Vec<ConversionRequest>, LedgerError> {
        self.call(Api::Database, "get_conversion_requests", json!([account]))
            .await
    }

    async fn get_witness_by_account(&self, witness: &str) -> Result<Witness, LedgerError> {
        let witness_object: Option<Witness> = self
            .call(Api::Database, "get_witness_by_account", json!([witness]))
            .await?;

        witness_object.ok_or_else(|| LedgerError::AccountNotFound(witness.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RATES_TTL;

    #[test]
    fn test_api_routing() {
        assert_eq!(Api::Follow.name(Chain::Steem), "condenser_api");
        assert_eq!(Api::Database.name(Chain::Golos), "database_api");
        assert_eq!(Api::Follow.name(Chain::Golos), "follow_api");
    }

    #[test]
    fn test_new_rejects_empty_nodes() {
        let config = LedgerConfig {
            nodes: vec![],
            ..LedgerConfig::default()
        };
        assert_eq!(HttpLedgerClient::new(config).unwrap_err(), LedgerError::NodesEmpty);
    }

    #[test]
    fn test_rates_ttl_from_config() {
        let config = LedgerConfig::for_chain(Chain::Golos).with_rates_ttl(Duration::from_secs(30));
        let client = HttpLedgerClient::new(config).unwrap();
        assert_eq!(client.rates_ttl(), Duration::from_secs(30));

        let client = HttpLedgerClient::for_chain(Chain::Steem).unwrap();
        assert_eq!(client.rates_ttl(), DEFAULT_RATES_TTL);
    }

    #[test]
    fn test_parse_response() {
        let client = HttpLedgerClient::for_chain(Chain::Steem).unwrap();

        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 1, "result": [[41, {"op": ["vote", {}],
                "timestamp": "2016-09-19T12:27:24"}]]}"#,
        )
        .unwrap();
        let window: Vec<HistoryItem> = client
            .parse_response("get_account_history", response)
            .unwrap();
        assert_eq!(window[0].index(), 41);

        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 1,
                "error": {"code": -32003, "message": "unknown account"}}"#,
        )
        .unwrap();
        let error = client
            .parse_response::<Vec<HistoryItem>>("get_account_history", response)
            .unwrap_err();
        assert!(matches!(error, LedgerError::Rpc { .. }));

        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "result": {"unexpected": true}}"#)
                .unwrap();
        let error = client
            .parse_response::<Vec<HistoryItem>>("get_account_history", response)
            .unwrap_err();
        assert!(matches!(error, LedgerError::Malformed(_)));
    }
}
