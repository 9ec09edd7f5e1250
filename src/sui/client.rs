use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::transport::Transport;
use crate::error::{BotError, TradeError};
use crate::models::decimal_string;
use crate::sui::signer::TransactionSigner;
use crate::sui::transaction::ProgrammableTransaction;
use crate::sui::wallet::WalletCredential;

const COINS_PAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRecord {
    pub coin_type: String,
    pub coin_object_id: String,
    #[serde(with = "decimal_string")]
    pub balance: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    #[serde(default)]
    pub data: Vec<CoinRecord>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    #[serde(with = "decimal_string")]
    total_balance: u128,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    data: Option<ObjectData>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ObjectData {
    #[serde(rename = "type")]
    object_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// The narrow slice of the Sui ledger the bot consumes.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Full type signature of an object, `None` when it does not exist.
    async fn get_object_type(&self, object_id: &str) -> Result<Option<String>>;

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128>;

    /// One page of `owner`'s coins of `coin_type`.
    async fn get_coins(&self, owner: &str, coin_type: &str, cursor: Option<&str>) -> Result<CoinPage>;

    /// One page of every coin `owner` holds.
    async fn get_all_coins(&self, owner: &str, cursor: Option<&str>) -> Result<CoinPage>;

    /// Sign and execute `plan` as `wallet`, returning the transaction digest.
    async fn execute(
        &self,
        plan: &ProgrammableTransaction,
        wallet: &WalletCredential,
    ) -> std::result::Result<String, TradeError>;
}

/// Sui JSON-RPC reader plus an external signer for execution.
#[derive(Clone)]
pub struct SuiRpcClient {
    transport: Transport,
    rpc_url: String,
    signer: Arc<dyn TransactionSigner>,
}

impl SuiRpcClient {
    pub fn new(transport: Transport, rpc_url: &str, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            transport,
            rpc_url: rpc_url.to_string(),
            signer,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .transport
            .post_json(&self.rpc_url, &body, &[])
            .await
            .with_context(|| format!("{} request failed", method))?;

        if let Some(err) = response.error {
            error!("{} returned RPC error {}: {}", method, err.code, err.message);
            return Err(BotError::LedgerError(format!("{} failed ({}): {}", method, err.code, err.message)).into());
        }

        response.result.ok_or_else(|| {
            anyhow::Error::from(BotError::LedgerError(format!("{} returned no result", method)))
        })
    }
}

#[async_trait]
impl LedgerClient for SuiRpcClient {
    async fn get_object_type(&self, object_id: &str) -> Result<Option<String>> {
        let response: ObjectResponse = self
            .call("sui_getObject", json!([object_id, { "showType": true }]))
            .await?;

        if let Some(err) = response.error {
            debug!("Object {} lookup returned error: {}", object_id, err);
            return Ok(None);
        }
        Ok(response.data.and_then(|d| d.object_type))
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128> {
        let response: BalanceResponse = self
            .call("suix_getBalance", json!([owner, coin_type]))
            .await?;
        Ok(response.total_balance)
    }

    async fn get_coins(&self, owner: &str, coin_type: &str, cursor: Option<&str>) -> Result<CoinPage> {
        self.call("suix_getCoins", json!([owner, coin_type, cursor, COINS_PAGE_LIMIT]))
            .await
    }

    async fn get_all_coins(&self, owner: &str, cursor: Option<&str>) -> Result<CoinPage> {
        self.call("suix_getAllCoins", json!([owner, cursor, COINS_PAGE_LIMIT]))
            .await
    }

    async fn execute(
        &self,
        plan: &ProgrammableTransaction,
        wallet: &WalletCredential,
    ) -> std::result::Result<String, TradeError> {
        let response = self
            .signer
            .sign_and_execute(&wallet.address, plan)
            .await
            .map_err(|e| TradeError::SubmissionRejected(e.to_string()))?;

        if !response.is_success() {
            return Err(TradeError::SubmissionRejected(format!(
                "{}: {}",
                response.digest,
                response.failure_reason()
            )));
        }
        Ok(response.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::retry::BackoffPolicy;
    use crate::sui::signer::ExecutionResponse;
    use mockito::Matcher;
    use std::time::Duration;

    struct StaticSigner(ExecutionResponse);

    #[async_trait]
    impl TransactionSigner for StaticSigner {
        async fn sign_and_execute(
            &self,
            _sender: &str,
            _plan: &ProgrammableTransaction,
        ) -> std::result::Result<ExecutionResponse, BotError> {
            Ok(self.0.clone())
        }
    }

    fn client(server: &mockito::ServerGuard, response: ExecutionResponse) -> SuiRpcClient {
        let transport = Transport::new(None)
            .unwrap()
            .with_policy(BackoffPolicy::fixed(Duration::from_millis(1), 1));
        SuiRpcClient::new(transport, &server.url(), Arc::new(StaticSigner(response)))
    }

    fn rpc_body(result: Value) -> String {
        json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
    }

    #[tokio::test]
    async fn test_get_object_type_and_missing_object() {
        let mut server = mockito::Server::new_async().await;
        let _found = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "params": ["0xcurve"] })))
            .with_body(rpc_body(json!({
                "data": { "objectId": "0xcurve", "type": "0xda79::meme::BondingCurve<0xabc::frog::FROG>" }
            })))
            .create_async()
            .await;
        let _missing = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "params": ["0xgone"] })))
            .with_body(rpc_body(json!({ "error": { "code": "notExists", "object_id": "0xgone" } })))
            .create_async()
            .await;

        let client = client(&server, ExecutionResponse::success("x"));
        assert_eq!(
            client.get_object_type("0xcurve").await.unwrap().as_deref(),
            Some("0xda79::meme::BondingCurve<0xabc::frog::FROG>")
        );
        assert_eq!(client.get_object_type("0xgone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_balance_and_coins_decode_string_amounts() {
        let mut server = mockito::Server::new_async().await;
        let _balance = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "suix_getBalance" })))
            .with_body(rpc_body(json!({
                "coinType": "0x2::sui::SUI",
                "coinObjectCount": 2,
                "totalBalance": "340282366920938463463374607431768211455"
            })))
            .create_async()
            .await;
        let _coins = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "suix_getCoins" })))
            .with_body(rpc_body(json!({
                "data": [{ "coinType": "0xabc::frog::FROG", "coinObjectId": "0x1", "version": "3", "digest": "d", "balance": "80" }],
                "nextCursor": "0x1",
                "hasNextPage": false
            })))
            .create_async()
            .await;

        let client = client(&server, ExecutionResponse::success("x"));
        assert_eq!(client.get_balance("0xme", "0x2::sui::SUI").await.unwrap(), u128::MAX);

        let page = client.get_coins("0xme", "0xabc::frog::FROG", None).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].balance, 80);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32602, "message": "Invalid params" } }).to_string())
            .create_async()
            .await;

        let client = client(&server, ExecutionResponse::success("x"));
        let err = client.get_balance("0xme", "bad").await.unwrap_err();
        assert!(err.to_string().contains("Invalid params"));
    }

    #[tokio::test]
    async fn test_failed_effects_map_to_rejection() {
        let server = mockito::Server::new_async().await;
        let wallet = WalletCredential { index: 0, address: "0xme".into() };

        let client = client(&server, ExecutionResponse::failure("dg", "InsufficientGas"));
        let err = client.execute(&ProgrammableTransaction::new(), &wallet).await.unwrap_err();
        assert!(matches!(err, TradeError::SubmissionRejected(ref m) if m.contains("InsufficientGas")));
    }
}
