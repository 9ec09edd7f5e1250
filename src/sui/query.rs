//! Read-only chain queries shared by the watch-list, executor and monitors.

use anyhow::Result;
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::graphql::{FunctionCall, GraphQlClient};
use crate::error::GraphQlError;
use crate::sui::client::{CoinRecord, LedgerClient};
use crate::sui::wallet::WalletSet;
use crate::trading::hopfun::{extract_type_argument, mist_to_sui, supply_percentage, SUI_COIN_TYPE, TOTAL_SUPPLY};

enum Paging {
    Start,
    Next(String),
    Done,
}

#[derive(Clone)]
pub struct ChainQuery {
    ledger: Arc<dyn LedgerClient>,
    graphql: GraphQlClient,
    wallets: WalletSet,
}

impl ChainQuery {
    pub fn new(ledger: Arc<dyn LedgerClient>, graphql: GraphQlClient, wallets: WalletSet) -> Self {
        Self { ledger, graphql, wallets }
    }

    pub fn ledger(&self) -> Arc<dyn LedgerClient> {
        self.ledger.clone()
    }

    pub fn wallets(&self) -> &WalletSet {
        &self.wallets
    }

    pub async fn get_balance(&self, owner: &str, asset_type: &str) -> Result<u128> {
        self.ledger.get_balance(owner, asset_type).await
    }

    /// Sum over every configured wallet. A wallet whose query fails counts as zero.
    pub async fn aggregate_balance(&self, asset_type: &str) -> u128 {
        let balances = futures::future::join_all(
            self.wallets
                .iter()
                .map(|wallet| async move { (wallet, self.ledger.get_balance(&wallet.address, asset_type).await) }),
        )
        .await;

        balances.into_iter().fold(0u128, |total, (wallet, balance)| match balance {
            Ok(b) => total.saturating_add(b),
            Err(e) => {
                warn!("Balance query for wallet {} failed, counting as 0: {:#}", wallet.number(), e);
                total
            }
        })
    }

    pub async fn owned_supply_percentage(&self, asset_type: &str) -> f64 {
        supply_percentage(self.aggregate_balance(asset_type).await, TOTAL_SUPPLY)
    }

    pub async fn native_balance_sui(&self, owner: &str) -> Result<f64> {
        Ok(mist_to_sui(self.ledger.get_balance(owner, SUI_COIN_TYPE).await?))
    }

    /// `None` on any failure; callers treat that as "type unknown".
    pub async fn get_object_type(&self, object_id: &str) -> Option<String> {
        match self.ledger.get_object_type(object_id).await {
            Ok(Some(object_type)) => Some(object_type),
            Ok(None) => {
                debug!("Object {} not found", object_id);
                None
            }
            Err(e) => {
                warn!("Failed to look up object {}: {:#}", object_id, e);
                None
            }
        }
    }

    /// Asset type traded on a bonding curve, read from the curve's generic argument.
    pub async fn asset_type_of_curve(&self, curve_id: &str) -> Option<String> {
        let object_type = self.get_object_type(curve_id).await?;
        let asset_type = extract_type_argument(&object_type);
        if asset_type.is_none() {
            warn!("Curve {} has no type argument in {}", curve_id, object_type);
        }
        asset_type
    }

    /// Every coin `owner` holds, one page per item. Restart by calling again.
    ///
    /// Ends when the indexer reports no further page, or reports one without a cursor
    /// (or with the cursor it was just given).
    pub fn all_coins_paged<'a>(&'a self, owner: &'a str) -> impl Stream<Item = Result<Vec<CoinRecord>>> + 'a {
        stream::unfold(Paging::Start, move |state| async move {
            let cursor = match state {
                Paging::Start => None,
                Paging::Next(cursor) => Some(cursor),
                Paging::Done => return None,
            };

            match self.ledger.get_all_coins(owner, cursor.as_deref()).await {
                Ok(page) => {
                    let next = match (page.has_next_page, page.next_cursor) {
                        (true, Some(next)) if Some(&next) != cursor.as_ref() => Paging::Next(next),
                        (true, _) => {
                            warn!("Coin listing for {} claims more pages without a usable cursor", owner);
                            Paging::Done
                        }
                        (false, _) => Paging::Done,
                    };
                    Some((Ok(page.data), next))
                }
                Err(e) => Some((Err(e), Paging::Done)),
            }
        })
    }

    pub async fn all_coins(&self, owner: &str) -> Result<Vec<CoinRecord>> {
        let pages: Vec<Vec<CoinRecord>> = self.all_coins_paged(owner).try_collect().await?;
        Ok(pages.into_iter().flatten().collect())
    }

    /// All of `owner`'s coins of one asset type, across every page.
    pub async fn coins_of_type(&self, owner: &str, asset_type: &str) -> Result<Vec<CoinRecord>> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.ledger.get_coins(owner, asset_type, cursor.as_deref()).await?;
            coins.extend(page.data);

            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(coins)
    }

    pub async fn run_graphql(&self, query: &str, variables: Value) -> Result<Value, GraphQlError> {
        self.graphql.run(query, variables).await
    }

    pub async fn count_function_calls(&self, function: &str, sender: &str) -> Result<u64, GraphQlError> {
        self.graphql.count_function_calls(function, sender).await
    }

    pub async fn recent_function_calls(&self, function: &str, last: u32) -> Result<Vec<FunctionCall>, GraphQlError> {
        self.graphql.recent_function_calls(function, last).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sui::mock::{coin, MockLedger};
    use crate::sui::client::CoinPage;
    use futures::StreamExt;

    fn query(ledger: Arc<MockLedger>, wallets: &[&str]) -> ChainQuery {
        let addresses: Vec<String> = wallets.iter().map(|w| w.to_string()).collect();
        ChainQuery::new(ledger, MockLedger::graphql_stub(), WalletSet::new(&addresses).unwrap())
    }

    #[tokio::test]
    async fn test_all_coins_drains_three_pages() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_all_coin_pages(
            "0xme",
            vec![
                CoinPage { data: vec![coin("0x1", "A", 1), coin("0x2", "B", 2)], next_cursor: Some("p1".into()), has_next_page: true },
                CoinPage { data: vec![coin("0x3", "C", 3)], next_cursor: Some("p2".into()), has_next_page: true },
                CoinPage { data: vec![coin("0x4", "A", 4)], next_cursor: None, has_next_page: false },
            ],
        );

        let q = query(ledger.clone(), &["0xme"]);
        let coins = q.all_coins("0xme").await.unwrap();
        assert_eq!(coins.len(), 4);
        assert_eq!(ledger.all_coins_calls(), 3);

        // Restartable
        assert_eq!(q.all_coins_paged("0xme").count().await, 3);
    }

    #[tokio::test]
    async fn test_all_coins_stops_without_cursor() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_all_coin_pages(
            "0xme",
            vec![CoinPage { data: vec![coin("0x1", "A", 1)], next_cursor: None, has_next_page: true }],
        );

        let coins = query(ledger.clone(), &["0xme"]).all_coins("0xme").await.unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(ledger.all_coins_calls(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_balance_soft_fails() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("0xa", "T", 300_000_000_000_000);
        ledger.set_balance("0xc", "T", 50_000_000_000_000);
        ledger.fail_balance_for("0xb");

        let q = query(ledger, &["0xa", "0xb", "0xc"]);
        assert_eq!(q.aggregate_balance("T").await, 350_000_000_000_000);
        assert_eq!(q.owned_supply_percentage("T").await, 35.0);
    }

    #[tokio::test]
    async fn test_asset_type_of_curve() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_object_type("0xcurve", "0xda79::meme::BondingCurve<0xabc::frog::FROG>");

        let q = query(ledger, &["0xme"]);
        assert_eq!(q.asset_type_of_curve("0xcurve").await.as_deref(), Some("0xabc::frog::FROG"));
        assert_eq!(q.asset_type_of_curve("0xmissing").await, None);
    }
}
