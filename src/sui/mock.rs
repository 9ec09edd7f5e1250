//! In-memory ledger used by the trading tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::graphql::GraphQlClient;
use crate::api::transport::Transport;
use crate::error::TradeError;
use crate::sui::client::{CoinPage, CoinRecord, LedgerClient};
use crate::sui::transaction::ProgrammableTransaction;
use crate::sui::wallet::WalletCredential;

pub fn coin(id: &str, coin_type: &str, balance: u128) -> CoinRecord {
    CoinRecord {
        coin_type: coin_type.to_string(),
        coin_object_id: id.to_string(),
        balance,
    }
}

#[derive(Default)]
pub struct MockLedger {
    object_types: Mutex<HashMap<String, String>>,
    balances: Mutex<HashMap<(String, String), u128>>,
    coins: Mutex<HashMap<(String, String), Vec<CoinRecord>>>,
    all_coin_pages: Mutex<HashMap<String, Vec<CoinPage>>>,
    failing_balances: Mutex<HashSet<String>>,
    rejecting_wallets: Mutex<HashSet<String>>,
    rejecting_merges: Mutex<HashSet<String>>,
    executed: Mutex<Vec<(String, ProgrammableTransaction)>>,
    execute_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    balance_calls: AtomicUsize,
    all_coins_calls: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// GraphQL client pointed at a closed port, for tests that never reach the indexer.
    pub fn graphql_stub() -> GraphQlClient {
        let transport = Transport::new(None)
            .unwrap()
            .with_policy(crate::api::retry::BackoffPolicy::fixed(std::time::Duration::ZERO, 0));
        GraphQlClient::new(transport, "http://127.0.0.1:1/graphql")
    }

    pub fn set_object_type(&self, object_id: &str, object_type: &str) {
        self.object_types
            .lock()
            .unwrap()
            .insert(object_id.to_string(), object_type.to_string());
    }

    pub fn set_balance(&self, owner: &str, coin_type: &str, balance: u128) {
        self.balances
            .lock()
            .unwrap()
            .insert((owner.to_string(), coin_type.to_string()), balance);
    }

    pub fn set_coins(&self, owner: &str, coin_type: &str, coins: Vec<CoinRecord>) {
        self.coins
            .lock()
            .unwrap()
            .insert((owner.to_string(), coin_type.to_string()), coins);
    }

    /// Pages are served in order; page `n > 0` is requested with cursor `p<n>`.
    pub fn set_all_coin_pages(&self, owner: &str, pages: Vec<CoinPage>) {
        self.all_coin_pages.lock().unwrap().insert(owner.to_string(), pages);
    }

    pub fn fail_balance_for(&self, owner: &str) {
        self.failing_balances.lock().unwrap().insert(owner.to_string());
    }

    pub fn reject_wallet(&self, owner: &str) {
        self.rejecting_wallets.lock().unwrap().insert(owner.to_string());
    }

    pub fn reject_merges_for(&self, owner: &str) {
        self.rejecting_merges.lock().unwrap().insert(owner.to_string());
    }

    /// Hold every submission this long before it resolves.
    pub fn set_execute_delay(&self, delay: Duration) {
        *self.execute_delay.lock().unwrap() = delay;
    }

    /// Most submissions that were pending at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(String, ProgrammableTransaction)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_by(&self, owner: &str) -> Vec<ProgrammableTransaction> {
        self.executed()
            .into_iter()
            .filter(|(sender, _)| sender == owner)
            .map(|(_, plan)| plan)
            .collect()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn all_coins_calls(&self) -> usize {
        self.all_coins_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_object_type(&self, object_id: &str) -> Result<Option<String>> {
        Ok(self.object_types.lock().unwrap().get(object_id).cloned())
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_balances.lock().unwrap().contains(owner) {
            return Err(anyhow!("connection reset"));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(owner.to_string(), coin_type.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn get_coins(&self, owner: &str, coin_type: &str, _cursor: Option<&str>) -> Result<CoinPage> {
        let data = self
            .coins
            .lock()
            .unwrap()
            .get(&(owner.to_string(), coin_type.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(CoinPage { data, next_cursor: None, has_next_page: false })
    }

    async fn get_all_coins(&self, owner: &str, cursor: Option<&str>) -> Result<CoinPage> {
        self.all_coins_calls.fetch_add(1, Ordering::SeqCst);
        let index = match cursor {
            None => 0,
            Some(c) => c.trim_start_matches('p').parse::<usize>()?,
        };
        Ok(self
            .all_coin_pages
            .lock()
            .unwrap()
            .get(owner)
            .and_then(|pages| pages.get(index).cloned())
            .unwrap_or_default())
    }

    async fn execute(
        &self,
        plan: &ProgrammableTransaction,
        wallet: &WalletCredential,
    ) -> std::result::Result<String, TradeError> {
        let pending = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(pending, Ordering::SeqCst);

        let delay = *self.execute_delay.lock().unwrap();
        if delay.is_zero() {
            // Yield so concurrent wallet legs interleave like real submissions
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        let seq = {
            let mut executed = self.executed.lock().unwrap();
            executed.push((wallet.address.clone(), plan.clone()));
            executed.len()
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if plan.is_merge_only() && self.rejecting_merges.lock().unwrap().contains(&wallet.address) {
            return Err(TradeError::SubmissionRejected("merge aborted".to_string()));
        }
        if self.rejecting_wallets.lock().unwrap().contains(&wallet.address) {
            return Err(TradeError::SubmissionRejected("InsufficientCoinBalance".to_string()));
        }
        Ok(bs58::encode([seq as u8; 32]).into_string())
    }
}
