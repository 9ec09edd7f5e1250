//! Multi-wallet trade execution
//!
//! Every buy and sell fans out over all configured wallets at once. Each wallet
//! leg runs to completion on its own and the operation succeeds when at least
//! one leg did; a failing wallet never cancels its siblings.

use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::TradeError;
use crate::models::{TradeDirection, TradeRequest, TradeSummary, TransactionOutcome};
use crate::sui::client::CoinRecord;
use crate::sui::query::ChainQuery;
use crate::sui::transaction::{Argument, ProgrammableTransaction};
use crate::sui::wallet::WalletCredential;
use crate::trading::directory::TokenDirectory;
use crate::trading::hopfun::{MAX_PRICE, MIST_PER_SUI};
use crate::trading::watchlist::WatchList;

/// Wait after a merge so the merged coin is visible to the sell that follows.
pub const MERGE_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Per-wallet share deviation from an equal split.
const AMOUNT_VARIATION: f64 = 0.2;

const MIST_PER_CENT: u64 = MIST_PER_SUI / 100;

/// Move call targets and shared objects of the hop.fun deployment.
#[derive(Debug, Clone)]
pub struct HopTargets {
    pub buy: String,
    pub sell: String,
    pub config_object: String,
}

impl HopTargets {
    pub fn from_config(config: &Config) -> Self {
        Self {
            buy: config.buy_target(),
            sell: config.sell_target(),
            config_object: config.hop_config_object.clone(),
        }
    }
}

/// Which coin a sell splits from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinSelection {
    /// One coin already covers the amount
    Single(String),
    /// Merge `others` into `primary` first
    Merge { primary: String, others: Vec<String> },
}

/// Pick the coin to sell from. `coins` must be sorted by balance, largest first.
pub fn select_coin(coins: &[CoinRecord], amount: u128) -> Option<CoinSelection> {
    let (largest, rest) = coins.split_first()?;
    if largest.balance >= amount {
        return Some(CoinSelection::Single(largest.coin_object_id.clone()));
    }
    Some(CoinSelection::Merge {
        primary: largest.coin_object_id.clone(),
        others: rest.iter().map(|c| c.coin_object_id.clone()).collect(),
    })
}

/// Split `total_sui` across `wallets` in whole cents, each share drawn within ±20%
/// of an equal split and normalized so the shares add up to the total exactly.
/// Every wallet gets at least one cent when the total allows it; otherwise the
/// first `total_cents` wallets get one cent each and the rest nothing.
pub fn distribute_amount<R: Rng + ?Sized>(total_sui: f64, wallets: usize, rng: &mut R) -> Vec<u64> {
    if wallets == 0 {
        return Vec::new();
    }

    let total_cents = total_cents(total_sui);
    if total_cents < wallets as u64 {
        return (0..wallets as u64).map(|i| u64::from(i < total_cents)).collect();
    }

    let weights: Vec<f64> = (0..wallets)
        .map(|_| rng.gen_range((1.0 - AMOUNT_VARIATION)..=(1.0 + AMOUNT_VARIATION)))
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    let mut cents: Vec<u64> = weights
        .iter()
        .map(|w| ((w / weight_sum) * total_cents as f64).floor().max(1.0) as u64)
        .collect();

    let assigned: u64 = cents.iter().sum();
    if assigned < total_cents {
        cents[0] += total_cents - assigned;
    } else {
        // Floors bumped to one cent overshoot; take it back from the largest shares
        let mut excess = assigned - total_cents;
        while excess > 0 {
            let largest = (0..cents.len()).max_by_key(|&i| cents[i]).unwrap_or(0);
            if cents[largest] <= 1 {
                break;
            }
            cents[largest] -= 1;
            excess -= 1;
        }
    }
    cents
}

fn total_cents(total_sui: f64) -> u64 {
    (total_sui * 100.0).round().max(0.0) as u64
}

/// Result of a sell plus the watch-list reconciliation it scheduled.
pub struct SellReport {
    pub result: Result<TradeSummary, TradeError>,
    pub reconciliation: JoinHandle<()>,
}

impl SellReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(summary) if summary.is_success())
    }
}

pub struct Executor {
    chain: ChainQuery,
    watchlist: Arc<WatchList>,
    directory: Arc<TokenDirectory>,
    targets: HopTargets,
    /// Asset type -> lock held for the duration of a sell
    sell_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    merge_settle: Duration,
}

impl Executor {
    pub fn new(
        chain: ChainQuery,
        watchlist: Arc<WatchList>,
        directory: Arc<TokenDirectory>,
        targets: HopTargets,
    ) -> Self {
        Self {
            chain,
            watchlist,
            directory,
            targets,
            sell_locks: Mutex::new(HashMap::new()),
            merge_settle: MERGE_SETTLE_DELAY,
        }
    }

    pub fn with_merge_settle(mut self, delay: Duration) -> Self {
        self.merge_settle = delay;
        self
    }

    /// Run a request from the operator front-end. A sell's reconciliation keeps
    /// running in the background.
    pub async fn execute(&self, request: &TradeRequest) -> Result<TradeSummary, TradeError> {
        let known_type = request.token_type.as_deref();
        match request.direction {
            TradeDirection::Buy { amount_sui } => self.buy_with_type(&request.curve_id, known_type, amount_sui).await,
            TradeDirection::Sell { percentage } => {
                let result = self.sell_with_type(&request.curve_id, known_type, percentage).await;
                self.schedule_reconcile();
                result
            }
        }
    }

    async fn resolve_asset_type(&self, curve_id: &str, known: Option<&str>) -> Result<String, TradeError> {
        if let Some(token_type) = known {
            return Ok(token_type.to_string());
        }
        self.chain
            .asset_type_of_curve(curve_id)
            .await
            .ok_or_else(|| TradeError::AssetTypeUnresolved(curve_id.to_string()))
    }

    // ========================================================================
    // Buy
    // ========================================================================

    /// Spend roughly `total_sui` on `curve_id`, split across all wallets.
    pub async fn buy(&self, curve_id: &str, total_sui: f64) -> Result<TradeSummary, TradeError> {
        self.buy_with_type(curve_id, None, total_sui).await
    }

    async fn buy_with_type(
        &self,
        curve_id: &str,
        known_type: Option<&str>,
        total_sui: f64,
    ) -> Result<TradeSummary, TradeError> {
        let start = Instant::now();

        if !(total_sui >= 0.01) {
            return Err(TradeError::InvalidAmount(total_sui.to_string()));
        }
        let wallets: Vec<WalletCredential> = self.chain.wallets().iter().cloned().collect();
        if wallets.is_empty() {
            return Err(TradeError::NoWallets);
        }

        if total_cents(total_sui) < wallets.len() as u64 {
            return Err(TradeError::InvalidAmount(format!(
                "{} (at least 0.01 SUI per wallet, {} wallets)",
                total_sui,
                wallets.len()
            )));
        }

        let token_type = self.resolve_asset_type(curve_id, known_type).await?;
        let amounts = distribute_amount(total_sui, wallets.len(), &mut rand::thread_rng());
        info!(
            "🛒 Buying {} on {} across {} wallets: {:?} cents",
            token_type,
            curve_id,
            wallets.len(),
            amounts
        );

        let outcomes = join_all(
            wallets
                .iter()
                .zip(amounts)
                .map(|(wallet, cents)| self.buy_leg(wallet, curve_id, &token_type, cents)),
        )
        .await;

        let summary = TradeSummary {
            token_type: token_type.clone(),
            outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Buy summary: {}/{} wallets succeeded in {}ms",
            summary.success_count(),
            summary.total(),
            summary.duration_ms
        );

        if summary.is_success() {
            self.register_watch(&token_type).await;
        }
        Ok(summary)
    }

    async fn buy_leg(
        &self,
        wallet: &WalletCredential,
        curve_id: &str,
        token_type: &str,
        cents: u64,
    ) -> TransactionOutcome {
        let start = Instant::now();

        let mut tx = ProgrammableTransaction::new();
        let payment = tx.split_coins(Argument::GasCoin, u128::from(cents * MIST_PER_CENT));
        tx.move_call(
            &self.targets.buy,
            vec![token_type.to_string()],
            vec![
                Argument::Object(curve_id.to_string()),
                Argument::Object(self.targets.config_object.clone()),
                payment,
                Argument::Pure(MAX_PRICE.to_string()),
                Argument::Pure("0".to_string()),
                Argument::Address(wallet.address.clone()),
            ],
        );

        let result = self.chain.ledger().execute(&tx, wallet).await;
        outcome(wallet, "buy", start, result)
    }

    /// Start watching a freshly bought token, unless it already is.
    async fn register_watch(&self, token_type: &str) {
        if self.watchlist.is_watched(token_type).await {
            return;
        }
        let entry = match self.directory.find_by_type(token_type).await {
            Some(entry) => entry,
            None => {
                warn!("Bought {} but it is not in the token directory, not watching it", token_type);
                return;
            }
        };
        if let Err(e) = self.watchlist.add(token_type, &entry).await {
            error!("Failed to watch {}: {:#}", token_type, e);
        }
    }

    // ========================================================================
    // Sell
    // ========================================================================

    /// Sell `percentage` of every wallet's holding on `curve_id`.
    ///
    /// A watch-list reconciliation is spawned afterwards whatever the outcome; its
    /// handle is returned alongside the result.
    pub async fn sell(&self, curve_id: &str, percentage: u8) -> SellReport {
        let result = self.sell_with_type(curve_id, None, percentage).await;
        SellReport {
            result,
            reconciliation: self.schedule_reconcile(),
        }
    }

    async fn sell_with_type(
        &self,
        curve_id: &str,
        known_type: Option<&str>,
        percentage: u8,
    ) -> Result<TradeSummary, TradeError> {
        let start = Instant::now();

        if percentage == 0 || percentage > 100 {
            return Err(TradeError::InvalidPercentage(percentage));
        }
        let wallets: Vec<WalletCredential> = self.chain.wallets().iter().cloned().collect();
        if wallets.is_empty() {
            return Err(TradeError::NoWallets);
        }

        let token_type = self.resolve_asset_type(curve_id, known_type).await?;

        let lock = self.sell_lock(&token_type).await;
        let guard = lock.lock().await;

        info!("💸 Selling {}% of {} on {}", percentage, token_type, curve_id);
        let outcomes = join_all(
            wallets
                .iter()
                .map(|wallet| self.sell_leg(wallet, curve_id, &token_type, percentage)),
        )
        .await;

        drop(guard);
        drop(lock);
        self.release_sell_lock(&token_type).await;

        let summary = TradeSummary {
            token_type,
            outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Sell summary: {}/{} wallets succeeded in {}ms",
            summary.success_count(),
            summary.total(),
            summary.duration_ms
        );
        Ok(summary)
    }

    async fn sell_leg(
        &self,
        wallet: &WalletCredential,
        curve_id: &str,
        token_type: &str,
        percentage: u8,
    ) -> TransactionOutcome {
        let start = Instant::now();
        let result = self.sell_for_wallet(wallet, curve_id, token_type, percentage).await;
        outcome(wallet, "sell", start, result)
    }

    async fn sell_for_wallet(
        &self,
        wallet: &WalletCredential,
        curve_id: &str,
        token_type: &str,
        percentage: u8,
    ) -> Result<String, TradeError> {
        let ledger = self.chain.ledger();

        let mut coins = self
            .chain
            .coins_of_type(&wallet.address, token_type)
            .await
            .map_err(|e| TradeError::QueryFailed(format!("{:#}", e)))?;
        coins.sort_by(|a, b| b.balance.cmp(&a.balance));

        let held: u128 = coins.iter().map(|c| c.balance).sum();
        let amount = held * u128::from(percentage) / 100;
        if amount == 0 {
            return Err(TradeError::NoCoinsOwned(token_type.to_string()));
        }

        let coin_id = match select_coin(&coins, amount) {
            Some(CoinSelection::Single(coin_id)) => coin_id,
            Some(CoinSelection::Merge { primary, others }) => {
                info!("Wallet {} merging {} coins before selling", wallet.number(), others.len() + 1);
                let mut merge = ProgrammableTransaction::new();
                merge.merge_coins(
                    Argument::Object(primary.clone()),
                    others.into_iter().map(Argument::Object).collect(),
                );
                ledger
                    .execute(&merge, wallet)
                    .await
                    .map_err(|e| TradeError::MergeFailed(e.to_string()))?;
                tokio::time::sleep(self.merge_settle).await;
                primary
            }
            None => return Err(TradeError::NoCoinsOwned(token_type.to_string())),
        };

        let mut tx = ProgrammableTransaction::new();
        let to_sell = tx.split_coins(Argument::Object(coin_id), amount);
        tx.move_call(
            &self.targets.sell,
            vec![token_type.to_string()],
            vec![
                Argument::Object(curve_id.to_string()),
                Argument::Object(self.targets.config_object.clone()),
                to_sell,
                Argument::Pure("0".to_string()),
            ],
        );

        ledger.execute(&tx, wallet).await
    }

    async fn sell_lock(&self, token_type: &str) -> Arc<Mutex<()>> {
        self.sell_locks
            .lock()
            .await
            .entry(token_type.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the lock once no other sell holds or waits on it.
    async fn release_sell_lock(&self, token_type: &str) {
        let mut locks = self.sell_locks.lock().await;
        if locks.get(token_type).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            locks.remove(token_type);
        }
    }

    fn schedule_reconcile(&self) -> JoinHandle<()> {
        let watchlist = self.watchlist.clone();
        tokio::spawn(async move {
            if let Err(e) = watchlist.reconcile_and_prune().await {
                error!("Error updating watched tokens: {:#}", e);
            }
        })
    }
}

fn outcome(
    wallet: &WalletCredential,
    action: &str,
    start: Instant,
    result: Result<String, TradeError>,
) -> TransactionOutcome {
    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(digest) => {
            info!("✅ Wallet {} {} completed in {}ms", wallet.number(), action, duration_ms);
            info!("View transaction: https://suivision.xyz/txblock/{}", digest);
            TransactionOutcome {
                wallet_index: wallet.index,
                success: true,
                duration_ms,
                tx_digest: Some(digest),
                error: None,
            }
        }
        Err(e) => {
            match &e {
                TradeError::NoCoinsOwned(_) => info!("Wallet {} has no balance to {}", wallet.number(), action),
                _ => warn!("❌ Wallet {} {} failed after {}ms: {}", wallet.number(), action, duration_ms, e),
            }
            TransactionOutcome {
                wallet_index: wallet.index,
                success: false,
                duration_ms,
                tx_digest: None,
                error: Some(e),
            }
        }
    }
}
