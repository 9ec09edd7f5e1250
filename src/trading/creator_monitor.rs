// src/trading/creator_monitor.rs
//
// Protective exit on creator sells. Polls the indexer for the latest calls to
// the bonding-curve sell entry point and, when a sender is the creator of a
// token we hold, sells the whole position.

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::retry::{retry_if, BackoffPolicy};
use crate::config::Config;
use crate::sui::query::ChainQuery;
use crate::trading::executor::Executor;
use crate::trading::watchlist::WatchList;

/// Sell calls inspected per poll.
const SELL_LOOKBACK: u32 = 15;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreatorMonitorConfig {
    /// Fully qualified `<package>::meme::sell`
    pub sell_function: String,
    /// Delay between the end of one poll and the start of the next
    pub poll_interval: Duration,
    pub lookback: u32,
    /// Re-query schedule when a poll fails
    pub retry: BackoffPolicy,
}

impl CreatorMonitorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sell_function: config.watched_sell_function(),
            poll_interval: Duration::from_millis(config.creator_poll_interval_ms),
            lookback: SELL_LOOKBACK,
            retry: BackoffPolicy::creator_poll(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CreatorMonitorStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub creator_sells_detected: u64,
    pub protective_sells: u64,
    pub failed_protective_sells: u64,
}

// ============================================================================
// CREATOR SELL MONITOR
// ============================================================================

pub struct CreatorSellMonitor {
    config: CreatorMonitorConfig,
    chain: ChainQuery,
    watchlist: Arc<WatchList>,
    executor: Arc<Executor>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<RwLock<CreatorMonitorStats>>,
}

impl CreatorSellMonitor {
    pub fn new(
        config: CreatorMonitorConfig,
        chain: ChainQuery,
        watchlist: Arc<WatchList>,
        executor: Arc<Executor>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            chain,
            watchlist,
            executor,
            running: Arc::new(RwLock::new(false)),
            shutdown_tx,
            stats: Arc::new(RwLock::new(CreatorMonitorStats::default())),
        }
    }

    /// Spawn the polling loop. Each poll starts `poll_interval` after the previous
    /// one finished, whatever its outcome.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Creator sell monitor is already running"));
        }
        *running = true;
        drop(running);

        info!("👀 Watching {} for creator sells", self.config.sell_function);

        let monitor = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Ok(tokio::spawn(async move {
            loop {
                if !*monitor.running.read().await {
                    break;
                }

                if let Err(e) = monitor.run_cycle().await {
                    error!("Error in creator sell watch after retries: {}", e);
                }

                tokio::select! {
                    _ = tokio::time::sleep(monitor.config.poll_interval) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
            info!("Creator sell monitor stopped");
        }))
    }

    pub async fn stop(&self) {
        info!("Stopping creator sell monitor...");
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(());
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn get_stats(&self) -> CreatorMonitorStats {
        self.stats.read().await.clone()
    }

    /// One poll: fetch recent sells, match senders against watched creators and
    /// liquidate every matched position. Returns how many positions were closed.
    pub async fn run_cycle(&self) -> Result<usize> {
        self.stats.write().await.cycles += 1;

        let query = retry_if(
            &self.config.retry,
            "Creator sell query",
            || self.chain.recent_function_calls(&self.config.sell_function, self.config.lookback),
            |_| true,
        )
        .await;

        let calls = match query {
            Ok(calls) => calls,
            Err(e) => {
                self.stats.write().await.failed_cycles += 1;
                return Err(e.into());
            }
        };

        if calls.is_empty() {
            debug!("No sell transactions found");
            return Ok(0);
        }

        let watched = self.watchlist.snapshot().await;
        let mut matched: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for call in &calls {
            for (token_type, token) in &watched {
                if token.creator == call.sender && seen.insert(token_type.clone()) {
                    info!("🚨 CREATOR SELL DETECTED! tx {}", call.digest);
                    info!("📊 Our Token: {} ({})", token.data.name, token_type);
                    info!("Creator Address: {}", token.creator);
                    info!("Curve ID: {}", token.curve_id);
                    matched.push(token_type.clone());
                }
            }
        }

        let mut closed = 0;
        for token_type in matched {
            self.stats.write().await.creator_sells_detected += 1;

            // An earlier sell in this cycle or a manual exit may already have removed it
            let token = match self.watchlist.get(&token_type).await {
                Some(token) => token,
                None => continue,
            };

            let report = self.executor.sell(&token.curve_id, 100).await;
            if report.is_success() {
                info!("✅ Dev sell successful for {}", token.data.name);
                if let Err(e) = self.watchlist.remove(&token_type).await {
                    error!("Failed to persist removal of {}: {:#}", token_type, e);
                }
                self.stats.write().await.protective_sells += 1;
                closed += 1;
            } else {
                match &report.result {
                    Err(e) => warn!("❌ Dev sell failed for {}: {}", token.data.name, e),
                    Ok(_) => warn!("❌ Dev sell failed for {}: no wallet sold", token.data.name),
                }
                self.stats.write().await.failed_protective_sells += 1;
            }
        }

        Ok(closed)
    }
}
