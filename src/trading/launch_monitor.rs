// src/trading/launch_monitor.rs
//
// Discovers new hop.fun launches by polling connector acceptances, records them in
// the token directory and, when AUTOBUY is on, buys across every wallet.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::settings::{Settings, AUTOBUY};
use crate::sui::query::ChainQuery;
use crate::trading::directory::TokenDirectory;
use crate::trading::executor::Executor;
use crate::trading::hopfun::{supply_percentage, LaunchEvent, TOTAL_SUPPLY};

/// Acceptances inspected per poll.
const LAUNCH_LOOKBACK: u32 = 5;

#[derive(Debug, Clone)]
pub struct LaunchMonitorConfig {
    pub launch_function: String,
    pub dev_order_function: String,
    pub poll_interval: Duration,
    pub lookback: u32,
    pub buy_amount_sui: f64,
}

impl LaunchMonitorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            launch_function: config.launch_function(),
            dev_order_function: config.dev_order_function(),
            poll_interval: Duration::from_secs(config.launch_poll_interval_secs),
            lookback: LAUNCH_LOOKBACK,
            buy_amount_sui: config.buy_amount_sui,
        }
    }
}

/// What we know about a launch at the moment it is discovered.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub event: LaunchEvent,
    pub token_type: String,
    /// Launches by the same creator before this one
    pub prior_launches: u64,
    pub creator_sui_balance: f64,
    pub creator_holdings_pct: f64,
    pub autobuy_successes: Option<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct LaunchMonitorStats {
    pub cycles: u64,
    pub launches_seen: u64,
    pub malformed_events: u64,
    pub autobuys: u64,
}

pub struct LaunchMonitor {
    config: LaunchMonitorConfig,
    chain: ChainQuery,
    directory: Arc<TokenDirectory>,
    settings: Settings,
    executor: Arc<Executor>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<RwLock<LaunchMonitorStats>>,
}

impl LaunchMonitor {
    pub fn new(
        config: LaunchMonitorConfig,
        chain: ChainQuery,
        directory: Arc<TokenDirectory>,
        settings: Settings,
        executor: Arc<Executor>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            chain,
            directory,
            settings,
            executor,
            running: Arc::new(RwLock::new(false)),
            shutdown_tx,
            stats: Arc::new(RwLock::new(LaunchMonitorStats::default())),
        }
    }

    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        if self.config.poll_interval.is_zero() {
            return Err(anyhow!("Launch poll interval must be greater than zero"));
        }
        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Launch monitor is already running"));
        }
        *running = true;
        drop(running);

        info!("🚀 Starting hop.fun launch monitor...");

        let monitor = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Ok(tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !*monitor.running.read().await {
                            break;
                        }
                        if let Err(e) = monitor.run_cycle().await {
                            error!("Error checking for new launches: {:#}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            info!("Launch monitor stopped");
        }))
    }

    pub async fn stop(&self) {
        info!("Stopping launch monitor...");
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(());
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn get_stats(&self) -> LaunchMonitorStats {
        self.stats.read().await.clone()
    }

    /// One poll. A bad item is logged and skipped; only the listing query itself
    /// fails the cycle.
    pub async fn run_cycle(&self) -> Result<Vec<LaunchReport>> {
        self.stats.write().await.cycles += 1;

        let calls = self
            .chain
            .recent_function_calls(&self.config.launch_function, self.config.lookback)
            .await
            .context("Failed to fetch recent launches")?;

        let mut reports = Vec::new();
        for call in calls {
            let decoded = match call.events.first() {
                Some(data) => LaunchEvent::try_from(data).map_err(anyhow::Error::from),
                None => Err(anyhow!("no event emitted")),
            };
            let event = match decoded {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping launch in tx {}: {}", call.digest, e);
                    self.stats.write().await.malformed_events += 1;
                    continue;
                }
            };

            match self.process_launch(event).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => warn!("Failed to process launch in tx {}: {:#}", call.digest, e),
            }
        }

        Ok(reports)
    }

    async fn process_launch(&self, event: LaunchEvent) -> Result<Option<LaunchReport>> {
        if self.directory.is_duplicate(&event.curve_id).await {
            debug!("Launch {} already known", event.curve_id);
            return Ok(None);
        }

        let token_type = match self.chain.asset_type_of_curve(&event.curve_id).await {
            Some(token_type) => token_type,
            None => {
                warn!("Could not resolve asset type for curve {}", event.curve_id);
                return Ok(None);
            }
        };

        let launches = self
            .chain
            .count_function_calls(&self.config.dev_order_function, &event.creator)
            .await
            .context("Failed to count creator launches")?;
        let creator_sui_balance = self
            .chain
            .native_balance_sui(&event.creator)
            .await
            .context("Failed to fetch creator SUI balance")?;
        let creator_tokens = self
            .chain
            .get_balance(&event.creator, &token_type)
            .await
            .context("Failed to fetch creator holdings")?;

        let mut report = LaunchReport {
            prior_launches: launches.saturating_sub(1),
            creator_sui_balance,
            creator_holdings_pct: supply_percentage(creator_tokens, TOTAL_SUPPLY),
            token_type,
            event,
            autobuy_successes: None,
        };

        info!("🆕 New launch: {} (${})", report.event.coin_name, report.event.ticker);
        info!("   Type: {}", report.token_type);
        info!("   Curve: {}", report.event.curve_id);
        info!(
            "   Creator: {} | {:.2} SUI | holds {:.2}% | {} previous launches",
            report.event.creator,
            report.creator_sui_balance,
            report.creator_holdings_pct,
            report.prior_launches
        );
        for (label, link) in [
            ("Website", &report.event.website),
            ("Twitter", &report.event.twitter),
            ("Telegram", &report.event.telegram),
        ] {
            if let Some(link) = link {
                info!("   {}: {}", label, link);
            }
        }

        let entry = TokenDirectory::entry_for_launch(
            &report.event.curve_id,
            &report.event.coin_name,
            &report.event.ticker,
            &report.token_type,
            &report.event.creator,
        );
        self.directory.store(&TokenDirectory::new_listing_id(), entry).await?;
        self.stats.write().await.launches_seen += 1;

        if self.settings.flag(AUTOBUY).await {
            info!("🤖 AUTOBUY on, buying {} SUI of {}", self.config.buy_amount_sui, report.event.ticker);
            match self.executor.buy(&report.event.curve_id, self.config.buy_amount_sui).await {
                Ok(summary) => {
                    report.autobuy_successes = Some(summary.success_count());
                    self.stats.write().await.autobuys += 1;
                }
                Err(e) => {
                    error!("Autobuy of {} failed: {}", report.event.ticker, e);
                    report.autobuy_successes = Some(0);
                }
            }
        }

        Ok(Some(report))
    }
}
