use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod models;
mod settings;
mod sui;
mod trading;

use crate::api::{GraphQlClient, Transport};
use crate::config::Config;
use crate::settings::Settings;
use crate::sui::{ChainQuery, SignerService, SuiRpcClient, WalletSet};
use crate::trading::{
    CreatorMonitorConfig, CreatorSellMonitor, Executor, HopTargets, JsonFileStorage, LaunchMonitor,
    LaunchMonitorConfig, TokenDirectory, WatchList,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    // Chain access
    let transport = Transport::new(config.proxy.as_ref()).context("Failed to build HTTP transport")?;
    if config.proxy.is_some() {
        info!("Routing requests through proxy");
    }
    let graphql = GraphQlClient::new(transport.clone(), &config.graphql_url);
    let signer = Arc::new(SignerService::new(transport.clone(), &config.signer_url));
    let ledger = Arc::new(SuiRpcClient::new(transport, &config.sui_rpc_url, signer));
    let wallets = WalletSet::new(&config.wallet_addresses)?;
    info!(
        "Trading with {} wallet(s), canonical {}",
        wallets.len(),
        wallets.canonical().address
    );
    let chain = ChainQuery::new(ledger, graphql, wallets);

    // Persistent state
    let directory = Arc::new(TokenDirectory::new(config.token_directory_path()));
    directory.load().await.context("Failed to load token directory")?;

    let storage = Arc::new(JsonFileStorage::new(config.watched_tokens_path()));
    let watchlist = Arc::new(WatchList::new(storage, chain.clone()));
    watchlist.load().await.context("Failed to load watch-list")?;
    if let Err(e) = watchlist.seed_from_wallet(&directory).await {
        error!("Startup wallet scan failed: {:#}", e);
    }

    let executor = Arc::new(Executor::new(
        chain.clone(),
        watchlist.clone(),
        directory.clone(),
        HopTargets::from_config(&config),
    ));

    // Background loops
    let creator_monitor = Arc::new(CreatorSellMonitor::new(
        CreatorMonitorConfig::from_config(&config),
        chain.clone(),
        watchlist.clone(),
        executor.clone(),
    ));
    let launch_monitor = Arc::new(LaunchMonitor::new(
        LaunchMonitorConfig::from_config(&config),
        chain,
        directory,
        Settings::new(config.settings_path.clone()),
        executor,
    ));

    let creator_handle = creator_monitor.start().await?;
    let launch_handle = launch_monitor.start().await?;
    info!("hopfun-sentinel is running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutting down...");

    creator_monitor.stop().await;
    launch_monitor.stop().await;
    let _ = tokio::join!(creator_handle, launch_handle);

    watchlist.save().await.context("Failed to persist watch-list on shutdown")?;
    info!("Watch-list saved, bye");

    Ok(())
}
