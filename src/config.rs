use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::BotError;

pub const DEFAULT_GRAPHQL_URL: &str = "https://sui-mainnet.mystenlabs.com/graphql";

/// hop.fun package the bonding-curve entry points live in.
pub const DEFAULT_HOP_PACKAGE_ID: &str =
    "0xda79a03bd1cfcd082d713ee615dd7fe5f4574019ddad131466312fa5d1369077";
/// Upgraded package that carries the current `meme::sell` implementation.
pub const DEFAULT_HOP_SELL_PACKAGE_ID: &str =
    "0x0ab2e8efd128ab543e60afc1719108704b960833d47e452b2ffb9bc915ef6dbc";
/// Shared `MemeConfig` object passed to every buy and sell.
pub const DEFAULT_HOP_CONFIG_OBJECT: &str =
    "0xfa6d14378e545d7da62d15f7f1b5ac26ed9b2d7ffa6b232b245ffe7645591e91";

pub const MAX_WALLETS: usize = 4;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub sui_rpc_url: String,
    pub graphql_url: String,
    pub signer_url: String,
    pub proxy: Option<ProxyConfig>,

    pub wallet_addresses: Vec<String>, // WALLET_ADDRESS_1..4, first one is canonical

    pub data_dir: PathBuf,
    pub settings_path: PathBuf,

    pub buy_amount_sui: f64,
    pub launch_poll_interval_secs: u64,
    pub creator_poll_interval_ms: u64,

    pub hop_package_id: String,
    pub hop_sell_package_id: String,
    pub hop_config_object: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let wallet_addresses = Self::wallet_addresses_from_env()?;

        let proxy = env::var("PROXY_URL").ok().map(|url| ProxyConfig {
            url,
            username: env::var("PROXY_USERNAME").ok(),
            password: env::var("PROXY_PASSWORD").ok(),
        });

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let settings_path = env::var("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_settings_path(&data_dir));

        Ok(Self {
            sui_rpc_url: env::var("SUI_RPC_URL")
                .context("SUI_RPC_URL not set in environment")?,
            graphql_url: env::var("GRAPHQL_URL")
                .unwrap_or_else(|_| DEFAULT_GRAPHQL_URL.to_string()),
            signer_url: env::var("SIGNER_URL")
                .context("SIGNER_URL not set in environment")?,
            proxy,

            wallet_addresses,

            data_dir,
            settings_path,

            buy_amount_sui: env::var("BUY_AMOUNT_SUI")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("Failed to parse BUY_AMOUNT_SUI")?,
            launch_poll_interval_secs: poll_interval(
                "LAUNCH_POLL_INTERVAL_SECS",
                env::var("LAUNCH_POLL_INTERVAL_SECS").ok(),
                10,
            )?,
            creator_poll_interval_ms: poll_interval(
                "CREATOR_POLL_INTERVAL_MS",
                env::var("CREATOR_POLL_INTERVAL_MS").ok(),
                1000,
            )?,

            hop_package_id: env::var("HOP_PACKAGE_ID")
                .unwrap_or_else(|_| DEFAULT_HOP_PACKAGE_ID.to_string()),
            hop_sell_package_id: env::var("HOP_SELL_PACKAGE_ID")
                .unwrap_or_else(|_| DEFAULT_HOP_SELL_PACKAGE_ID.to_string()),
            hop_config_object: env::var("HOP_CONFIG_OBJECT")
                .unwrap_or_else(|_| DEFAULT_HOP_CONFIG_OBJECT.to_string()),
        })
    }

    fn wallet_addresses_from_env() -> Result<Vec<String>> {
        let addresses: Vec<String> = (1..=MAX_WALLETS)
            .filter_map(|i| env::var(format!("WALLET_ADDRESS_{}", i)).ok())
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        if addresses.is_empty() {
            return Err(BotError::ConfigError(
                "At least one WALLET_ADDRESS_<n> must be set".to_string(),
            )
            .into());
        }
        Ok(addresses)
    }

    pub fn watched_tokens_path(&self) -> PathBuf {
        self.data_dir.join("watched_tokens.json")
    }

    pub fn token_directory_path(&self) -> PathBuf {
        self.data_dir.join("tokens.json")
    }

    pub fn buy_target(&self) -> String {
        format!("{}::meme::buy", self.hop_package_id)
    }

    pub fn sell_target(&self) -> String {
        format!("{}::meme::sell", self.hop_sell_package_id)
    }

    /// Function id the creator-sell monitor filters the indexer on.
    pub fn watched_sell_function(&self) -> String {
        format!("{}::meme::sell", self.hop_package_id)
    }

    pub fn launch_function(&self) -> String {
        format!("{}::meme::accept_connector_v3", self.hop_package_id)
    }

    pub fn dev_order_function(&self) -> String {
        format!("{}::meme::place_dev_order", self.hop_package_id)
    }
}

/// `settings.json` next to the data directory, i.e. `<DATA_DIR>/../settings.json`.
fn default_settings_path(data_dir: &Path) -> PathBuf {
    data_dir
        .parent()
        .map(|parent| parent.join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

/// Unset or unparsable falls back to `default`; zero is rejected.
fn poll_interval(name: &str, raw: Option<String>, default: u64) -> Result<u64> {
    let value = raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default);
    if value == 0 {
        return Err(BotError::ConfigError(format!("{} must be greater than zero", name)).into());
    }
    Ok(value)
}
