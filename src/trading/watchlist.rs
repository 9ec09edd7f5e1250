//! Watched Positions Module
//!
//! Tracks the hop.fun tokens the wallets currently hold, together with the
//! creator that launched each one. The creator-sell monitor scans this list;
//! the executor adds to it after buys and reconciles it after sells.
//!
//! Persistence is merge-on-write: `save` reads whatever is on disk, overlays the
//! in-memory entries and drops keys removed here, so a second process writing the
//! same file keeps its additions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{TokenDirectoryEntry, WatchedToken};
use crate::sui::query::ChainQuery;
use crate::trading::directory::TokenDirectory;
use crate::trading::hopfun::SUI_COIN_TYPE;

/// Asset type -> watched position
pub type WatchMap = BTreeMap<String, WatchedToken>;

/// Durable backing for the watch-list.
#[async_trait]
pub trait WatchStorage: Send + Sync {
    /// `None` when nothing usable is stored (missing or corrupt).
    async fn read(&self) -> Option<WatchMap>;

    async fn write(&self, tokens: &WatchMap) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on every write.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl WatchStorage for JsonFileStorage {
    async fn read(&self) -> Option<WatchMap> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Watch file {:?} not readable: {}", self.path, e);
                return None;
            }
        };
        if data.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&data) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!("Watch file {:?} is corrupt: {}", self.path, e);
                None
            }
        }
    }

    async fn write(&self, tokens: &WatchMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create watch-list directory")?;
        }

        let data = serde_json::to_string_pretty(tokens)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    contents: std::sync::Mutex<Option<WatchMap>>,
    writes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with_contents(tokens: WatchMap) -> Self {
        Self {
            contents: std::sync::Mutex::new(Some(tokens)),
            ..Default::default()
        }
    }

    pub fn contents(&self) -> Option<WatchMap> {
        self.contents.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl WatchStorage for MemoryStorage {
    async fn read(&self) -> Option<WatchMap> {
        self.contents()
    }

    async fn write(&self, tokens: &WatchMap) -> Result<()> {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.contents.lock().unwrap() = Some(tokens.clone());
        Ok(())
    }
}

pub struct WatchList {
    tokens: RwLock<WatchMap>,
    /// Keys removed since the last write, so merging with disk does not bring them back
    tombstones: RwLock<HashSet<String>>,
    storage: Arc<dyn WatchStorage>,
    chain: ChainQuery,
}

impl WatchList {
    pub fn new(storage: Arc<dyn WatchStorage>, chain: ChainQuery) -> Self {
        Self {
            tokens: RwLock::new(WatchMap::new()),
            tombstones: RwLock::new(HashSet::new()),
            storage,
            chain,
        }
    }

    /// Load from storage. Missing or corrupt state becomes an empty list and is rewritten.
    pub async fn load(&self) -> Result<usize> {
        match self.storage.read().await {
            Some(loaded) => {
                let count = loaded.len();
                *self.tokens.write().await = loaded;
                info!("📂 Loaded {} tokens to watch", count);
                Ok(count)
            }
            None => {
                info!("No usable watch file, starting with an empty watch list");
                self.tokens.write().await.clear();
                self.storage.write(&WatchMap::new()).await?;
                Ok(0)
            }
        }
    }

    /// Watch `token_type` if the canonical wallet holds any of it.
    ///
    /// Returns false, leaving the list untouched, when the balance is zero or the
    /// directory entry has no creator to watch.
    pub async fn add(&self, token_type: &str, info: &TokenDirectoryEntry) -> Result<bool> {
        let creator = match &info.creator {
            Some(creator) => creator.clone(),
            None => {
                warn!("No creator recorded for {}, not watching it", token_type);
                return Ok(false);
            }
        };

        let owner = &self.chain.wallets().canonical().address;
        let balance = self
            .chain
            .get_balance(owner, token_type)
            .await
            .with_context(|| format!("Failed to query balance of {}", token_type))?;

        if balance == 0 {
            debug!("Not watching {}: zero balance", token_type);
            return Ok(false);
        }

        {
            let mut tombstones = self.tombstones.write().await;
            let mut tokens = self.tokens.write().await;
            tombstones.remove(token_type);
            tokens.insert(
                token_type.to_string(),
                WatchedToken {
                    creator: creator.clone(),
                    balance,
                    curve_id: info.curve_id.clone(),
                    data: info.token_data(),
                },
            );
        }

        info!("🔍 Added {} ({}) to watch list", info.name, token_type);
        info!("👤 Creator: {}", creator);
        info!("💰 Balance: {}", balance);

        self.save().await?;
        Ok(true)
    }

    pub async fn is_watched(&self, token_type: &str) -> bool {
        self.tokens.read().await.contains_key(token_type)
    }

    pub async fn get(&self, token_type: &str) -> Option<WatchedToken> {
        self.tokens.read().await.get(token_type).cloned()
    }

    pub async fn snapshot(&self) -> Vec<(String, WatchedToken)> {
        self.tokens
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Re-query every balance, update changed ones and drop emptied positions.
    ///
    /// Writes only when something changed; returns whether it did. A failed balance
    /// query leaves that entry as it was.
    pub async fn reconcile_and_prune(&self) -> Result<bool> {
        let owner = self.chain.wallets().canonical().address.clone();
        let mut changed = false;

        for (token_type, token) in self.snapshot().await {
            let balance = match self.chain.get_balance(&owner, &token_type).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!("Skipping reconcile of {}: {:#}", token_type, e);
                    continue;
                }
            };

            if balance == 0 {
                let mut tombstones = self.tombstones.write().await;
                let mut tokens = self.tokens.write().await;
                if tokens.remove(&token_type).is_some() {
                    tombstones.insert(token_type.clone());
                    changed = true;
                    info!("🗑️ Removed {} ({}) from watch list - zero balance", token.data.name, token_type);
                }
            } else if balance != token.balance {
                if let Some(entry) = self.tokens.write().await.get_mut(&token_type) {
                    debug!("{} balance {} -> {}", token_type, entry.balance, balance);
                    entry.balance = balance;
                    changed = true;
                }
            }
        }

        if changed {
            self.save().await?;
        }
        Ok(changed)
    }

    /// Merge the working set into storage. Returns false when storage already matched.
    pub async fn save(&self) -> Result<bool> {
        let stored = self.storage.read().await;

        let mut tombstones = self.tombstones.write().await;
        let mut tokens = self.tokens.write().await;

        let mut merged = stored.clone().unwrap_or_default();
        for key in tombstones.iter() {
            merged.remove(key);
        }
        merged.extend(tokens.iter().map(|(k, v)| (k.clone(), v.clone())));

        let unchanged = stored.as_ref() == Some(&merged);
        *tokens = merged;

        if unchanged {
            tombstones.clear();
            debug!("Watch list unchanged, skipping write");
            return Ok(false);
        }

        self.storage.write(&tokens).await?;
        tombstones.clear();
        debug!("💾 Saved {} watched tokens", tokens.len());
        Ok(true)
    }

    /// Stop watching `token_type`, e.g. after its protective sell went through.
    pub async fn remove(&self, token_type: &str) -> Result<Option<WatchedToken>> {
        let removed = {
            let mut tombstones = self.tombstones.write().await;
            let mut tokens = self.tokens.write().await;
            tombstones.insert(token_type.to_string());
            tokens.remove(token_type)
        };
        if let Some(ref token) = removed {
            info!("🗑️ Removed {} ({}) from watch list", token.data.name, token_type);
        }
        self.save().await?;
        Ok(removed)
    }

    /// Watch every directory-known token the canonical wallet already holds.
    pub async fn seed_from_wallet(&self, directory: &TokenDirectory) -> Result<usize> {
        let owner = self.chain.wallets().canonical().address.clone();
        let coins = self
            .chain
            .all_coins(&owner)
            .await
            .context("Failed to list wallet coins")?;

        let mut seen = HashSet::new();
        let mut added = 0;
        for coin in coins {
            if coin.coin_type == SUI_COIN_TYPE || !seen.insert(coin.coin_type.clone()) {
                continue;
            }
            let entry = match directory.find_by_type(&coin.coin_type).await {
                Some(entry) => entry,
                None => continue,
            };
            match self.add(&coin.coin_type, &entry).await {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not seed {}: {:#}", coin.coin_type, e),
            }
        }

        info!("Found {} token types in wallet, watching {} of them", seen.len(), added);
        for (token_type, token) in self.snapshot().await {
            info!("📊 {} ({}) creator {} curve {}", token.data.name, token_type, token.creator, token.curve_id);
        }

        self.save().await?;
        Ok(added)
    }
}
