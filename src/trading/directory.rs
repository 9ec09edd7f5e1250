//! Token directory
//!
//! Every launch the bot has seen, keyed by a short random listing id. Used to
//! skip duplicate launches and to turn a bare asset type back into name, ticker,
//! curve and creator when a position needs to be watched.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::TokenDirectoryEntry;

pub struct TokenDirectory {
    entries: RwLock<HashMap<String, TokenDirectoryEntry>>,
    path: PathBuf,
}

impl TokenDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path,
        }
    }

    /// Six-character listing id.
    pub fn new_listing_id() -> String {
        Uuid::new_v4().simple().to_string()[..6].to_string()
    }

    pub fn entry_for_launch(curve_id: &str, name: &str, ticker: &str, token_type: &str, creator: &str) -> TokenDirectoryEntry {
        TokenDirectoryEntry {
            curve_id: curve_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            name: name.to_string(),
            ticker: ticker.to_string(),
            token_type: token_type.to_string(),
            creator: Some(creator.to_string()),
        }
    }

    /// Load from disk. A missing or unreadable file is replaced with an empty one.
    pub async fn load(&self) -> Result<usize> {
        let loaded = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => match serde_json::from_str::<HashMap<String, TokenDirectoryEntry>>(&data) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Token directory {:?} is corrupt ({}), starting empty", self.path, e);
                    None
                }
            },
            Err(e) => {
                debug!("Token directory {:?} not readable ({}), starting empty", self.path, e);
                None
            }
        };

        let count = match loaded {
            Some(entries) => {
                let count = entries.len();
                *self.entries.write().await = entries;
                count
            }
            None => {
                self.entries.write().await.clear();
                self.persist().await?;
                0
            }
        };

        info!("📂 Loaded {} tokens from directory", count);
        Ok(count)
    }

    /// Returns false without writing when the curve is already known.
    pub async fn store(&self, listing_id: &str, entry: TokenDirectoryEntry) -> Result<bool> {
        {
            let mut entries = self.entries.write().await;
            if entries.values().any(|e| e.curve_id == entry.curve_id) {
                debug!("Curve {} already in directory", entry.curve_id);
                return Ok(false);
            }
            info!("📝 Listing {} stored as {}", entry.ticker, listing_id);
            entries.insert(listing_id.to_string(), entry);
        }
        self.persist().await?;
        Ok(true)
    }

    pub async fn is_duplicate(&self, curve_id: &str) -> bool {
        self.entries.read().await.values().any(|e| e.curve_id == curve_id)
    }

    pub async fn find_by_type(&self, token_type: &str) -> Option<TokenDirectoryEntry> {
        self.entries
            .read()
            .await
            .values()
            .find(|e| e.token_type == token_type)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create token directory folder")?;
        }
        let data = {
            let entries = self.entries.read().await;
            serde_json::to_string_pretty(&*entries)?
        };
        tokio::fs::write(&self.path, data)
            .await
            .with_context(|| format!("Failed to write token directory {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tokens.json");
        let directory = TokenDirectory::new(path.clone());

        assert_eq!(directory.load().await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{ not json").unwrap();

        let directory = TokenDirectory::new(path.clone());
        assert_eq!(directory.load().await.unwrap(), 0);
        let reset: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reset, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_store_skips_known_curve_and_finds_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let directory = TokenDirectory::new(path.clone());

        let entry = TokenDirectory::entry_for_launch("0xcurve", "Frog", "FROG", "0xabc::frog::FROG", "0xcreator");
        assert!(directory.store("abc123", entry.clone()).await.unwrap());
        assert!(!directory.store("zzz999", entry).await.unwrap());
        assert!(directory.is_duplicate("0xcurve").await);
        assert!(!directory.is_duplicate("0xother").await);

        let found = directory.find_by_type("0xabc::frog::FROG").await.unwrap();
        assert_eq!(found.creator.as_deref(), Some("0xcreator"));

        // Survives a reload
        let reloaded = TokenDirectory::new(path);
        let count = tokio_test::assert_ok!(reloaded.load().await);
        assert_eq!(count, 1);
        assert_eq!(TokenDirectory::new_listing_id().len(), 6);
    }
}
