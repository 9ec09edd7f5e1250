//! Flat key-value settings file shared with the operator front-end.
//!
//! Flags are stored as the strings `"true"` / `"false"`. A native JSON `true` is
//! accepted as well so hand-edited files behave the way they read.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

pub const AUTOBUY: &str = "AUTOBUY";

#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
}

impl Settings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_all(&self) -> Map<String, Value> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Settings file {:?} not readable ({}), using no settings", self.path, e);
                return Map::new();
            }
        };
        match serde_json::from_str::<Map<String, Value>>(&data) {
            Ok(map) => map,
            Err(e) => {
                warn!("Settings file {:?} is not a JSON object: {}", self.path, e);
                Map::new()
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<Value> {
        self.read_all().await.remove(name)
    }

    /// Case-sensitive: only `"true"` (or JSON `true`) enables a flag.
    pub async fn flag(&self, name: &str) -> bool {
        match self.get(name).await {
            Some(Value::String(s)) => s == "true",
            Some(Value::Bool(b)) => b,
            _ => false,
        }
    }

    pub async fn set(&self, name: &str, value: Value) -> Result<()> {
        let mut settings = self.read_all().await;
        settings.insert(name.to_string(), value);

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await.context("Failed to create settings directory")?;
            }
        }
        let data = serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
        fs::write(&self.path, data)
            .await
            .context(format!("Failed to write settings file: {:?}", self.path))?;
        Ok(())
    }
}
