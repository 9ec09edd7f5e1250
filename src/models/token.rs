use serde::{Deserialize, Serialize};

use crate::models::decimal_string;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

/// A held position watched for its creator selling. Keyed by asset type in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedToken {
    pub creator: String,
    #[serde(with = "decimal_string")]
    pub balance: u128,
    pub curve_id: String,
    pub data: TokenData,
}

/// Reference data for a launched token, written when the launch is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDirectoryEntry {
    pub curve_id: String,
    pub timestamp: i64, // Unix millis of discovery
    pub name: String,
    pub ticker: String,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub creator: Option<String>, // Absent in files written by older versions
}

impl TokenDirectoryEntry {
    pub fn token_data(&self) -> TokenData {
        TokenData {
            name: self.name.clone(),
            token_type: self.token_type.clone(),
            ticker: Some(self.ticker.clone()),
        }
    }
}
