pub mod token;
pub mod trade;

pub use token::{TokenDirectoryEntry, WatchedToken};
pub use trade::{TradeDirection, TradeRequest, TradeSummary, TransactionOutcome};

/// On-chain amounts travel as decimal strings; u128 keeps them exact.
pub mod decimal_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n as u128),
        }
    }
}
