use serde::{Deserialize, Serialize};

use crate::error::TradeError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy { amount_sui: f64 },
    Sell { percentage: u8 },
}

/// Built per invocation by whatever front-end drives the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub curve_id: String,
    pub token_type: Option<String>, // Resolved from the curve when absent
    pub direction: TradeDirection,
}

impl TradeRequest {
    pub fn buy(curve_id: &str, amount_sui: f64) -> Self {
        Self {
            curve_id: curve_id.to_string(),
            token_type: None,
            direction: TradeDirection::Buy { amount_sui },
        }
    }

    pub fn sell(curve_id: &str, percentage: u8) -> Self {
        Self {
            curve_id: curve_id.to_string(),
            token_type: None,
            direction: TradeDirection::Sell { percentage },
        }
    }
}

/// Result of one wallet's leg of a trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub wallet_index: usize,
    pub success: bool,
    pub duration_ms: u64,
    pub tx_digest: Option<String>,
    pub error: Option<TradeError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSummary {
    pub token_type: String,
    pub outcomes: Vec<TransactionOutcome>,
    pub duration_ms: u64,
}

impl TradeSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// At least one wallet went through.
    pub fn is_success(&self) -> bool {
        self.success_count() > 0
    }
}
