use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Signer error: {0}")]
    SignerError(String),
}

/// Failures surfaced by the HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reset, refused, timed out: the request never produced a response.
    #[error("Connection error for {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    /// Only connection-level failures are worth retrying; status codes go straight to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub(crate) fn classify(url: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status { url: url.to_string(), status };
        }
        if err.is_decode() {
            return Self::Decode { url: url.to_string(), source: err };
        }
        if err.is_builder() {
            return Self::Build(err.to_string());
        }
        Self::Connection { url: url.to_string(), source: err }
    }
}

#[derive(Debug, Error)]
pub enum GraphQlError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("GraphQL returned errors: {0}")]
    Query(String),

    #[error("GraphQL response missing field: {0}")]
    MissingField(&'static str),

    #[error("Failed to decode GraphQL payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl GraphQlError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_retryable())
    }
}

/// Failure taxonomy of the trade executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Could not resolve asset type for curve {0}")]
    AssetTypeUnresolved(String),

    #[error("Wallet owns no coins of {0}")]
    NoCoinsOwned(String),

    #[error("Coin merge failed: {0}")]
    MergeFailed(String),

    #[error("Transaction rejected: {0}")]
    SubmissionRejected(String),

    #[error("Chain query failed: {0}")]
    QueryFailed(String),

    #[error("Buy amount must be at least 0.01 SUI, got {0}")]
    InvalidAmount(String),

    #[error("Sell percentage must be in (0, 100], got {0}")]
    InvalidPercentage(u8),

    #[error("No wallets configured")]
    NoWallets,
}
