use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::retry::BackoffPolicy;
use crate::api::transport::Transport;
use crate::error::BotError;
use crate::sui::transaction::ProgrammableTransaction;

const DIGEST_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionEffects {
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionResponse {
    pub digest: String,
    pub effects: Option<ExecutionEffects>,
}

impl ExecutionResponse {
    pub fn is_success(&self) -> bool {
        self.effects
            .as_ref()
            .map(|e| e.status.status == "success")
            .unwrap_or(false)
    }

    pub fn failure_reason(&self) -> String {
        match &self.effects {
            Some(effects) => effects
                .status
                .error
                .clone()
                .unwrap_or_else(|| effects.status.status.clone()),
            None => "no effects returned".to_string(),
        }
    }

    #[cfg(test)]
    pub fn success(digest: &str) -> Self {
        Self {
            digest: digest.to_string(),
            effects: Some(ExecutionEffects {
                status: ExecutionStatus { status: "success".into(), error: None },
            }),
        }
    }

    #[cfg(test)]
    pub fn failure(digest: &str, error: &str) -> Self {
        Self {
            digest: digest.to_string(),
            effects: Some(ExecutionEffects {
                status: ExecutionStatus { status: "failure".into(), error: Some(error.into()) },
            }),
        }
    }
}

/// Holds the wallet keys and turns plans into executed transactions.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_and_execute(
        &self,
        sender: &str,
        plan: &ProgrammableTransaction,
    ) -> Result<ExecutionResponse, BotError>;
}

#[derive(Serialize)]
struct SignRequest<'a> {
    sender: &'a str,
    transaction: &'a ProgrammableTransaction,
}

/// HTTP signing service that keeps the private keys out of this process.
#[derive(Debug, Clone)]
pub struct SignerService {
    transport: Transport,
    url: String,
}

impl SignerService {
    pub fn new(transport: Transport, url: &str) -> Self {
        // Submissions are never replayed: a reset after send may already have executed
        let transport = transport.with_policy(BackoffPolicy::fixed(Duration::ZERO, 0));
        Self {
            transport,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl TransactionSigner for SignerService {
    async fn sign_and_execute(
        &self,
        sender: &str,
        plan: &ProgrammableTransaction,
    ) -> Result<ExecutionResponse, BotError> {
        let request = SignRequest { sender, transaction: plan };
        let response: ExecutionResponse = self
            .transport
            .post_json(&self.url, &request, &[])
            .await
            .map_err(|e| BotError::SignerError(e.to_string()))?;

        validate_digest(&response.digest)?;
        debug!("Signer executed {} for {}", response.digest, sender);
        Ok(response)
    }
}

/// A transaction digest is 32 bytes, base58 encoded.
pub fn validate_digest(digest: &str) -> Result<(), BotError> {
    match bs58::decode(digest).into_vec() {
        Ok(bytes) if bytes.len() == DIGEST_LEN => Ok(()),
        Ok(bytes) => {
            warn!("Signer returned a {}-byte digest: {}", bytes.len(), digest);
            Err(BotError::SignerError(format!("Malformed digest {}", digest)))
        }
        Err(e) => Err(BotError::SignerError(format!("Malformed digest {}: {}", digest, e))),
    }
}
