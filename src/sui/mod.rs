pub mod client;
pub mod events;
#[cfg(test)]
pub mod mock;
pub mod query;
pub mod signer;
pub mod transaction;
pub mod wallet;

pub use client::SuiRpcClient;
pub use query::ChainQuery;
pub use signer::SignerService;
pub use wallet::WalletSet;
