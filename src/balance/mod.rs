//! Balance lookup
//!
//! The tracker engine only needs "wallet + token -> raw integer balance".
//! [`RpcBalanceSource`] answers that from a Solana JSON-RPC endpoint.

pub mod rpc;

pub use rpc::RpcBalanceSource;

use crate::error::LookupError;

/// Raw (undecimalized) token balance source
#[async_trait::async_trait]
pub trait BalanceSource: Send + Sync {
    /// Raw integer balance of `token_address` held by `wallet_address`
    async fn get_balance(&self, wallet_address: &str, token_address: &str)
        -> Result<u64, LookupError>;
}
