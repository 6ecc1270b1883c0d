//! Solana JSON-RPC balance source
//!
//! Uses `getTokenAccountsByOwner` filtered by mint and sums the raw amount of
//! every token account the wallet holds for that mint. A wallet without a
//! token account holds zero.

use super::BalanceSource;
use crate::error::LookupError;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

/// JSON-RPC envelope
#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<TokenAccountsResult>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenAccountsResult {
    value: Vec<KeyedAccount>,
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    account: AccountBody,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
struct TokenAmount {
    /// Raw amount as a decimal string
    amount: String,
}

/// Balance source backed by a Solana RPC node
pub struct RpcBalanceSource {
    rpc_url: String,
    client: reqwest::Client,
}

impl RpcBalanceSource {
    /// Create a new RPC balance source
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
        })
    }

    fn validate_address(address: &str) -> Result<(), LookupError> {
        Pubkey::from_str(address)
            .map(|_| ())
            .map_err(|e| LookupError::InvalidAddress(format!("{}: {}", address, e)))
    }
}

/// Sum raw amounts out of a `getTokenAccountsByOwner` response body
fn sum_token_accounts(body: RpcResponse) -> Result<u64, LookupError> {
    if let Some(err) = body.error {
        return Err(LookupError::Transport(format!(
            "RPC error {}: {}",
            err.code, err.message
        )));
    }

    let result = body
        .result
        .ok_or_else(|| LookupError::Malformed("response has neither result nor error".to_string()))?;

    result.value.iter().try_fold(0u64, |acc, keyed| {
        let raw = &keyed.account.data.parsed.info.token_amount.amount;
        let amount = raw
            .parse::<u64>()
            .map_err(|e| LookupError::Malformed(format!("bad token amount {:?}: {}", raw, e)))?;
        acc.checked_add(amount)
            .ok_or_else(|| LookupError::Malformed("token amount overflow".to_string()))
    })
}

#[async_trait::async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn get_balance(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<u64, LookupError> {
        Self::validate_address(wallet_address)?;
        Self::validate_address(token_address)?;

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTokenAccountsByOwner",
            "params": [
                wallet_address,
                { "mint": token_address },
                { "encoding": "jsonParsed" }
            ],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("RPC request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(LookupError::Transport(format!(
                "RPC returned status {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(format!("Failed to parse RPC response: {}", e)))?;

        let balance = sum_token_accounts(body)?;

        tracing::trace!(
            wallet = wallet_address,
            token = token_address,
            raw_balance = balance,
            "Fetched token balance"
        );

        Ok(balance)
    }
}
