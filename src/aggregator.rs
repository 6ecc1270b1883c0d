//! Balance aggregation
//!
//! Computes the share of total supply jointly held by a wallet set:
//! every wallet is looked up concurrently (each lookup behind the retry
//! executor), raw balances are scaled by `10^decimals`, summed and divided by
//! the total supply.
//!
//! A wallet whose lookup still fails after retries contributes zero; only when
//! every wallet fails does the aggregation itself fail.

use crate::balance::BalanceSource;
use crate::decimal::{self, MAX_TOKEN_DECIMALS};
use crate::error::{LookupError, TrackerError, TrackerResult};
use crate::retry::{RetryExhausted, RetryPolicy};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of one aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Share of total supply, in percent
    pub percentage: Decimal,
    /// Sum of the successfully fetched balances, in human units
    pub total_balance: Decimal,
    /// Wallets whose lookup failed and counted as zero
    pub failed_wallets: Vec<String>,
}

impl Aggregation {
    fn empty() -> Self {
        Self {
            percentage: Decimal::ZERO,
            total_balance: Decimal::ZERO,
            failed_wallets: Vec::new(),
        }
    }
}

/// Sums wallet balances into a supply percentage
pub struct BalanceAggregator {
    source: Arc<dyn BalanceSource>,
    retry: RetryPolicy,
}

impl BalanceAggregator {
    pub fn new(source: Arc<dyn BalanceSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    async fn fetch(&self, wallet: &str, token: &str) -> Result<u64, RetryExhausted<LookupError>> {
        let source = Arc::clone(&self.source);
        let wallet = wallet.to_string();
        let token = token.to_string();

        self.retry
            .execute(move || {
                let source = Arc::clone(&source);
                let wallet = wallet.clone();
                let token = token.clone();
                async move { source.get_balance(&wallet, &token).await }
            })
            .await
    }

    /// Percentage of `total_supply` held by `wallets`
    pub async fn aggregate(
        &self,
        wallets: &[String],
        token_address: &str,
        total_supply: Decimal,
        decimals: u32,
    ) -> TrackerResult<Aggregation> {
        if wallets.is_empty() {
            tracing::warn!(
                token = token_address,
                "No wallets to aggregate, reporting 0%"
            );
            return Ok(Aggregation::empty());
        }

        if decimals > MAX_TOKEN_DECIMALS {
            return Err(TrackerError::InvalidDecimals(decimals));
        }

        let lookups = wallets.iter().map(|wallet| async move {
            let result = self.fetch(wallet, token_address).await;
            (wallet, result)
        });
        let results = join_all(lookups).await;

        let mut balances = Vec::with_capacity(results.len());
        let mut failed_wallets = Vec::new();
        let mut last_error = None;

        for (wallet, result) in results {
            match result {
                Ok(raw) => balances.push(decimal::raw_to_human(raw, decimals)?),
                Err(e) => {
                    tracing::warn!(
                        wallet = %wallet,
                        token = token_address,
                        attempts = e.attempts,
                        error = %e.last_error,
                        "Balance lookup failed, counting wallet as zero"
                    );
                    failed_wallets.push(wallet.clone());
                    last_error = Some(e);
                }
            }
        }

        if balances.is_empty() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        let total_balance = decimal::checked_sum(balances)?;
        let percentage = decimal::percentage_of(total_balance, total_supply)?;

        tracing::debug!(
            token = token_address,
            wallets = wallets.len(),
            failed = failed_wallets.len(),
            total_balance = %total_balance,
            percentage = %percentage,
            "Aggregated wallet balances"
        );

        Ok(Aggregation {
            percentage,
            total_balance,
            failed_wallets,
        })
    }
}
