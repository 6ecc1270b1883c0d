//! Fixed-precision decimal helpers
//!
//! All balance and percentage math goes through `rust_decimal` so that
//! threshold comparisons never see floating point drift. Results are truncated
//! (round toward zero) to [`PERCENT_SCALE`] fractional digits.

use crate::error::{TrackerError, TrackerResult};
use rust_decimal::prelude::*;

/// Fractional digits kept on computed percentages
pub const PERCENT_SCALE: u32 = 18;

/// Largest `decimals` value the decimal type can represent as a scale
pub const MAX_TOKEN_DECIMALS: u32 = 28;

/// Convert a raw integer token amount into human units (`raw / 10^decimals`)
///
/// The conversion is exact: the raw amount becomes the mantissa and
/// `decimals` the scale.
pub fn raw_to_human(raw: u64, decimals: u32) -> TrackerResult<Decimal> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(TrackerError::InvalidDecimals(decimals));
    }
    let mut value = Decimal::from(raw);
    value
        .set_scale(decimals)
        .map_err(|_| TrackerError::InvalidDecimals(decimals))?;
    Ok(value)
}

/// Sum human-unit balances, failing instead of wrapping on overflow
pub fn checked_sum<I>(values: I) -> TrackerResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| TrackerError::InvalidSupplyState("balance sum overflow".to_string()))
    })
}

/// `part / total * 100`, truncated to [`PERCENT_SCALE`] digits
///
/// A non-positive `total` has no meaningful percentage and is reported as
/// `InvalidSupplyState` rather than producing a corrupt value.
pub fn percentage_of(part: Decimal, total: Decimal) -> TrackerResult<Decimal> {
    if total <= Decimal::ZERO {
        return Err(TrackerError::InvalidSupplyState(format!(
            "total supply must be positive, got {}",
            total
        )));
    }

    // Multiply first: keeps small holdings from losing digits in the quotient.
    let scaled = part
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| TrackerError::InvalidSupplyState("percentage overflow".to_string()))?;
    let pct = scaled
        .checked_div(total)
        .ok_or_else(|| TrackerError::InvalidSupplyState("percentage overflow".to_string()))?;

    Ok(truncate(pct))
}

/// Round toward zero at [`PERCENT_SCALE`] and drop trailing zeros
pub fn truncate(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::ToZero)
        .normalize()
}

/// Absolute percentage-point distance between two observations
pub fn abs_delta(a: Decimal, b: Decimal) -> Decimal {
    (a - b).abs()
}
