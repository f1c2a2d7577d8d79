//! Cross-currency normalization
//!
//! Converts amounts between a native currency and the context's reporting
//! currency using the loaded FX table. Financial close often lags FX
//! publication, so a missing rate for the exact period falls back to the
//! nearest prior period's rate.

use rust_decimal::Decimal;

use crate::context::DataContext;
use crate::error::{CopilotError, Result};
use crate::models::Period;

/// Convert `amount` from `currency` into the reporting currency.
///
/// Fails with [`CopilotError::MissingRate`] when no rate exists at or
/// before `period`; silently returning zero here would corrupt every
/// aggregate downstream.
pub fn to_reporting(
    ctx: &DataContext,
    amount: Decimal,
    currency: &str,
    period: Period,
) -> Result<Decimal> {
    if currency == ctx.reporting_currency() {
        return Ok(amount);
    }
    let (_, rate) = lookup(ctx, currency, period)?;
    Ok(amount * rate)
}

/// Restate an amount already in the reporting currency into `currency`,
/// using the same exact-then-prior lookup rule.
pub fn from_reporting(
    ctx: &DataContext,
    amount: Decimal,
    currency: &str,
    period: Period,
) -> Result<Decimal> {
    if currency == ctx.reporting_currency() {
        return Ok(amount);
    }
    let (_, rate) = lookup(ctx, currency, period)?;
    Ok(amount / rate)
}

fn lookup(ctx: &DataContext, currency: &str, period: Period) -> Result<(Period, Decimal)> {
    ctx.rate_at_or_before(currency, period)
        .ok_or_else(|| CopilotError::MissingRate {
            currency: currency.to_string(),
            period,
        })
}
