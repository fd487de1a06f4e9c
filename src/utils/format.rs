use anyhow::{Context, Result, anyhow};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Convert a raw integer amount in base units to whole units.
///
/// Only the scale changes, so the conversion is exact:
/// `5000000000` at precision 9 is `5.000000000`.
pub fn scale_amount(raw: Decimal, precision: u32) -> Result<Decimal> {
    let mut value = raw;
    value
        .set_scale(raw.scale() + precision)
        .map_err(|e| anyhow!("Cannot scale {} by precision {}: {}", raw, precision, e))?;
    Ok(value)
}

/// Parse a base-unit amount as it appears in contract arguments and results.
pub fn parse_amount(raw: &str, precision: u32) -> Result<Decimal> {
    let raw = raw.trim().trim_matches('"');
    let value =
        Decimal::from_str(raw).with_context(|| format!("Invalid amount: {:?}", raw))?;
    if value.is_sign_negative() {
        anyhow::bail!("Negative amount: {}", raw);
    }
    scale_amount(value, precision)
}

/// Drop digits past `dp` decimals without rounding, then strip trailing zeros.
pub fn truncate_amount(value: Decimal, dp: u32) -> Decimal {
    value
        .round_dp_with_strategy(dp, RoundingStrategy::ToZero)
        .normalize()
}

/// `amount * price`, truncated to `dp` decimals
pub fn usd_value(amount: Decimal, price: Decimal, dp: u32) -> Decimal {
    truncate_amount(amount * price, dp)
}
