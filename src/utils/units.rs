/*
 * Exact conversion between human decimal amounts and on-chain base units
 */

use num_bigint::BigUint;
use num_traits::Zero;
use std::str::FromStr;

const BPS_DENOMINATOR: u32 = 10_000;

/// Scales a decimal string by `10^decimals` using digit-string arithmetic only.
///
/// Fractional digits beyond `decimals` are dropped, not rounded:
/// `to_base_units("1.2345678", 6) == "1234567"`.
#[must_use]
pub fn to_base_units(amount: &str, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    let kept = fraction.chars().take(decimals).count();
    digits.extend(fraction.chars().take(decimals));
    digits.extend(std::iter::repeat('0').take(decimals - kept));

    strip_leading_zeros(&digits).to_string()
}

/// Inverse of [`to_base_units`], trimming trailing fractional zeros.
#[must_use]
pub fn from_base_units(amount: &str, decimals: u8) -> String {
    let digits = strip_leading_zeros(amount);
    if decimals == 0 {
        return digits.to_string();
    }

    let decimals = usize::from(decimals);
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Accepts digits with at most one decimal point and at least one digit.
#[must_use]
pub fn is_decimal_amount(amount: &str) -> bool {
    let mut seen_point = false;
    let mut seen_digit = false;
    for c in amount.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Minimum acceptable output for a base-unit amount, floored.
/// Returns `None` when `base_amount` is not a digit string.
#[must_use]
pub fn apply_slippage(base_amount: &str, slippage_bps: u32) -> Option<String> {
    let amount = BigUint::from_str(base_amount).ok()?;
    if amount.is_zero() {
        return Some("0".to_string());
    }
    let kept = BPS_DENOMINATOR - slippage_bps.min(BPS_DENOMINATOR);
    let min_out = amount * BigUint::from(kept) / BigUint::from(BPS_DENOMINATOR);
    Some(min_out.to_string())
}

fn strip_leading_zeros(digits: &str) -> &str {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}
