/*
 * Rule tables turning provider-specific JSON into normalized quotes
 */

use crate::models::{
    FeeBreakdown, NormalizedQuote, ProviderTag, ResolvedToken, Result, RouteError, RouteHop,
    RouteRequest,
};
use crate::utils::{apply_slippage, from_base_units, to_base_units};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Object keys (or array indices) from the response root.
pub type JsonPath = &'static [&'static str];

const BPS: i64 = 10_000;

/// How to build the hop list; the first rule yielding a contiguous,
/// non-empty path wins.
#[derive(Debug, Clone, Copy)]
pub enum HopRule {
    /// Array of leg objects, each field tried against several candidate paths.
    Legs {
        list: JsonPath,
        label: &'static [JsonPath],
        token_in: &'static [JsonPath],
        token_out: &'static [JsonPath],
        fee_bps: Option<JsonPath>,
    },
    /// Flat array of token addresses, consecutive pairs become hops.
    TokenPath { list: JsonPath },
    /// One hop covering the whole route.
    WholeRoute,
}

#[derive(Debug, Clone, Copy)]
pub enum GasRule {
    Field(JsonPath),
    /// Sum of `field` over every element of `list`.
    Sum { list: JsonPath, field: JsonPath },
}

#[derive(Debug, Clone, Copy)]
pub enum ImpactRule {
    /// Price impact quoted in percent (`0.25` is 25 bps).
    Percent(JsonPath),
    /// Relative loss between the USD values of input and output.
    UsdDelta { from: JsonPath, to: JsonPath },
}

#[derive(Debug, Clone, Copy)]
pub enum FeeRule {
    /// Array of fee objects carrying a name and a fraction (`0.0025` is 25 bps).
    Fractions {
        list: JsonPath,
        name: JsonPath,
        fraction: JsonPath,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionTable {
    pub amount: &'static [JsonPath],
    pub hops: &'static [HopRule],
    pub gas: &'static [GasRule],
    pub impact: &'static [ImpactRule],
    pub fees: &'static [FeeRule],
}

/// Builds a successful quote from a provider payload.
pub fn normalize_quote(
    provider: ProviderTag,
    table: &ExtractionTable,
    request: &RouteRequest,
    token_in: &ResolvedToken,
    token_out: &ResolvedToken,
    raw: Value,
) -> Result<NormalizedQuote> {
    let amount = table
        .amount
        .iter()
        .find_map(|path| lookup(&raw, path).and_then(as_text))
        .ok_or_else(|| RouteError::ProviderResponse("no output amount in response".to_string()))?;

    // Amounts carrying a decimal point are already human-scaled.
    let (expected_out, base_out) = if amount.contains('.') {
        (amount.clone(), to_base_units(&amount, token_out.decimals))
    } else if amount.chars().all(|c| c.is_ascii_digit()) {
        (from_base_units(&amount, token_out.decimals), amount.clone())
    } else {
        return Err(RouteError::ProviderResponse(format!(
            "output amount {amount:?} is not a number"
        )));
    };

    let min_out = apply_slippage(&base_out, request.slippage_bps)
        .map(|min| from_base_units(&min, token_out.decimals));

    Ok(NormalizedQuote {
        success: true,
        provider,
        reason: None,
        expected_out,
        min_out,
        price_impact_bps: table.impact.iter().find_map(|rule| extract_impact(rule, &raw)),
        gas_estimate: table.gas.iter().find_map(|rule| extract_gas(rule, &raw)),
        hops: extract_hops(table.hops, &raw, provider, token_in, token_out),
        fees: table.fees.iter().find_map(|rule| extract_fees(rule, &raw)),
        raw: Some(raw),
    })
}

#[must_use]
pub fn hops_are_contiguous(hops: &[RouteHop]) -> bool {
    hops.windows(2)
        .all(|pair| pair[0].token_out.eq_ignore_ascii_case(&pair[1].token_in))
}

fn extract_hops(
    rules: &[HopRule],
    raw: &Value,
    provider: ProviderTag,
    token_in: &ResolvedToken,
    token_out: &ResolvedToken,
) -> Vec<RouteHop> {
    rules
        .iter()
        .find_map(|rule| {
            let hops = apply_hop_rule(rule, raw, provider, token_in, token_out);
            (!hops.is_empty() && hops_are_contiguous(&hops)).then_some(hops)
        })
        .unwrap_or_else(|| vec![whole_route_hop(provider, token_in, token_out)])
}

fn apply_hop_rule(
    rule: &HopRule,
    raw: &Value,
    provider: ProviderTag,
    token_in: &ResolvedToken,
    token_out: &ResolvedToken,
) -> Vec<RouteHop> {
    match rule {
        HopRule::Legs {
            list,
            label,
            token_in: leg_in,
            token_out: leg_out,
            fee_bps,
        } => {
            let Some(legs) = lookup(raw, list).and_then(Value::as_array) else {
                return Vec::new();
            };
            let mut hops = Vec::with_capacity(legs.len());
            for (i, leg) in legs.iter().enumerate() {
                let (Some(hop_in), Some(hop_out)) = (first_text(leg, leg_in), first_text(leg, leg_out)) else {
                    return Vec::new();
                };
                hops.push(RouteHop {
                    pool_id: first_text(leg, label).unwrap_or_else(|| format!("{provider}-leg-{i}")),
                    token_in: hop_in.to_lowercase(),
                    token_out: hop_out.to_lowercase(),
                    fee_bps: fee_bps
                        .and_then(|path| lookup(leg, path))
                        .and_then(as_decimal)
                        .and_then(|d| d.round().to_u32()),
                });
            }
            hops
        }
        HopRule::TokenPath { list } => {
            let Some(path) = lookup(raw, list).and_then(Value::as_array) else {
                return Vec::new();
            };
            let tokens: Vec<String> = path.iter().filter_map(as_text).map(|t| t.to_lowercase()).collect();
            if tokens.len() != path.len() {
                return Vec::new();
            }
            tokens
                .windows(2)
                .enumerate()
                .map(|(i, pair)| RouteHop {
                    pool_id: format!("{provider}-hop-{i}"),
                    token_in: pair[0].clone(),
                    token_out: pair[1].clone(),
                    fee_bps: None,
                })
                .collect()
        }
        HopRule::WholeRoute => vec![whole_route_hop(provider, token_in, token_out)],
    }
}

fn whole_route_hop(provider: ProviderTag, token_in: &ResolvedToken, token_out: &ResolvedToken) -> RouteHop {
    RouteHop {
        pool_id: format!("{provider}-route"),
        token_in: token_in.address.clone(),
        token_out: token_out.address.clone(),
        fee_bps: None,
    }
}

fn extract_gas(rule: &GasRule, raw: &Value) -> Option<String> {
    match rule {
        GasRule::Field(path) => lookup(raw, path).and_then(as_text),
        GasRule::Sum { list, field } => {
            let items = lookup(raw, list)?.as_array()?;
            let mut total = Decimal::ZERO;
            let mut seen = false;
            for item in items {
                if let Some(value) = lookup(item, field).and_then(as_decimal) {
                    total = total.checked_add(value)?;
                    seen = true;
                }
            }
            seen.then(|| total.normalize().to_string())
        }
    }
}

fn extract_impact(rule: &ImpactRule, raw: &Value) -> Option<i32> {
    let bps = match rule {
        ImpactRule::Percent(path) => lookup(raw, path).and_then(as_decimal)?.checked_mul(Decimal::from(100))?,
        ImpactRule::UsdDelta { from, to } => {
            let from_usd = lookup(raw, from).and_then(as_decimal)?;
            let to_usd = lookup(raw, to).and_then(as_decimal)?;
            if from_usd <= Decimal::ZERO {
                return None;
            }
            (from_usd - to_usd).checked_div(from_usd)?.checked_mul(Decimal::from(BPS))?
        }
    };
    bps.round().to_i32()
}

fn extract_fees(rule: &FeeRule, raw: &Value) -> Option<FeeBreakdown> {
    let FeeRule::Fractions { list, name, fraction } = rule;
    let items = lookup(raw, list)?.as_array()?;
    let mut breakdown = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        let Some(bps) = lookup(item, fraction)
            .and_then(as_decimal)
            .and_then(|f| f.checked_mul(Decimal::from(BPS)))
            .and_then(|d| d.round().to_u32())
        else {
            continue;
        };
        let label = lookup(item, name).and_then(as_text).unwrap_or_else(|| format!("fee-{i}"));
        let slot = breakdown.entry(label).or_insert(0u32);
        *slot = slot.saturating_add(bps);
    }
    if breakdown.is_empty() {
        return None;
    }
    // No total when the fees cannot be summed in u32.
    let total_bps = breakdown.values().try_fold(0u32, |acc, bps| acc.checked_add(*bps));
    Some(FeeBreakdown { total_bps, breakdown })
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn first_text(node: &Value, candidates: &[JsonPath]) -> Option<String> {
    candidates.iter().find_map(|path| lookup(node, path).and_then(as_text))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = as_text(value)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
