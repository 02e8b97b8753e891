/*
 * Data models and error types for the route comparison service
 */

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::utils::is_decimal_amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub chain_id: u64,
    pub token_in: String,
    pub token_out: String,
    /// Human-scaled decimal string, never rounded on the way in.
    pub amount_in: String,
    pub slippage_bps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
}

impl RouteRequest {
    pub fn validate(&self) -> Result<()> {
        if self.token_in.trim().is_empty() {
            return Err(RouteError::InvalidRequest("tokenIn is empty".to_string()));
        }
        if self.token_out.trim().is_empty() {
            return Err(RouteError::InvalidRequest("tokenOut is empty".to_string()));
        }
        if !is_decimal_amount(&self.amount_in) {
            return Err(RouteError::InvalidRequest(format!(
                "amountIn must be a non-negative decimal, got {:?}",
                self.amount_in
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Lifi,
    Gluex,
}

impl ProviderTag {
    pub const ALL: [ProviderTag; 2] = [ProviderTag::Lifi, ProviderTag::Gluex];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Lifi => "lifi",
            ProviderTag::Gluex => "gluex",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedToken {
    pub address: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Display metadata for one token from a provider's token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHop {
    pub pool_id: String,
    pub token_in: String,
    pub token_out: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_bps: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bps: Option<u32>,
    #[serde(default)]
    pub breakdown: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedQuote {
    pub success: bool,
    pub provider: ProviderTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub expected_out: String,
    /// Lowest acceptable output after applying the request's slippage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_impact_bps: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<String>,
    pub hops: Vec<RouteHop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<FeeBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl NormalizedQuote {
    #[must_use]
    pub fn failure(provider: ProviderTag, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            provider,
            reason: Some(reason.into()),
            expected_out: "0".to_string(),
            min_out: None,
            price_impact_bps: None,
            gas_estimate: None,
            hops: Vec::new(),
            fees: None,
            raw: None,
        }
    }

    /// Re-shapes a failed quote so it carries zeroed fields and a reason.
    #[must_use]
    pub fn into_consistent(self) -> Self {
        if self.success {
            return self;
        }
        let reason = self
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "provider returned no reason".to_string());
        Self {
            raw: self.raw,
            ..Self::failure(self.provider, reason)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTiming {
    pub provider: ProviderTag,
    pub elapsed_ms: u64,
}

/// On the wire each quote sits under its provider tag and latencies under
/// `metrics.<tag>Ms`: `{chainId, gluex, lifi, metrics: {gluexMs, lifiMs}, fetchedAt}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareResult {
    pub chain_id: u64,
    pub quotes: Vec<NormalizedQuote>,
    pub timings: Vec<ProviderTiming>,
    pub fetched_at: DateTime<Utc>,
}

impl CompareResult {
    #[must_use]
    pub fn quote(&self, provider: ProviderTag) -> Option<&NormalizedQuote> {
        self.quotes.iter().find(|q| q.provider == provider)
    }

    #[must_use]
    pub fn elapsed_ms(&self, provider: ProviderTag) -> Option<u64> {
        self.timings
            .iter()
            .find(|t| t.provider == provider)
            .map(|t| t.elapsed_ms)
    }

    #[must_use]
    pub fn any_success(&self) -> bool {
        self.quotes.iter().any(|q| q.success)
    }
}

impl Serialize for CompareResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let latencies: BTreeMap<String, u64> = self
            .timings
            .iter()
            .map(|t| (format!("{}Ms", t.provider), t.elapsed_ms))
            .collect();

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("chainId", &self.chain_id)?;
        for quote in &self.quotes {
            map.serialize_entry(quote.provider.as_str(), quote)?;
        }
        map.serialize_entry("metrics", &latencies)?;
        map.serialize_entry("fetchedAt", &self.fetched_at)?;
        map.end()
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unsupported chain {0}")]
    UnsupportedChain(u64),

    #[error("invalid token identifier: {0}")]
    InvalidTokenIdentifier(String),

    #[error("token address not found on selected chain: {0}")]
    TokenNotFound(String),

    #[error("invalid token contract: {0}")]
    InvalidTokenContract(String),

    /// A resolution failure already reported once for this request.
    #[error("{0}")]
    TokenResolution(String),

    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("unauthorized")]
    ProviderUnauthorized,

    #[error("rate limited")]
    ProviderRateLimited,

    #[error("invalid request")]
    ProviderInvalidRequest,

    #[error("route not found")]
    ProviderNotFound,

    #[error("server error (HTTP {0})")]
    ProviderServerError(u16),

    #[error("{0}")]
    ProviderRejected(String),

    #[error("unexpected provider response: {0}")]
    ProviderResponse(String),

    #[error("provider not configured: {0} is not set")]
    ProviderNotConfigured(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("too many requests")]
    RateLimited,

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: &str) -> RouteRequest {
        RouteRequest {
            chain_id: 1,
            token_in: "ETH".to_string(),
            token_out: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
            amount_in: amount.to_string(),
            slippage_bps: 50,
            from_address: None,
            to_address: None,
        }
    }

    #[test]
    fn validate_accepts_plain_decimals() {
        assert!(request("1").validate().is_ok());
        assert!(request("0.000001").validate().is_ok());
        assert!(request("1000").validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_or_garbage_amounts() {
        assert!(matches!(request("-1").validate(), Err(RouteError::InvalidRequest(_))));
        assert!(matches!(request("1e18").validate(), Err(RouteError::InvalidRequest(_))));
        assert!(matches!(request("").validate(), Err(RouteError::InvalidRequest(_))));
        assert!(matches!(request("1.2.3").validate(), Err(RouteError::InvalidRequest(_))));
    }

    #[test]
    fn failure_quote_is_zeroed() {
        let quote = NormalizedQuote::failure(ProviderTag::Gluex, "boom");
        assert!(!quote.success);
        assert_eq!(quote.expected_out, "0");
        assert!(quote.hops.is_empty());
        assert_eq!(quote.reason.as_deref(), Some("boom"));
    }

    #[test]
    fn into_consistent_scrubs_failed_quotes() {
        let mut quote = NormalizedQuote::failure(ProviderTag::Lifi, "");
        quote.expected_out = "12".to_string();
        quote.hops.push(RouteHop {
            pool_id: "p".to_string(),
            token_in: "a".to_string(),
            token_out: "b".to_string(),
            fee_bps: None,
        });
        let quote = quote.into_consistent();
        assert_eq!(quote.expected_out, "0");
        assert!(quote.hops.is_empty());
        assert_eq!(quote.reason.as_deref(), Some("provider returned no reason"));
    }

    #[test]
    fn quote_serializes_with_camel_case_and_lowercase_tag() {
        let quote = NormalizedQuote::failure(ProviderTag::Lifi, "route not found");
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["provider"], "lifi");
        assert_eq!(json["expectedOut"], "0");
        assert_eq!(json["hops"], serde_json::json!([]));
        assert!(json.get("priceImpactBps").is_none());
    }

    #[test]
    fn compare_result_is_keyed_by_provider() {
        let result = CompareResult {
            chain_id: 8453,
            quotes: vec![
                NormalizedQuote::failure(ProviderTag::Gluex, "route not found"),
                NormalizedQuote {
                    success: true,
                    reason: None,
                    expected_out: "2490".to_string(),
                    ..NormalizedQuote::failure(ProviderTag::Lifi, "")
                },
            ],
            timings: vec![
                ProviderTiming { provider: ProviderTag::Gluex, elapsed_ms: 120 },
                ProviderTiming { provider: ProviderTag::Lifi, elapsed_ms: 340 },
            ],
            fetched_at: Utc::now(),
        };

        let json = serde_json::to_value(&result).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["chainId", "fetchedAt", "gluex", "lifi", "metrics"]);
        assert_eq!(json["chainId"], 8453);
        assert_eq!(json["gluex"]["reason"], "route not found");
        assert_eq!(json["lifi"]["expectedOut"], "2490");
        assert_eq!(json["metrics"], serde_json::json!({ "gluexMs": 120, "lifiMs": 340 }));
    }

    #[test]
    fn provider_error_reasons_read_as_plain_words() {
        assert_eq!(RouteError::ProviderUnauthorized.to_string(), "unauthorized");
        assert_eq!(RouteError::ProviderRateLimited.to_string(), "rate limited");
        assert_eq!(RouteError::ProviderInvalidRequest.to_string(), "invalid request");
        assert_eq!(RouteError::ProviderNotFound.to_string(), "route not found");
        assert!(RouteError::ProviderServerError(502)
            .to_string()
            .starts_with("server error"));
        assert!(RouteError::UnsupportedChain(56)
            .to_string()
            .starts_with("unsupported chain"));
    }
}
