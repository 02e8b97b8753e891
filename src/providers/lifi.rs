/*
 * LI.FI quote adapter
 */

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use crate::config::chains::chain_info;
use crate::config::ProviderConfig;
use crate::models::{NormalizedQuote, ProviderTag, Result, RouteError, RouteRequest, TokenMeta};
use crate::providers::extract::{
    normalize_quote, ExtractionTable, FeeRule, GasRule, HopRule, ImpactRule,
};
use crate::providers::http::{build_client, read_json, transport_error};
use crate::providers::{RouteProvider, TokenDirectory};
use crate::tokens::{RequestTokens, NATIVE_TOKEN_ADDRESS};
use crate::utils::to_base_units;

const QUOTE_PATH: &str = "/v1/quote";
const TOKENS_PATH: &str = "/v1/tokens";

const LIFI_RULES: ExtractionTable = ExtractionTable {
    amount: &[&["estimate", "toAmount"], &["toAmount"]],
    hops: &[
        HopRule::Legs {
            list: &["includedSteps"],
            label: &[&["toolDetails", "name"], &["tool"]],
            token_in: &[&["action", "fromToken", "address"]],
            token_out: &[&["action", "toToken", "address"]],
            fee_bps: None,
        },
        HopRule::TokenPath { list: &["path"] },
        HopRule::WholeRoute,
    ],
    gas: &[
        GasRule::Sum { list: &["estimate", "gasCosts"], field: &["estimate"] },
        GasRule::Field(&["gasEstimate"]),
    ],
    impact: &[
        ImpactRule::UsdDelta {
            from: &["estimate", "fromAmountUSD"],
            to: &["estimate", "toAmountUSD"],
        },
        ImpactRule::Percent(&["priceImpact"]),
    ],
    fees: &[FeeRule::Fractions {
        list: &["estimate", "feeCosts"],
        name: &["name"],
        fraction: &["percentage"],
    }],
};

pub struct LifiClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl LifiClient {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// LI.FI addresses chains by their numeric id.
    fn chain_key(chain_id: u64) -> Option<&'static str> {
        match chain_id {
            1 => Some("1"),
            10 => Some("10"),
            8453 => Some("8453"),
            42161 => Some("42161"),
            999 => Some("999"),
            _ => None,
        }
    }

    fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(RouteError::ProviderNotConfigured("LIFI_BASE_URL"))
    }

    fn get(&self, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}{path}", self.base_url()?.trim_end_matches('/'));
        let mut call = self.client.get(&url);
        if let Some(key) = &self.api_key {
            call = call.header("x-lifi-api-key", key);
        }
        Ok(call)
    }

    async fn try_quote(&self, request: &RouteRequest, tokens: &RequestTokens) -> Result<NormalizedQuote> {
        let call = self.get(QUOTE_PATH)?;
        let chain = Self::chain_key(request.chain_id)
            .ok_or(RouteError::UnsupportedChain(request.chain_id))?;

        let (token_in, token_out) = tokens.pair().await?;

        let from_amount = to_base_units(&request.amount_in, token_in.decimals);
        let slippage = Decimal::new(i64::from(request.slippage_bps), 4).normalize();

        let mut query = vec![
            ("fromChain", chain.to_string()),
            ("toChain", chain.to_string()),
            ("fromToken", token_in.address.clone()),
            ("toToken", token_out.address.clone()),
            ("fromAmount", from_amount),
            ("slippage", slippage.to_string()),
        ];
        if let Some(from) = &request.from_address {
            query.push(("fromAddress", from.clone()));
        }
        if let Some(to) = &request.to_address {
            query.push(("toAddress", to.clone()));
        }

        debug!(chain, "requesting LI.FI quote");
        let response = call.query(&query).send().await.map_err(transport_error)?;
        let raw = read_json(response).await?;

        normalize_quote(ProviderTag::Lifi, &LIFI_RULES, request, &token_in, &token_out, raw)
    }
}

#[async_trait]
impl RouteProvider for LifiClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Lifi
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn quote(&self, request: &RouteRequest, tokens: &RequestTokens) -> NormalizedQuote {
        match self.try_quote(request, tokens).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(provider = "lifi", "quote failed: {e}");
                NormalizedQuote::failure(ProviderTag::Lifi, e.to_string())
            }
        }
    }
}

#[async_trait]
impl TokenDirectory for LifiClient {
    /// An unsuccessful token list answer yields an empty directory.
    async fn token_meta(&self, chain_id: u64) -> Result<BTreeMap<String, TokenMeta>> {
        let response = self
            .get(TOKENS_PATH)?
            .query(&[("chains", chain_id.to_string())])
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            debug!(chain_id, status = %response.status(), "LI.FI token list unavailable");
            return Ok(BTreeMap::new());
        }
        let raw = read_json(response).await?;
        Ok(index_tokens(&raw, chain_id))
    }
}

fn index_tokens(raw: &Value, chain_id: u64) -> BTreeMap<String, TokenMeta> {
    let text = |item: &Value, key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

    let mut directory = BTreeMap::new();
    let tokens = raw
        .pointer(&format!("/tokens/{chain_id}"))
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    for item in tokens.iter().filter(|t| t.is_object()) {
        let address = text(item, "address").map(|a| a.to_lowercase()).filter(|a| !a.is_empty());
        let symbol = text(item, "symbol");
        let meta = TokenMeta {
            symbol: symbol.clone(),
            logo_uri: text(item, "logoURI").or_else(|| text(item, "logoUrl")),
            address: address.clone(),
        };
        if let Some(address) = address {
            directory.insert(address, meta.clone());
        }
        if let Some(symbol) = symbol {
            directory.insert(symbol.to_lowercase(), meta.clone());
            directory.insert(symbol, meta);
        }
    }

    let native_symbol = chain_info(chain_id).map_or("ETH", |c| c.native_symbol);
    directory.insert(
        NATIVE_TOKEN_ADDRESS.to_string(),
        TokenMeta { symbol: Some(native_symbol.to_string()), logo_uri: None, address: None },
    );
    directory
}
