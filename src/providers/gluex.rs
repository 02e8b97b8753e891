/*
 * GlueX router quote adapter
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use crate::config::ProviderConfig;
use crate::models::{NormalizedQuote, ProviderTag, Result, RouteError, RouteRequest};
use crate::providers::extract::{normalize_quote, ExtractionTable, GasRule, HopRule, ImpactRule};
use crate::providers::http::{build_client, read_json, transport_error};
use crate::providers::RouteProvider;
use crate::tokens::RequestTokens;
use crate::utils::to_base_units;

const QUOTE_PATH: &str = "/v1/quote";

const GLUEX_LEG_LABEL: &[&[&str]] = &[&["name"], &["pool"], &["module"]];
const GLUEX_LEG_IN: &[&[&str]] = &[&["inputToken"], &["tokenIn"]];
const GLUEX_LEG_OUT: &[&[&str]] = &[&["outputToken"], &["tokenOut"]];

const GLUEX_RULES: ExtractionTable = ExtractionTable {
    amount: &[
        &["result", "outputAmount"],
        &["result", "effectiveOutputAmount"],
        &["outputAmount"],
        &["toAmount"],
        &["amountOut"],
    ],
    hops: &[
        HopRule::Legs {
            list: &["result", "route"],
            label: GLUEX_LEG_LABEL,
            token_in: GLUEX_LEG_IN,
            token_out: GLUEX_LEG_OUT,
            fee_bps: Some(&["feeBps"]),
        },
        HopRule::Legs {
            list: &["route"],
            label: GLUEX_LEG_LABEL,
            token_in: GLUEX_LEG_IN,
            token_out: GLUEX_LEG_OUT,
            fee_bps: Some(&["feeBps"]),
        },
        HopRule::TokenPath { list: &["result", "path"] },
        HopRule::TokenPath { list: &["path"] },
        HopRule::WholeRoute,
    ],
    gas: &[
        GasRule::Field(&["result", "computationUnits"]),
        GasRule::Field(&["result", "gasEstimate"]),
        GasRule::Field(&["gasEstimate"]),
    ],
    impact: &[
        ImpactRule::Percent(&["result", "priceImpact"]),
        ImpactRule::Percent(&["priceImpact"]),
    ],
    fees: &[],
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GluexQuoteRequest<'a> {
    #[serde(rename = "chainID")]
    chain_id: &'static str,
    input_token: &'a str,
    output_token: &'a str,
    input_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_receiver: Option<&'a str>,
    #[serde(rename = "uniquePID", skip_serializing_if = "Option::is_none")]
    unique_pid: Option<&'a str>,
    is_permit2: bool,
}

pub struct GluexClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    unique_pid: Option<String>,
}

impl GluexClient {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            unique_pid: config.unique_pid.clone(),
        })
    }

    fn chain_slug(chain_id: u64) -> Option<&'static str> {
        match chain_id {
            1 => Some("ethereum"),
            10 => Some("optimism"),
            8453 => Some("base"),
            42161 => Some("arbitrum"),
            999 => Some("hyperevm"),
            _ => None,
        }
    }

    async fn try_quote(&self, request: &RouteRequest, tokens: &RequestTokens) -> Result<NormalizedQuote> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(RouteError::ProviderNotConfigured("GLUEX_BASE_URL"))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RouteError::ProviderNotConfigured("GLUEX_API_KEY"))?;
        let chain = Self::chain_slug(request.chain_id)
            .ok_or(RouteError::UnsupportedChain(request.chain_id))?;

        let (token_in, token_out) = tokens.pair().await?;

        let receiver = request.to_address.as_deref().or(request.from_address.as_deref());
        let body = GluexQuoteRequest {
            chain_id: chain,
            input_token: &token_in.address,
            output_token: &token_out.address,
            input_amount: to_base_units(&request.amount_in, token_in.decimals),
            user_address: request.from_address.as_deref(),
            output_receiver: receiver,
            unique_pid: self.unique_pid.as_deref(),
            is_permit2: false,
        };

        let url = format!("{}{QUOTE_PATH}", base_url.trim_end_matches('/'));
        debug!(chain, "requesting GlueX quote");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let raw = read_json(response).await?;

        normalize_quote(ProviderTag::Gluex, &GLUEX_RULES, request, &token_in, &token_out, raw)
    }
}

#[async_trait]
impl RouteProvider for GluexClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Gluex
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    async fn quote(&self, request: &RouteRequest, tokens: &RequestTokens) -> NormalizedQuote {
        match self.try_quote(request, tokens).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(provider = "gluex", "quote failed: {e}");
                NormalizedQuote::failure(ProviderTag::Gluex, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ChainReader;
    use crate::tokens::TokenResolver;
    use ethers::types::{Address, Bytes};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    struct NoChain;

    #[async_trait]
    impl ChainReader for NoChain {
        async fn get_code(&self, _chain_id: u64, _address: Address) -> Result<Bytes> {
            Err(RouteError::RpcError("connection refused".to_string()))
        }

        async fn call(&self, _chain_id: u64, _to: Address, _data: Vec<u8>) -> Result<Bytes> {
            Err(RouteError::RpcError("connection refused".to_string()))
        }
    }

    fn client(base_url: Option<String>, api_key: Option<&str>) -> GluexClient {
        let config = ProviderConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            unique_pid: Some("pid-1".to_string()),
        };
        GluexClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    async fn fetch_quote(client: &GluexClient, request: &RouteRequest) -> NormalizedQuote {
        let tokens = RequestTokens::new(Arc::new(TokenResolver::new(Arc::new(NoChain))), request);
        client.quote(request, &tokens).await
    }

    fn native_to_native(amount: &str) -> RouteRequest {
        RouteRequest {
            chain_id: 8453,
            token_in: "native".to_string(),
            token_out: "ETH".to_string(),
            amount_in: amount.to_string(),
            slippage_bps: 0,
            from_address: Some("0x2222222222222222222222222222222222222222".to_string()),
            to_address: None,
        }
    }

    #[tokio::test]
    async fn posts_json_body_and_reads_result_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/quote")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::PartialJson(json!({
                "chainID": "base",
                "inputAmount": "250000000000000000",
                "userAddress": "0x2222222222222222222222222222222222222222",
                "outputReceiver": "0x2222222222222222222222222222222222222222",
                "uniquePID": "pid-1",
                "isPermit2": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "statusCode": 200,
                    "result": {
                        "outputAmount": "249000000000000000",
                        "priceImpact": 0.35,
                        "computationUnits": 145000,
                        "path": [
                            "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
                            "0x4200000000000000000000000000000000000006",
                            "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
                        ]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let quote = fetch_quote(&client(Some(server.url()), Some("secret")), &native_to_native("0.25")).await;
        mock.assert_async().await;

        assert!(quote.success, "{:?}", quote.reason);
        assert_eq!(quote.expected_out, "0.249");
        assert_eq!(quote.min_out.as_deref(), Some("0.249"));
        assert_eq!(quote.price_impact_bps, Some(35));
        assert_eq!(quote.gas_estimate.as_deref(), Some("145000"));
        assert_eq!(quote.hops.len(), 2);
        assert_eq!(quote.hops[0].pool_id, "gluex-hop-0");
    }

    #[tokio::test]
    async fn requires_an_api_key() {
        let quote = fetch_quote(&client(Some("http://127.0.0.1:9".to_string()), None), &native_to_native("1")).await;
        assert!(!quote.success);
        assert!(quote.reason.unwrap().contains("GLUEX_API_KEY"));
    }

    #[tokio::test]
    async fn token_resolution_failure_becomes_reason() {
        let server = mockito::Server::new_async().await;
        let mut request = native_to_native("1");
        request.token_out = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string();
        let quote = fetch_quote(&client(Some(server.url()), Some("secret")), &request).await;
        assert!(!quote.success);
        assert!(quote.reason.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn server_errors_and_unreachable_hosts_are_isolated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/quote")
            .with_status(502)
            .create_async()
            .await;
        let quote = fetch_quote(&client(Some(server.url()), Some("secret")), &native_to_native("1")).await;
        assert!(quote.reason.unwrap().starts_with("server error"));

        let quote = fetch_quote(
            &client(Some("http://127.0.0.1:9".to_string()), Some("secret")),
            &native_to_native("1"),
        )
        .await;
        assert!(!quote.success);
        assert!(quote.reason.unwrap().starts_with("provider unreachable"));
    }
}
