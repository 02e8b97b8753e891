/*
 * Route quote providers: one adapter per aggregator API
 */

mod extract;
mod gluex;
mod http;
mod lifi;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use crate::config::ProvidersConfig;
use crate::models::{NormalizedQuote, ProviderTag, Result, RouteRequest, TokenMeta};
use crate::tokens::RequestTokens;

pub use extract::{
    hops_are_contiguous, normalize_quote, ExtractionTable, FeeRule, GasRule, HopRule, ImpactRule,
};
pub use gluex::GluexClient;
pub use lifi::LifiClient;

/// A source of swap quotes. `quote` never fails: every error is folded into
/// a failure-shaped [`NormalizedQuote`]. Token metadata comes from the
/// request-scoped `tokens`, shared with the other providers.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;
    fn is_configured(&self) -> bool;
    async fn quote(&self, request: &RouteRequest, tokens: &RequestTokens) -> NormalizedQuote;
}

/// Token list lookup keyed by lower-cased address, symbol and lower-cased symbol.
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    async fn token_meta(&self, chain_id: u64) -> Result<BTreeMap<String, TokenMeta>>;
}

/// GlueX first, then the shared LI.FI client.
pub fn create_providers(
    config: &ProvidersConfig,
    lifi: Arc<LifiClient>,
) -> Result<Vec<Arc<dyn RouteProvider>>> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let providers: Vec<Arc<dyn RouteProvider>> = vec![
        Arc::new(GluexClient::new(&config.gluex, timeout)?),
        lifi,
    ];
    for provider in &providers {
        info!(provider = %provider.tag(), configured = provider.is_configured(), "quote provider registered");
    }
    Ok(providers)
}
