/*
 * Compare service: rate limiting, caching, fan-out and bookkeeping
 */

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::{
    aggregator::Aggregator,
    cache::{fingerprint, ResultCache},
    config::{chains::{chain_name, HYPEREVM_CHAIN_ID, SUPPORTED_CHAINS}, Config, LimitsConfig},
    metrics::{MetricRecord, MetricsExporter, MetricsRecorder, MetricsSummary},
    models::{CompareResult, ProviderTag, Result, RouteError, RouteRequest, TokenMeta},
    providers::{create_providers, LifiClient, TokenDirectory},
    ratelimit::RateLimiter,
    rpc::RpcRegistry,
    tokens::{is_native_address, is_native_token, TokenResolver},
    utils::normalize_address_for_chain,
};

const STATUS_SUMMARY_LIMIT: usize = 20;
const STATUS_RECENT_LIMIT: usize = 8;
const TOKEN_META_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
}

impl From<&LimitsConfig> for ServiceSettings {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            cache_ttl: Duration::from_millis(limits.cache_ttl_ms),
            rate_limit_max: limits.rate_limit_max,
            rate_limit_window: Duration::from_millis(limits.rate_limit_window_ms),
        }
    }
}

/// The in-memory state a service owns, built by the caller.
pub struct ServiceStores {
    pub cache: ResultCache<CompareResult>,
    pub token_meta: ResultCache<BTreeMap<String, TokenMeta>>,
    pub limiter: RateLimiter,
    pub recorder: MetricsRecorder,
}

impl ServiceStores {
    pub fn new(metrics_capacity: usize) -> Self {
        Self {
            cache: ResultCache::new(),
            token_meta: ResultCache::new(),
            limiter: RateLimiter::new(),
            recorder: MetricsRecorder::new(metrics_capacity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    #[serde(flatten)]
    pub result: CompareResult,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: ProviderTag,
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub lifi_configured: bool,
    pub gluex_configured: bool,
    pub providers: Vec<ProviderStatus>,
    pub summary: MetricsSummary,
    pub recent: Vec<MetricRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erc20: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TokenValidation {
    fn rejected(reason: String) -> Self {
        Self {
            ok: false,
            native: None,
            erc20: None,
            address: None,
            symbol: None,
            decimals: None,
            reason: Some(reason),
        }
    }

    fn address_only(erc20: bool, address: String) -> Self {
        Self {
            ok: true,
            native: None,
            erc20: Some(erc20),
            address: Some(address),
            symbol: None,
            decimals: None,
            reason: None,
        }
    }
}

pub struct CompareService {
    aggregator: Aggregator,
    resolver: Arc<TokenResolver>,
    stores: ServiceStores,
    exporter: MetricsExporter,
    settings: ServiceSettings,
    rpc: Option<Arc<RpcRegistry>>,
    directory: Option<Arc<dyn TokenDirectory>>,
}

impl CompareService {
    pub fn new(
        aggregator: Aggregator,
        resolver: Arc<TokenResolver>,
        stores: ServiceStores,
        settings: ServiceSettings,
    ) -> Result<Self> {
        Ok(Self {
            aggregator,
            resolver,
            stores,
            exporter: MetricsExporter::new()?,
            settings,
            rpc: None,
            directory: None,
        })
    }

    #[must_use]
    pub fn with_token_directory(mut self, directory: Arc<dyn TokenDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        info!("Initializing compare service");

        let registry = Arc::new(RpcRegistry::from_urls(&config.rpc.urls)?);
        for chain in SUPPORTED_CHAINS.iter().filter(|c| !registry.has_chain(c.id)) {
            info!("No RPC endpoint for {}; contract tokens cannot be resolved there", chain_name(chain.id));
        }
        let resolver = Arc::new(TokenResolver::new(registry.clone()));
        let timeout = Duration::from_millis(config.providers.timeout_ms);
        let lifi = Arc::new(LifiClient::new(&config.providers.lifi, timeout)?);
        let providers = create_providers(&config.providers, lifi.clone())?;
        let aggregator = Aggregator::new(providers, resolver.clone(), timeout);

        let mut service = Self::new(
            aggregator,
            resolver,
            ServiceStores::new(config.limits.metrics_capacity),
            ServiceSettings::from(&config.limits),
        )?;
        service.rpc = Some(registry);
        Ok(service.with_token_directory(lifi))
    }

    /// Admits, validates and answers a comparison, from cache when possible.
    /// Only results with at least one successful quote are cached.
    pub async fn compare(&self, identity: &str, request: &RouteRequest) -> Result<CompareResponse> {
        let decision = self.stores.limiter.hit(
            identity,
            self.settings.rate_limit_max,
            self.settings.rate_limit_window,
        );
        if !decision.allowed {
            self.exporter.record_rate_limited();
            warn!(identity, "compare request rate limited");
            return Err(RouteError::RateLimited);
        }

        request.validate()?;

        let key = fingerprint(request);
        if let Some(result) = self.stores.cache.get(&key) {
            self.exporter.record_cache_hit();
            debug!(key = %key, "serving comparison from cache");
            return Ok(CompareResponse { result, cached: true });
        }
        self.exporter.record_cache_miss();

        let result = self.aggregator.compare(request).await;
        self.stores.recorder.record_comparison(&result);
        self.exporter.observe_comparison(&result);

        if result.any_success() {
            self.stores.cache.set(key, result.clone(), self.settings.cache_ttl);
        }

        Ok(CompareResponse { result, cached: false })
    }

    /// Checks a token identifier on a chain; failures are reported, not raised.
    ///
    /// HyperEVM contract addresses are only checked for shape, with no RPC
    /// round-trip. Input that does not normalize is still accepted there, as
    /// a non-ERC-20 address.
    pub async fn validate_token(&self, chain_id: u64, identifier: &str) -> TokenValidation {
        if chain_id == HYPEREVM_CHAIN_ID && !is_native_token(chain_id, identifier) {
            let input = identifier.trim();
            return match normalize_address_for_chain(chain_id, input) {
                Ok(address) => TokenValidation::address_only(true, address),
                Err(_) => TokenValidation::address_only(false, input.to_string()),
            };
        }

        match self.resolver.resolve(chain_id, identifier).await {
            Ok(token) => {
                let native = is_native_address(&token.address);
                TokenValidation {
                    ok: true,
                    native: Some(native),
                    erc20: Some(!native),
                    address: Some(token.address),
                    symbol: token.symbol,
                    decimals: Some(token.decimals),
                    reason: None,
                }
            }
            Err(e) => {
                debug!(chain_id, identifier, "token validation failed: {e}");
                TokenValidation::rejected(e.to_string())
            }
        }
    }

    /// Token list metadata for a chain, cached for five minutes when non-empty.
    pub async fn token_meta(&self, chain_id: u64) -> Result<BTreeMap<String, TokenMeta>> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(RouteError::ProviderNotConfigured("LIFI_BASE_URL"))?;

        let key = chain_id.to_string();
        if let Some(meta) = self.stores.token_meta.get(&key) {
            return Ok(meta);
        }
        let meta = directory.token_meta(chain_id).await?;
        if !meta.is_empty() {
            self.stores.token_meta.set(key, meta.clone(), TOKEN_META_TTL);
        }
        Ok(meta)
    }

    pub fn status(&self) -> ServiceStatus {
        let providers: Vec<ProviderStatus> = self
            .aggregator
            .providers()
            .into_iter()
            .map(|(provider, configured)| ProviderStatus { provider, configured })
            .collect();
        let configured = |tag: ProviderTag| providers.iter().any(|p| p.provider == tag && p.configured);

        ServiceStatus {
            lifi_configured: configured(ProviderTag::Lifi),
            gluex_configured: configured(ProviderTag::Gluex),
            summary: self.stores.recorder.summary(STATUS_SUMMARY_LIMIT),
            recent: self.stores.recorder.recent(STATUS_RECENT_LIMIT),
            providers,
        }
    }

    pub fn render_metrics(&self) -> Result<String> {
        self.exporter.render()
    }

    /// Drops expired cache entries and idle rate-limit buckets.
    pub fn sweep(&self) -> (usize, usize) {
        let expired = self.stores.cache.purge_expired() + self.stores.token_meta.purge_expired();
        let idle = self.stores.limiter.prune_idle(self.settings.rate_limit_window);
        (expired, idle)
    }

    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let (expired, idle) = service.sweep();
                if expired > 0 || idle > 0 {
                    debug!(expired, idle, "janitor sweep");
                }
            }
        })
    }

    /// Returns the chains whose RPC endpoint failed the chain id check.
    pub async fn verify_rpc_endpoints(&self) -> Vec<u64> {
        match &self.rpc {
            Some(registry) => registry.verify_all().await,
            None => Vec::new(),
        }
    }
}
