/*
 * Concurrent quote fan-out with per-provider isolation
 */

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use crate::models::{CompareResult, NormalizedQuote, ProviderTag, ProviderTiming, RouteError, RouteRequest};
use crate::providers::RouteProvider;
use crate::tokens::{RequestTokens, TokenResolver};

pub struct Aggregator {
    providers: Vec<Arc<dyn RouteProvider>>,
    resolver: Arc<TokenResolver>,
    provider_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        providers: Vec<Arc<dyn RouteProvider>>,
        resolver: Arc<TokenResolver>,
        provider_timeout: Duration,
    ) -> Self {
        Self { providers, resolver, provider_timeout }
    }

    #[must_use]
    pub fn providers(&self) -> Vec<(ProviderTag, bool)> {
        self.providers
            .iter()
            .map(|p| (p.tag(), p.is_configured()))
            .collect()
    }

    /// Quotes every provider concurrently. The result holds one quote and one
    /// timing per provider, in registration order, whatever each provider did.
    /// Tokens are resolved once per call and shared across providers.
    pub async fn compare(&self, request: &RouteRequest) -> CompareResult {
        let started = Instant::now();
        let tokens = Arc::new(RequestTokens::new(Arc::clone(&self.resolver), request));

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let request = request.clone();
                let tokens = Arc::clone(&tokens);
                let deadline = self.provider_timeout;
                let tag = provider.tag();
                let handle = tokio::spawn(async move {
                    let issued = Instant::now();
                    let quote = match tokio::time::timeout(deadline, provider.quote(&request, &tokens)).await {
                        Ok(quote) => quote,
                        Err(_) => {
                            let e = RouteError::ProviderUnreachable(format!(
                                "timed out after {} ms",
                                deadline.as_millis()
                            ));
                            warn!(provider = %tag, "{e}");
                            NormalizedQuote::failure(tag, e.to_string())
                        }
                    };
                    (quote, elapsed_ms(issued))
                });
                (tag, handle)
            })
            .collect();

        let mut quotes = Vec::with_capacity(handles.len());
        let mut timings = Vec::with_capacity(handles.len());
        for (tag, handle) in handles {
            let (quote, elapsed) = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(provider = %tag, "quote task aborted: {e}");
                    (
                        NormalizedQuote::failure(tag, format!("provider task failed: {e}")),
                        elapsed_ms(started),
                    )
                }
            };
            // A provider answering under another tag still occupies its own slot.
            let quote = NormalizedQuote { provider: tag, ..quote }.into_consistent();
            timings.push(ProviderTiming { provider: tag, elapsed_ms: elapsed });
            quotes.push(quote);
        }

        let ok = quotes.iter().filter(|q| q.success).count();
        info!(
            chain_id = request.chain_id,
            ok,
            total = quotes.len(),
            elapsed_ms = elapsed_ms(started),
            "route comparison finished"
        );

        CompareResult {
            chain_id: request.chain_id,
            quotes,
            timings,
            fetched_at: Utc::now(),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
