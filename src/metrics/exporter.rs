/*
 * Prometheus counters and histograms for the /metrics endpoint
 */

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use crate::models::{CompareResult, Result, RouteError};

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

pub struct MetricsExporter {
    registry: Registry,
    provider_quotes: IntCounterVec,
    provider_latency: HistogramVec,
    cache_lookups: IntCounterVec,
    rate_limited: IntCounter,
}

impl MetricsExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let provider_quotes = IntCounterVec::new(
            Opts::new("routelens_provider_quotes_total", "Provider quotes by outcome"),
            &["provider", "outcome"],
        )
        .map_err(metrics_error)?;
        let provider_latency = HistogramVec::new(
            HistogramOpts::new(
                "routelens_provider_latency_seconds",
                "Time from issuing a provider quote to its completion",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["provider"],
        )
        .map_err(metrics_error)?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("routelens_cache_lookups_total", "Result cache lookups by result"),
            &["result"],
        )
        .map_err(metrics_error)?;
        let rate_limited = IntCounter::new("routelens_rate_limited_total", "Rejected compare requests")
            .map_err(metrics_error)?;

        registry.register(Box::new(provider_quotes.clone())).map_err(metrics_error)?;
        registry.register(Box::new(provider_latency.clone())).map_err(metrics_error)?;
        registry.register(Box::new(cache_lookups.clone())).map_err(metrics_error)?;
        registry.register(Box::new(rate_limited.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            provider_quotes,
            provider_latency,
            cache_lookups,
            rate_limited,
        })
    }

    pub fn observe_comparison(&self, result: &CompareResult) {
        for quote in &result.quotes {
            let provider = quote.provider.as_str();
            let outcome = if quote.success { "success" } else { "failure" };
            self.provider_quotes.with_label_values(&[provider, outcome]).inc();
            if let Some(ms) = result.elapsed_ms(quote.provider) {
                #[allow(clippy::cast_precision_loss)]
                self.provider_latency
                    .with_label_values(&[provider])
                    .observe(ms as f64 / 1000.0);
            }
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_lookups.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_lookups.with_label_values(&["miss"]).inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| RouteError::MetricsError(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> RouteError {
    RouteError::MetricsError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NormalizedQuote, ProviderTag, ProviderTiming};
    use chrono::Utc;

    #[test]
    fn renders_observed_comparisons() {
        let exporter = MetricsExporter::new().unwrap();
        let result = CompareResult {
            chain_id: 1,
            quotes: vec![NormalizedQuote::failure(ProviderTag::Gluex, "unauthorized")],
            timings: vec![ProviderTiming { provider: ProviderTag::Gluex, elapsed_ms: 120 }],
            fetched_at: Utc::now(),
        };
        exporter.observe_comparison(&result);
        exporter.record_cache_miss();
        exporter.record_cache_hit();
        exporter.record_rate_limited();

        let text = exporter.render().unwrap();
        assert!(text.contains("routelens_provider_quotes_total{outcome=\"failure\",provider=\"gluex\"} 1"));
        assert!(text.contains("routelens_provider_latency_seconds_count{provider=\"gluex\"} 1"));
        assert!(text.contains("routelens_cache_lookups_total{result=\"hit\"} 1"));
        assert!(text.contains("routelens_rate_limited_total 1"));
    }
}
