/*
 * routelens - DEX route comparison service
 * Main entry point for the application
 */

use anyhow::Context;
use routelens::{api, config::Config, service::CompareService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_tracing(config.as_ref().map_or("info", |c| c.server.log_level.as_str()));

    info!("Starting routelens route comparison service");

    let config = config
        .inspect_err(|e| error!("Failed to load configuration: {e}"))
        .context("loading configuration")?;
    info!("Configuration loaded successfully");

    let service = Arc::new(CompareService::from_config(&config).context("building compare service")?);

    let failed = service.verify_rpc_endpoints().await;
    if !failed.is_empty() {
        warn!("RPC endpoints unavailable for chains {failed:?}; token lookups there will fail");
    }

    service.spawn_janitor(Duration::from_secs(config.limits.janitor_interval_secs.max(1)));

    info!("Starting API server on {}:{}", config.server.host, config.server.port);

    let state = api::ApiState { service };
    api::create_rocket(state, &config.server)
        .launch()
        .await
        .context("running HTTP server")?;

    Ok(())
}

/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("routelens={level}")));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
