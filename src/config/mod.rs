/*
 * Configuration management for the routelens service
 */

pub mod chains;

use crate::models::{Result, RouteError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub rpc: RpcConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub unique_pid: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    pub lifi: ProviderConfig,
    pub gluex: ProviderConfig,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RpcConfig {
    /// Chain id to JSON-RPC endpoint, only for chains in the supported table.
    #[serde(skip_serializing)]
    pub urls: BTreeMap<u64, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub cache_ttl_ms: u64,
    pub rate_limit_max: usize,
    pub rate_limit_window_ms: u64,
    pub metrics_capacity: usize,
    pub janitor_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 15_000,
            rate_limit_max: 30,
            rate_limit_window_ms: 60_000,
            metrics_capacity: 100,
            janitor_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = LimitsConfig::default();

        let alchemy_key = get("ALCHEMY_API_KEY").unwrap_or_default();
        let urls = chains::SUPPORTED_CHAINS
            .iter()
            .filter_map(|chain| {
                get(&format!("RPC_URL_{}", chain.id))
                    .or_else(|| chains::alchemy_url(chain.id, &alchemy_key))
                    .map(|url| (chain.id, url))
            })
            .collect();

        Ok(Config {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or("SERVER_PORT", get("SERVER_PORT"), 8080)?,
                log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
            providers: ProvidersConfig {
                lifi: ProviderConfig {
                    base_url: get("LIFI_BASE_URL"),
                    api_key: get("LIFI_API_KEY"),
                    unique_pid: None,
                },
                gluex: ProviderConfig {
                    base_url: get("GLUEX_BASE_URL"),
                    api_key: get("GLUEX_API_KEY"),
                    unique_pid: get("GLUEX_UNIQUE_PID"),
                },
                timeout_ms: parse_or("PROVIDER_TIMEOUT_MS", get("PROVIDER_TIMEOUT_MS"), 10_000)?,
            },
            rpc: RpcConfig { urls },
            limits: LimitsConfig {
                cache_ttl_ms: parse_or("CACHE_TTL_MS", get("CACHE_TTL_MS"), defaults.cache_ttl_ms)?,
                rate_limit_max: parse_or("RATE_LIMIT_MAX", get("RATE_LIMIT_MAX"), defaults.rate_limit_max)?,
                rate_limit_window_ms: parse_or(
                    "RATE_LIMIT_WINDOW_MS",
                    get("RATE_LIMIT_WINDOW_MS"),
                    defaults.rate_limit_window_ms,
                )?,
                metrics_capacity: parse_or(
                    "METRICS_CAPACITY",
                    get("METRICS_CAPACITY"),
                    defaults.metrics_capacity,
                )?,
                janitor_interval_secs: parse_or(
                    "JANITOR_INTERVAL_SECS",
                    get("JANITOR_INTERVAL_SECS"),
                    defaults.janitor_interval_secs,
                )?,
            },
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| RouteError::ConfigError(format!("Invalid {key}: {e}"))),
        None => Ok(default),
    }
}
