/*
 * routelens - DEX route comparison service
 * Core library exports and module declarations
 */

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod ratelimit;
pub mod rpc;
pub mod service;
pub mod tokens;
pub mod utils;

pub use config::Config;
pub use models::*;
pub use service::CompareService;
