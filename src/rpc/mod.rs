/*
 * RPC client module for reading token contracts on supported chains
 */

use crate::models::{Result, RouteError};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes, TransactionRequest};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only chain access needed to inspect token contracts.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn get_code(&self, chain_id: u64, address: Address) -> Result<Bytes>;
    async fn call(&self, chain_id: u64, to: Address, data: Vec<u8>) -> Result<Bytes>;
}

pub struct RpcClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl RpcClient {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RouteError::RpcError(format!("Failed to create provider: {e}")))?;

        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    pub async fn verify_chain_id(&self) -> Result<()> {
        let chain = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| RouteError::RpcError(format!("Failed to get chain ID: {e}")))?;

        if chain.as_u64() != self.chain_id {
            return Err(RouteError::RpcError(format!(
                "Chain ID mismatch: expected {}, got {}",
                self.chain_id,
                chain.as_u64()
            )));
        }
        Ok(())
    }

    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.provider
            .get_code(address, None)
            .await
            .map_err(|e| RouteError::RpcError(format!("Failed to get code for {address:?}: {e}")))
    }

    pub async fn call(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
        let tx = TransactionRequest::new().to(to).data(Bytes::from(data));

        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| RouteError::RpcError(format!("eth_call to {to:?} failed: {e}")))
    }
}

/// One [`RpcClient`] per configured chain.
pub struct RpcRegistry {
    clients: HashMap<u64, RpcClient>,
}

impl RpcRegistry {
    pub fn from_urls(urls: &BTreeMap<u64, String>) -> Result<Self> {
        let clients = urls
            .iter()
            .map(|(chain_id, url)| RpcClient::new(url, *chain_id).map(|c| (*chain_id, c)))
            .collect::<Result<HashMap<_, _>>>()?;
        info!("RPC endpoints configured for {} chains", clients.len());
        Ok(Self { clients })
    }

    #[must_use]
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.clients.contains_key(&chain_id)
    }

    fn client(&self, chain_id: u64) -> Result<&RpcClient> {
        self.clients
            .get(&chain_id)
            .ok_or(RouteError::UnsupportedChain(chain_id))
    }

    /// Checks every endpoint reports the chain id it was configured for.
    /// Returns the chains that failed; failures are logged, not fatal.
    pub async fn verify_all(&self) -> Vec<u64> {
        let mut failed = Vec::new();
        for (chain_id, client) in &self.clients {
            if let Err(e) = client.verify_chain_id().await {
                warn!(chain_id, "RPC endpoint check failed: {e}");
                failed.push(*chain_id);
            }
        }
        failed.sort_unstable();
        failed
    }
}

#[async_trait]
impl ChainReader for RpcRegistry {
    async fn get_code(&self, chain_id: u64, address: Address) -> Result<Bytes> {
        self.client(chain_id)?.get_code(address).await
    }

    async fn call(&self, chain_id: u64, to: Address, data: Vec<u8>) -> Result<Bytes> {
        self.client(chain_id)?.call(to, data).await
    }
}
