/*
 * Token identity resolution: native aliases and on-chain ERC-20 metadata
 */

use crate::config::chains::{chain_info, ChainInfo};
use crate::models::{ResolvedToken, Result, RouteError, RouteRequest};
use crate::rpc::ChainReader;
use crate::utils::normalize_address_for_chain;
use ethers::types::{Address, U256};
use ethers::utils::keccak256;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Reserved address standing in for the chain's native asset.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
pub const NATIVE_ALIAS: &str = "native";
pub const NATIVE_DECIMALS: u8 = 18;
const MAX_DECIMALS: u64 = 36;
const WORD: usize = 32;

pub struct TokenResolver {
    reader: Arc<dyn ChainReader>,
}

impl TokenResolver {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Resolves a native alias, native symbol or contract address to token metadata.
    ///
    /// Bare symbols other than the native one are rejected: there is no
    /// symbol directory trusted enough to pick a contract on the caller's behalf.
    pub async fn resolve(&self, chain_id: u64, identifier: &str) -> Result<ResolvedToken> {
        let chain = chain_info(chain_id).ok_or(RouteError::UnsupportedChain(chain_id))?;
        let input = identifier.trim();

        if is_native_identifier(chain, input) {
            return Ok(native_token(chain));
        }

        if input.starts_with("0x") || input.starts_with("0X") {
            let address = normalize_address_for_chain(chain_id, input)?;
            return self.fetch_metadata(chain_id, &address).await;
        }

        Err(RouteError::InvalidTokenIdentifier(format!(
            "{input}: please provide a token address"
        )))
    }

    /// Reads `decimals()` and, best effort, `symbol()` from a normalized address.
    pub async fn fetch_metadata(&self, chain_id: u64, address: &str) -> Result<ResolvedToken> {
        let contract = Address::from_str(address)
            .map_err(|e| RouteError::InvalidTokenIdentifier(format!("{address}: {e}")))?;

        let code = self.reader.get_code(chain_id, contract).await?;
        if code.is_empty() {
            return Err(RouteError::TokenNotFound(address.to_string()));
        }

        let decimals_ret = self
            .reader
            .call(chain_id, contract, selector("decimals()"))
            .await?;
        let decimals = decode_decimals(&decimals_ret)?;

        let symbol = match self.reader.call(chain_id, contract, selector("symbol()")).await {
            Ok(ret) => decode_symbol(&ret),
            Err(e) => {
                debug!(chain_id, address, "symbol() unavailable: {e}");
                None
            }
        };

        Ok(ResolvedToken {
            address: address.to_string(),
            decimals,
            symbol,
        })
    }
}

type Memo = OnceCell<std::result::Result<ResolvedToken, String>>;

/// Both tokens of one request, resolved at most once and shared by every
/// provider quoting it. Failures are memoized as their message.
pub struct RequestTokens {
    resolver: Arc<TokenResolver>,
    chain_id: u64,
    token_in: String,
    token_out: String,
    resolved_in: Memo,
    resolved_out: Memo,
}

impl RequestTokens {
    pub fn new(resolver: Arc<TokenResolver>, request: &RouteRequest) -> Self {
        Self {
            resolver,
            chain_id: request.chain_id,
            token_in: request.token_in.clone(),
            token_out: request.token_out.clone(),
            resolved_in: OnceCell::new(),
            resolved_out: OnceCell::new(),
        }
    }

    /// Input and output token, resolving concurrently on first use.
    pub async fn pair(&self) -> Result<(ResolvedToken, ResolvedToken)> {
        let (token_in, token_out) = tokio::join!(
            self.side(&self.resolved_in, &self.token_in),
            self.side(&self.resolved_out, &self.token_out)
        );
        Ok((token_in?, token_out?))
    }

    async fn side(&self, memo: &Memo, identifier: &str) -> Result<ResolvedToken> {
        memo.get_or_init(|| async {
            self.resolver
                .resolve(self.chain_id, identifier)
                .await
                .map_err(|e| e.to_string())
        })
        .await
        .clone()
        .map_err(RouteError::TokenResolution)
    }
}

/// True for any identifier `resolve` would map to the native asset.
#[must_use]
pub fn is_native_token(chain_id: u64, identifier: &str) -> bool {
    chain_info(chain_id).is_some_and(|chain| is_native_identifier(chain, identifier.trim()))
}

#[must_use]
pub fn is_native_address(address: &str) -> bool {
    address.trim().eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
}

fn is_native_identifier(chain: &ChainInfo, input: &str) -> bool {
    is_native_address(input)
        || input.eq_ignore_ascii_case(NATIVE_ALIAS)
        || input.eq_ignore_ascii_case("ETH")
        || input.eq_ignore_ascii_case(chain.native_symbol)
}

fn native_token(chain: &ChainInfo) -> ResolvedToken {
    ResolvedToken {
        address: NATIVE_TOKEN_ADDRESS.to_string(),
        decimals: NATIVE_DECIMALS,
        symbol: Some(chain.native_symbol.to_string()),
    }
}

fn selector(signature: &str) -> Vec<u8> {
    keccak256(signature.as_bytes())[0..4].to_vec()
}

fn decode_decimals(ret: &[u8]) -> Result<u8> {
    if ret.len() < WORD {
        return Err(RouteError::InvalidTokenContract(
            "decimals() did not return a 32-byte value".to_string(),
        ));
    }
    let value = U256::from_big_endian(&ret[ret.len() - WORD..]);
    if value > U256::from(MAX_DECIMALS) {
        return Err(RouteError::InvalidTokenContract(format!(
            "decimals() returned {value}, outside 0-{MAX_DECIMALS}"
        )));
    }
    u8::try_from(value.as_u64())
        .map_err(|e| RouteError::InvalidTokenContract(format!("decimals() out of range: {e}")))
}

/// Decodes an ABI `string` return, falling back to a NUL-padded `bytes32`.
fn decode_symbol(ret: &[u8]) -> Option<String> {
    let data = if ret.len() >= 2 * WORD {
        let declared = U256::from_big_endian(&ret[WORD..2 * WORD]);
        let available = ret.len() - 2 * WORD;
        let len = if declared > U256::from(available) {
            available
        } else {
            declared.as_usize()
        };
        &ret[2 * WORD..2 * WORD + len]
    } else {
        ret
    };

    let bytes: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
    let symbol = String::from_utf8(bytes).ok()?;
    let symbol = symbol.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::abi::{encode, Token};
    use ethers::types::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    struct StubReader {
        code: Vec<u8>,
        decimals: Option<Vec<u8>>,
        symbol: Option<Vec<u8>>,
        calls: AtomicUsize,
    }

    impl StubReader {
        fn erc20(decimals: u64, symbol: &str) -> Self {
            Self {
                code: vec![0x60, 0x80],
                decimals: Some(encode(&[Token::Uint(decimals.into())])),
                symbol: Some(encode(&[Token::String(symbol.to_string())])),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainReader for StubReader {
        async fn get_code(&self, _chain_id: u64, _address: Address) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(self.code.clone()))
        }

        async fn call(&self, _chain_id: u64, _to: Address, data: Vec<u8>) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ret = if data == selector("decimals()") {
                self.decimals.clone()
            } else {
                self.symbol.clone()
            };
            ret.map(Bytes::from)
                .ok_or_else(|| RouteError::RpcError("execution reverted".to_string()))
        }
    }

    fn resolver(reader: StubReader) -> (TokenResolver, Arc<StubReader>) {
        let reader = Arc::new(reader);
        (TokenResolver::new(reader.clone()), reader)
    }

    #[tokio::test]
    async fn native_aliases_skip_the_network() {
        let (resolver, reader) = resolver(StubReader::erc20(6, "USDC"));
        for alias in ["ETH", "eth", "native", NATIVE_TOKEN_ADDRESS, "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"] {
            let token = resolver.resolve(1, alias).await.unwrap();
            assert_eq!(token.address, NATIVE_TOKEN_ADDRESS);
            assert_eq!(token.decimals, 18);
            assert_eq!(token.symbol.as_deref(), Some("ETH"));
        }
        let hype = resolver.resolve(999, "HYPE").await.unwrap();
        assert_eq!(hype.symbol.as_deref(), Some("HYPE"));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolves_erc20_metadata() {
        let (resolver, _) = resolver(StubReader::erc20(6, "USDC"));
        let token = resolver
            .resolve(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
            .await
            .unwrap();
        assert_eq!(token.address, USDC);
        assert_eq!(token.decimals, 6);
        assert_eq!(token.symbol.as_deref(), Some("USDC"));
    }

    #[tokio::test]
    async fn unsupported_chain_and_bare_symbols_fail() {
        let (resolver, _) = resolver(StubReader::erc20(6, "USDC"));
        assert!(matches!(
            resolver.resolve(56, USDC).await,
            Err(RouteError::UnsupportedChain(56))
        ));
        assert!(matches!(
            resolver.resolve(1, "USDC").await,
            Err(RouteError::InvalidTokenIdentifier(_))
        ));
        assert!(matches!(
            resolver.resolve(1, "0x1234").await,
            Err(RouteError::InvalidTokenIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn empty_code_is_token_not_found() {
        let mut reader = StubReader::erc20(6, "USDC");
        reader.code.clear();
        let (resolver, _) = resolver(reader);
        assert!(matches!(
            resolver.resolve(1, USDC).await,
            Err(RouteError::TokenNotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_or_oversized_decimals_are_rejected() {
        let mut short = StubReader::erc20(6, "USDC");
        short.decimals = Some(vec![0x06]);
        let (resolver_short, _) = resolver(short);
        assert!(matches!(
            resolver_short.resolve(1, USDC).await,
            Err(RouteError::InvalidTokenContract(_))
        ));

        let (resolver_big, _) = resolver(StubReader::erc20(37, "BIG"));
        assert!(matches!(
            resolver_big.resolve(1, USDC).await,
            Err(RouteError::InvalidTokenContract(_))
        ));

        let (resolver_edge, _) = resolver(StubReader::erc20(36, "EDGE"));
        assert_eq!(resolver_edge.resolve(1, USDC).await.unwrap().decimals, 36);
    }

    #[tokio::test]
    async fn missing_symbol_is_not_fatal() {
        let mut reader = StubReader::erc20(18, "");
        reader.symbol = None;
        let (resolver, _) = resolver(reader);
        let token = resolver.resolve(1, USDC).await.unwrap();
        assert_eq!(token.decimals, 18);
        assert!(token.symbol.is_none());
    }

    fn usdc_request() -> RouteRequest {
        RouteRequest {
            chain_id: 1,
            token_in: "ETH".to_string(),
            token_out: USDC.to_string(),
            amount_in: "1".to_string(),
            slippage_bps: 50,
            from_address: None,
            to_address: None,
        }
    }

    #[tokio::test]
    async fn request_tokens_resolve_once_for_all_providers() {
        let reader = Arc::new(StubReader::erc20(6, "USDC"));
        let resolver = Arc::new(TokenResolver::new(reader.clone()));
        let tokens = RequestTokens::new(resolver, &usdc_request());

        let (first, second) = tokio::join!(tokens.pair(), tokens.pair());
        let (token_in, token_out) = first.unwrap();
        assert_eq!(token_in.address, NATIVE_TOKEN_ADDRESS);
        assert_eq!(token_out.decimals, 6);
        assert_eq!(second.unwrap().1, token_out);
        // get_code, decimals() and symbol() for the one contract token
        assert_eq!(reader.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn request_tokens_memoize_failures() {
        let mut stub = StubReader::erc20(6, "USDC");
        stub.code.clear();
        let reader = Arc::new(stub);
        let tokens = RequestTokens::new(Arc::new(TokenResolver::new(reader.clone())), &usdc_request());

        for _ in 0..2 {
            let err = tokens.pair().await.unwrap_err();
            assert_eq!(err.to_string(), format!("token address not found on selected chain: {USDC}"));
        }
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decodes_bytes32_symbols() {
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_symbol(&word).as_deref(), Some("MKR"));
    }

    #[test]
    fn clamps_lying_string_length() {
        let mut ret = encode(&[Token::String("DAI".to_string())]);
        ret[63] = 0xff;
        assert_eq!(decode_symbol(&ret).as_deref(), Some("DAI"));
    }

    #[test]
    fn selectors_match_erc20_abi() {
        assert_eq!(selector("decimals()"), vec![0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(selector("symbol()"), vec![0x95, 0xd8, 0x9b, 0x41]);
    }
}
