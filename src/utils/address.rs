/*
 * Chain-aware contract address validation
 */

use crate::config::chains::HYPEREVM_CHAIN_ID;
use crate::models::{Result, RouteError};

const ADDRESS_HEX_LEN: usize = 40;

/// Lower-cases and validates `input` as a contract address for `chain_id`.
///
/// HyperEVM accepts short hex forms and left-pads them to 20 bytes; every
/// other chain requires exactly 20 bytes.
pub fn normalize_address_for_chain(chain_id: u64, input: &str) -> Result<String> {
    let raw = input.trim().to_lowercase();
    let hex = raw.strip_prefix("0x").ok_or_else(|| {
        RouteError::InvalidTokenIdentifier(format!("address must start with 0x: {input}"))
    })?;

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RouteError::InvalidTokenIdentifier(format!(
            "invalid hex characters in address: {input}"
        )));
    }

    if chain_id == HYPEREVM_CHAIN_ID {
        if hex.is_empty() || hex.len() > ADDRESS_HEX_LEN {
            return Err(RouteError::InvalidTokenIdentifier(format!(
                "invalid HyperEVM address length: {input}"
            )));
        }
        return Ok(format!("0x{hex:0>width$}", width = ADDRESS_HEX_LEN));
    }

    if hex.len() != ADDRESS_HEX_LEN {
        return Err(RouteError::InvalidTokenIdentifier(format!(
            "invalid EVM address length: {input}"
        )));
    }
    Ok(raw)
}

#[must_use]
pub fn is_address_for_chain(chain_id: u64, input: &str) -> bool {
    normalize_address_for_chain(chain_id, input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    #[test]
    fn lowercases_standard_addresses() {
        assert_eq!(
            normalize_address_for_chain(1, USDC).unwrap(),
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
        assert_eq!(
            normalize_address_for_chain(8453, &format!("  {USDC} ")).unwrap(),
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }

    #[test]
    fn rejects_wrong_length_on_standard_chains() {
        assert!(!is_address_for_chain(1, "0x1234"));
        assert!(!is_address_for_chain(1, &format!("{USDC}00")));
        assert!(!is_address_for_chain(1, "a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
        assert!(!is_address_for_chain(1, "0xzz86991c6218b36c1d19d4a2e9eb0ce3606eb48"));
    }

    #[test]
    fn hyperevm_pads_short_addresses() {
        assert_eq!(
            normalize_address_for_chain(999, "0x2222").unwrap(),
            "0x0000000000000000000000000000000000002222"
        );
        assert!(is_address_for_chain(999, USDC));
        assert!(!is_address_for_chain(999, "0x"));
        assert!(!is_address_for_chain(999, &format!("{USDC}ff")));
    }
}
