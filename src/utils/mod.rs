/*
 * Amount and address helpers shared across the crate
 */

mod address;
mod units;

pub use address::{is_address_for_chain, normalize_address_for_chain};
pub use units::{apply_slippage, from_base_units, is_decimal_amount, to_base_units};
