//! Misc utils

use ethers::{
    types::{Address, U256},
    utils::to_checksum,
};
use std::str::FromStr;

/// Converts address to checksum address
pub fn as_checksum_addr<S>(val: &Address, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&to_checksum(val, None))
}

/// If possible, parses address from the first 20 bytes
pub fn get_address(buf: &[u8]) -> Option<Address> {
    if buf.len() >= 20 {
        Some(Address::from_slice(&buf[0..20]))
    } else {
        None
    }
}

/// Performs division and rounds up to the nearest integer.
pub fn div_ceil(numerator: U256, denominator: U256) -> U256 {
    let rounding_const =
        U256::from(if numerator.checked_rem(denominator).unwrap_or_default() > U256::zero() {
            1
        } else {
            0
        });
    numerator.checked_div(denominator).unwrap_or_default().saturating_add(rounding_const)
}

/// Gas price increased by the given percentage, rounded up
///
/// `gas_price * (100 + gas_incr_perc) / 100`, used by the mempool replacement rule.
pub fn calculate_valid_gas(gas_price: U256, gas_incr_perc: U256) -> U256 {
    let denominator = U256::from(100);
    let numerator = gas_price.saturating_mul(gas_incr_perc.saturating_add(denominator));
    div_ceil(numerator, denominator)
}

/// Parses address from string (clap value parser)
pub fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s).map_err(|_| format!("address {s} is not valid"))
}

/// Parses U256 from string (clap value parser)
pub fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|_| format!("u256 {s} is not valid"))
}
