//! Conversion of `eth_getBalance` quantities into display strings.
//!
//! Malformed input never produces an error: the display degrades to an empty
//! string, which the view treats as "balance unknown".

use alloy::primitives::U256;
use serde_json::Value;

/// 10^18 wei per ether.
const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;
const WEI_DIGITS: usize = 18;
const DISPLAY_FRACTION_DIGITS: usize = 6;

/// Parses a quantity the way the wallet returns it: `0x`-prefixed hex, or plain
/// decimal digits. Anything else, including values wider than 256 bits, is
/// rejected.
pub fn parse_wei(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    let (digits, radix) = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (raw, 10),
    };
    if digits.is_empty() {
        return None;
    }
    let valid = if radix == 16 {
        digits.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        digits.chars().all(|c| c.is_ascii_digit())
    };
    if !valid {
        return None;
    }
    U256::from_str_radix(digits, radix).ok()
}

/// Renders `wei` as `"{whole}.{six digits}"`, truncating rather than rounding.
pub fn format_wei(wei: U256) -> String {
    let divisor = U256::from(WEI_PER_ETHER);
    let whole = wei / divisor;
    let remainder = wei % divisor;
    // remainder < 10^18 always fits in the low limb.
    let padded = format!("{:0width$}", remainder.as_limbs()[0], width = WEI_DIGITS);
    format!("{whole}.{}", &padded[..DISPLAY_FRACTION_DIGITS])
}

pub fn display_from_hex(raw: &str) -> String {
    parse_wei(raw).map(format_wei).unwrap_or_default()
}

/// Same as [`display_from_hex`] for a raw JSON-RPC result.
pub fn display_from_value(value: &Value) -> String {
    value.as_str().map(display_from_hex).unwrap_or_default()
}
