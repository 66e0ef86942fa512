const PREFIX_LEN: usize = 6;
const SUFFIX_LEN: usize = 4;

/// Format an address for display (0x1234...5678).
///
/// Every non-empty value gets the same treatment, so inputs shorter than ten
/// characters repeat themselves across the ellipsis.
pub fn short_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    let len = address.chars().count();
    let prefix: String = address.chars().take(PREFIX_LEN).collect();
    let suffix: String = address.chars().skip(len.saturating_sub(SUFFIX_LEN)).collect();
    format!("{prefix}...{suffix}")
}
