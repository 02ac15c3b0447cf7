use smol_str::SmolStr;

/// Leveraged-token and wrapped-product suffixes that never take part in
/// Convert routing.
pub const DENY_SUFFIXES: [&str; 7] = ["UP", "DOWN", "BULL", "BEAR", "5L", "5S", "PERP"];

/// Hub assets tried, in priority order, when no direct Convert pair exists.
/// `USDT` always doubles as the portfolio's cash leg.
pub const HUB_ASSETS: [&str; 4] = ["USDT", "USDC", "BUSD", "BTC"];

/// The quote asset candidate symbols are ranked against.
pub const TARGET_QUOTE: &str = "USDT";

/// Normalize a raw balance asset code into a convertible asset symbol.
///
/// Uppercases and trims, rejects leveraged-token suffixes, and unwraps
/// composite `<BASE>USDT` balance rows (optionally prefixed with digits) back
/// to their base. Returns `None` for assets that must not be routed.
pub fn normalize(asset: &str) -> Option<SmolStr> {
    let mut asset = asset.trim().to_ascii_uppercase();
    if asset.is_empty() {
        return None;
    }

    for suffix in DENY_SUFFIXES {
        if asset.ends_with(suffix) {
            return None;
        }
    }

    if asset.ends_with(TARGET_QUOTE) && asset != TARGET_QUOTE {
        let mut base = asset[..asset.len() - TARGET_QUOTE.len()].to_string();
        while base.starts_with(|c: char| c.is_ascii_digit()) {
            base.remove(0);
        }
        if base.is_empty() {
            return None;
        }
        asset = base;
    }

    Some(SmolStr::new(asset))
}

/// `BASE` of a `BASEUSDT` spot symbol, `None` for anything else (including
/// the self-pair `USDTUSDT`).
pub fn base_from_usdt_symbol(symbol: &str) -> Option<SmolStr> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let base = symbol.strip_suffix(TARGET_QUOTE)?;
    if base.is_empty() || base == TARGET_QUOTE {
        return None;
    }
    Some(SmolStr::new(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_assets() {
        assert_eq!(normalize("btc").as_deref(), Some("BTC"));
        assert_eq!(normalize(" eth ").as_deref(), Some("ETH"));
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("  "), None);
    }

    #[test]
    fn test_normalize_rejects_leveraged_suffixes() {
        for asset in ["BTCUP", "ETHDOWN", "ADABULL", "XRPBEAR", "SOL5L", "DOT5S", "BTCPERP"] {
            assert_eq!(normalize(asset), None, "{asset} should be rejected");
        }
    }

    #[test]
    fn test_normalize_unwraps_composite_usdt_rows() {
        assert_eq!(normalize("BTCUSDT").as_deref(), Some("BTC"));
        assert_eq!(normalize("123SOLUSDT").as_deref(), Some("SOL"));
        assert_eq!(normalize("USDT").as_deref(), Some("USDT"));
        assert_eq!(normalize("123USDT"), None);
    }

    #[test]
    fn test_base_from_usdt_symbol() {
        assert_eq!(base_from_usdt_symbol("BTCUSDT").as_deref(), Some("BTC"));
        assert_eq!(base_from_usdt_symbol("BTCBUSD"), None);
        assert_eq!(base_from_usdt_symbol("USDTUSDT"), None);
        assert_eq!(base_from_usdt_symbol("USDT"), None);
    }
}
