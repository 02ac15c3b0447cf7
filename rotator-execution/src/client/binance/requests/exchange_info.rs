use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;

/// `GET /sapi/v1/convert/exchangeInfo` (SIGNED, weight 3000).
///
/// With both assets set the venue answers with the single matching pair; with
/// neither it enumerates every supported Convert pair.
#[derive(Debug, Clone, Constructor)]
pub struct GetExchangeInfo(pub ExchangeInfoParams);

impl RestRequest for GetExchangeInfo {
    type Response = ExchangeInfoResponse;
    type QueryParams = ExchangeInfoParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/exchangeInfo".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        3_000
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExchangeInfoParams {
    #[serde(rename = "fromAsset")]
    pub from_asset: Option<SmolStr>,
    #[serde(rename = "toAsset")]
    pub to_asset: Option<SmolStr>,
}

/// The venue has answered with a bare list, a `{"data": [...]}` wrapper, and
/// (for fully-qualified pair lookups) a single object over its API history.
/// Normalise every shape to `Vec<ConvertPair>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExchangeInfoResponse {
    Pairs(Vec<ConvertPair>),
    Keyed { data: Vec<ConvertPair> },
    Single(ConvertPair),
}

impl ExchangeInfoResponse {
    pub fn into_pairs(self) -> Vec<ConvertPair> {
        match self {
            ExchangeInfoResponse::Pairs(pairs) => pairs,
            ExchangeInfoResponse::Keyed { data } => data,
            ExchangeInfoResponse::Single(pair) => vec![pair],
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConvertPair {
    #[serde(rename = "fromAsset")]
    pub from_asset: SmolStr,

    #[serde(rename = "toAsset")]
    pub to_asset: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "fromAssetMinAmount", default)]
    pub from_asset_min_amount: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "fromAssetMaxAmount", default)]
    pub from_asset_max_amount: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "toAssetMinAmount", default)]
    pub to_asset_min_amount: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(rename = "toAssetMaxAmount", default)]
    pub to_asset_max_amount: Option<Decimal>,
}

impl ConvertPair {
    /// Minimum fromAmount the venue will quote, zero when unrestricted.
    pub fn min_quote(&self) -> Decimal {
        self.from_asset_min_amount.unwrap_or(Decimal::ZERO)
    }

    /// Maximum fromAmount the venue will quote, zero when unrestricted.
    pub fn max_quote(&self) -> Decimal {
        self.from_asset_max_amount.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    mod de {
        use super::*;

        #[test]
        fn test_exchange_info_list() {
            let raw = r#"[
                {
                    "fromAsset": "BTC",
                    "toAsset": "USDT",
                    "fromAssetMinAmount": "0.0004",
                    "fromAssetMaxAmount": "50",
                    "toAssetMinAmount": "20",
                    "toAssetMaxAmount": "2500000"
                },
                {
                    "fromAsset": "ETH",
                    "toAsset": "USDT",
                    "fromAssetMinAmount": "0.008",
                    "fromAssetMaxAmount": "500",
                    "toAssetMinAmount": "20",
                    "toAssetMaxAmount": "2500000"
                }
            ]"#;

            let pairs = serde_json::from_str::<ExchangeInfoResponse>(raw)
                .unwrap()
                .into_pairs();
            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[0].from_asset, "BTC");
            assert_eq!(pairs[0].min_quote(), dec!(0.0004));
            assert_eq!(pairs[0].max_quote(), dec!(50));
        }

        #[test]
        fn test_exchange_info_keyed_and_single() {
            let keyed = r#"{"data": [{"fromAsset": "BNB", "toAsset": "SOL"}]}"#;
            let pairs = serde_json::from_str::<ExchangeInfoResponse>(keyed)
                .unwrap()
                .into_pairs();
            assert_eq!(pairs.len(), 1);
            assert_eq!(pairs[0].min_quote(), Decimal::ZERO);

            let single = r#"{"fromAsset": "BNB", "toAsset": "SOL", "fromAssetMinAmount": "0.05"}"#;
            let pairs = serde_json::from_str::<ExchangeInfoResponse>(single)
                .unwrap()
                .into_pairs();
            assert_eq!(pairs.len(), 1);
            assert_eq!(pairs[0].min_quote(), dec!(0.05));
        }
    }
}
