use crate::balance::Wallet;
use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::{RestRequest, SignaturePlacement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use smol_str::SmolStr;
use std::borrow::Cow;

/// `POST /sapi/v1/convert/getQuote` (SIGNED, weight 200).
///
/// Signed parameters travel in the form-encoded body. `from_amount` must be
/// pre-floored to 8 fractional digits by the caller.
#[derive(Debug, Clone, Constructor)]
pub struct PostGetQuote(pub GetQuoteParams);

impl RestRequest for PostGetQuote {
    type Response = GetQuoteResponse;
    type QueryParams = GetQuoteParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/getQuote".into()
    }

    fn method() -> Method {
        Method::POST
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        200
    }

    fn placement() -> SignaturePlacement {
        SignaturePlacement::FormBody
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetQuoteParams {
    #[serde(rename = "fromAsset")]
    pub from_asset: SmolStr,

    #[serde(rename = "toAsset")]
    pub to_asset: SmolStr,

    /// Decimal string, max 8 fractional digits, trailing zeros stripped.
    #[serde(rename = "fromAmount")]
    pub from_amount: String,

    #[serde(rename = "walletType")]
    pub wallet_type: Wallet,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GetQuoteResponse {
    #[serde(rename = "quoteId")]
    pub quote_id: String,

    #[serde_as(as = "DisplayFromStr")]
    pub ratio: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "inverseRatio")]
    pub inverse_ratio: Decimal,

    #[serde(rename = "validTimestamp")]
    pub valid_timestamp: i64,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "toAmount")]
    pub to_amount: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "fromAmount")]
    pub from_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    mod de {
        use super::*;

        #[test]
        fn test_get_quote_response() {
            let raw = r#"{
                "quoteId": "12415572564",
                "ratio": "38163.7",
                "inverseRatio": "0.0000262",
                "validTimestamp": 1623319461670,
                "toAmount": "3816.37",
                "fromAmount": "0.1"
            }"#;

            let quote = serde_json::from_str::<GetQuoteResponse>(raw).unwrap();
            assert_eq!(quote.quote_id, "12415572564");
            assert_eq!(quote.ratio, dec!(38163.7));
            assert_eq!(quote.valid_timestamp, 1_623_319_461_670);
            assert_eq!(quote.to_amount, dec!(3816.37));
        }
    }

    mod ser {
        use super::*;

        #[test]
        fn test_params_deterministic_order() {
            let params = GetQuoteParams {
                from_asset: "USDT".into(),
                to_asset: "BTC".into(),
                from_amount: "100.5".to_string(),
                wallet_type: Wallet::Spot,
            };
            let encoded = serde_urlencoded::to_string(&params).unwrap();
            assert_eq!(
                encoded,
                "fromAsset=USDT&toAsset=BTC&fromAmount=100.5&walletType=SPOT"
            );
        }
    }
}
