use super::de_string_or_number;
use crate::order::OrderStatus;
use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as, skip_serializing_none};
use smol_str::SmolStr;
use std::borrow::Cow;

/// Maximum span a single tradeFlow query may cover.
pub const TRADE_FLOW_MAX_SPAN_MS: i64 = 31 * 24 * 60 * 60 * 1000;

/// `GET /sapi/v1/convert/tradeFlow` (SIGNED, weight 3000).
///
/// The requested span must not exceed 31 days; the client validates before
/// building and paginates on `more_data` by advancing `start_time`.
#[derive(Debug, Clone, Constructor)]
pub struct GetTradeFlow(pub TradeFlowParams);

impl RestRequest for GetTradeFlow {
    type Response = TradeFlowResponse;
    type QueryParams = TradeFlowParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/tradeFlow".into()
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
#[derive(Debug, Clone, Serialize)]
pub struct TradeFlowParams {
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeFlowResponse {
    pub list: Vec<ConvertTrade>,

    #[serde(rename = "moreData", default)]
    pub more_data: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertTrade {
    #[serde(rename = "quoteId", default)]
    pub quote_id: Option<String>,

    #[serde(rename = "orderId", deserialize_with = "de_string_or_number")]
    pub order_id: String,

    #[serde(rename = "orderStatus")]
    pub order_status: OrderStatus,

    #[serde(rename = "fromAsset")]
    pub from_asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "fromAmount")]
    pub from_amount: Decimal,

    #[serde(rename = "toAsset")]
    pub to_asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "toAmount")]
    pub to_amount: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub ratio: Decimal,

    #[serde(rename = "createTime")]
    pub create_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_trade_flow_response() {
            let raw = r#"{
                "list": [
                    {
                        "quoteId": "f3b91c525b2644c7bc1e1cd31b6e1aa6",
                        "orderId": 940708407462087195,
                        "orderStatus": "SUCCESS",
                        "fromAsset": "USDT",
                        "fromAmount": "20",
                        "toAsset": "BNB",
                        "toAmount": "0.06154036",
                        "ratio": "0.0030770",
                        "inverseRatio": "324.99",
                        "createTime": 1624248872184
                    }
                ],
                "startTime": 1623824139000,
                "endTime": 1626416139000,
                "limit": 100,
                "moreData": false
            }"#;

            let flow = serde_json::from_str::<TradeFlowResponse>(raw).unwrap();
            assert_eq!(flow.list.len(), 1);
            assert!(!flow.more_data);
            assert_eq!(flow.list[0].order_status, OrderStatus::Success);
            assert_eq!(
                flow.list[0].quote_id.as_deref(),
                Some("f3b91c525b2644c7bc1e1cd31b6e1aa6")
            );
        }
    }
}
