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

/// `GET /sapi/v1/convert/orderStatus` (SIGNED, weight 100).
///
/// Exactly one of `orderId` / `quoteId` must be supplied; the client enforces
/// this before building the request.
#[derive(Debug, Clone, Constructor)]
pub struct GetOrderStatus(pub OrderStatusParams);

impl RestRequest for GetOrderStatus {
    type Response = OrderStatusResponse;
    type QueryParams = OrderStatusParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/orderStatus".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        100
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderStatusParams {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    #[serde(rename = "quoteId")]
    pub quote_id: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusResponse {
    #[serde(rename = "orderId", deserialize_with = "de_string_or_number")]
    pub order_id: String,

    #[serde(rename = "orderStatus")]
    pub order_status: OrderStatus,

    #[serde(rename = "quoteId", default)]
    pub quote_id: Option<String>,

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
    use rust_decimal_macros::dec;

    mod de {
        use super::*;

        #[test]
        fn test_order_status_response() {
            let raw = r#"{
                "orderId": 933256278426274426,
                "orderStatus": "SUCCESS",
                "fromAsset": "BTC",
                "fromAmount": "0.1",
                "toAsset": "USDT",
                "toAmount": "3816.37",
                "ratio": "38163.7",
                "inverseRatio": "0.0000262",
                "createTime": 1623381330472
            }"#;

            let order = serde_json::from_str::<OrderStatusResponse>(raw).unwrap();
            assert_eq!(order.order_id, "933256278426274426");
            assert_eq!(order.order_status, OrderStatus::Success);
            assert_eq!(order.from_amount, dec!(0.1));
            assert_eq!(order.quote_id, None);
        }

        #[test]
        fn test_in_flight_status() {
            let raw = r#"{
                "orderId": "1",
                "orderStatus": "PROCESS",
                "quoteId": "q1",
                "fromAsset": "USDT",
                "fromAmount": "100",
                "toAsset": "BTC",
                "toAmount": "0.0026",
                "ratio": "0.000026",
                "createTime": 1623381330472
            }"#;

            let order = serde_json::from_str::<OrderStatusResponse>(raw).unwrap();
            assert!(!order.order_status.is_terminal());
            assert_eq!(order.quote_id.as_deref(), Some("q1"));
        }
    }
}
