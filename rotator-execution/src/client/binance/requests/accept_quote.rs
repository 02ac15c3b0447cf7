use super::de_string_or_number;
use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::{RestRequest, SignaturePlacement};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// `POST /sapi/v1/convert/acceptQuote` (SIGNED, weight 500).
///
/// Form-encoded body. The idempotency shield in front of this request lives
/// in the client: a quoteId is accepted at most once per process.
#[derive(Debug, Clone, Constructor)]
pub struct PostAcceptQuote(pub AcceptQuoteParams);

impl RestRequest for PostAcceptQuote {
    type Response = AcceptQuoteResponse;
    type QueryParams = AcceptQuoteParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/acceptQuote".into()
    }

    fn method() -> Method {
        Method::POST
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        500
    }

    fn placement() -> SignaturePlacement {
        SignaturePlacement::FormBody
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptQuoteParams {
    #[serde(rename = "quoteId")]
    pub quote_id: String,
}

/// `orderId` is mandatory in the venue response; an accept that produces no
/// order is treated as a failed parse and surfaces as an error upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptQuoteResponse {
    #[serde(rename = "orderId", deserialize_with = "de_string_or_number")]
    pub order_id: String,

    #[serde(rename = "createTime", default)]
    pub create_time: Option<i64>,
}
