use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::RestRequest;
use serde::Deserialize;
use smol_str::SmolStr;
use std::borrow::Cow;

/// `GET /sapi/v1/capital/config/getall` (SIGNED).
///
/// Used only to identify legal-money (fiat) assets, which are never eligible
/// Convert sources or targets.
#[derive(Debug, Clone, Default, Constructor)]
pub struct GetCapitalConfig;

impl RestRequest for GetCapitalConfig {
    type Response = Vec<CapitalCoin>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/capital/config/getall".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn weight(&self) -> u32 {
        10
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct CapitalCoin {
    pub coin: SmolStr,

    #[serde(rename = "isLegalMoney", default)]
    pub is_legal_money: bool,
}
