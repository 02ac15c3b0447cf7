use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::{RestRequest, SignaturePlacement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use smol_str::SmolStr;
use std::borrow::Cow;

/// `GET /api/v3/account` (SIGNED): Spot wallet balances.
#[derive(Debug, Clone, Default, Constructor)]
pub struct GetAccount;

impl RestRequest for GetAccount {
    type Response = AccountResponse;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/api/v3/account".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn weight(&self) -> u32 {
        20
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<SpotBalanceRow>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpotBalanceRow {
    pub asset: SmolStr,

    #[serde_as(as = "DisplayFromStr")]
    pub free: Decimal,

    #[serde_as(as = "DisplayFromStr")]
    pub locked: Decimal,
}

/// `POST /sapi/v3/asset/getUserAsset` (SIGNED): Funding wallet balances.
///
/// Rows carry `free` or (older shape) `amount`; normalise via
/// [`FundingBalanceRow::free_amount`].
#[derive(Debug, Clone, Constructor)]
pub struct PostFundingAssets(pub FundingAssetParams);

impl RestRequest for PostFundingAssets {
    type Response = FundingAssetsResponse;
    type QueryParams = FundingAssetParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v3/asset/getUserAsset".into()
    }

    fn method() -> Method {
        Method::POST
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.0)
    }

    fn weight(&self) -> u32 {
        5
    }

    fn placement() -> SignaturePlacement {
        SignaturePlacement::FormBody
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingAssetParams {
    #[serde(rename = "needBtcValuation")]
    pub need_btc_valuation: bool,
}

impl Default for FundingAssetParams {
    fn default() -> Self {
        Self {
            need_btc_valuation: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FundingAssetsResponse {
    Rows(Vec<FundingBalanceRow>),
    Keyed { assets: Vec<FundingBalanceRow> },
}

impl FundingAssetsResponse {
    pub fn into_rows(self) -> Vec<FundingBalanceRow> {
        match self {
            FundingAssetsResponse::Rows(rows) => rows,
            FundingAssetsResponse::Keyed { assets } => assets,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FundingBalanceRow {
    pub asset: SmolStr,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub free: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub amount: Option<Decimal>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub locked: Option<Decimal>,
}

impl FundingBalanceRow {
    pub fn free_amount(&self) -> Decimal {
        self.free.or(self.amount).unwrap_or(Decimal::ZERO)
    }
}
