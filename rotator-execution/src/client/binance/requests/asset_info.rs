use derive_more::Constructor;
use reqwest::Method;
use rotator_integration::protocol::http::rest::RestRequest;
use serde::Deserialize;
use smol_str::SmolStr;
use std::borrow::Cow;

/// `GET /sapi/v1/convert/assetInfo` (SIGNED, weight 100).
///
/// Per-asset Convert precision (`fraction` = supported fractional digits).
#[derive(Debug, Clone, Default, Constructor)]
pub struct GetAssetInfo;

impl RestRequest for GetAssetInfo {
    type Response = AssetInfoResponse;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        "/sapi/v1/convert/assetInfo".into()
    }

    fn method() -> Method {
        Method::GET
    }

    fn weight(&self) -> u32 {
        100
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AssetInfoResponse {
    Assets(Vec<AssetPrecision>),
    Keyed { data: Vec<AssetPrecision> },
}

impl AssetInfoResponse {
    pub fn into_assets(self) -> Vec<AssetPrecision> {
        match self {
            AssetInfoResponse::Assets(assets) => assets,
            AssetInfoResponse::Keyed { data } => data,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct AssetPrecision {
    pub asset: SmolStr,
    pub fraction: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_info_shapes() {
        let bare = r#"[{"asset": "BTC", "fraction": 8}, {"asset": "SHIB", "fraction": 2}]"#;
        let assets = serde_json::from_str::<AssetInfoResponse>(bare)
            .unwrap()
            .into_assets();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].fraction, 8);

        let keyed = r#"{"data": [{"asset": "BTC", "fraction": 8}]}"#;
        let assets = serde_json::from_str::<AssetInfoResponse>(keyed)
            .unwrap()
            .into_assets();
        assert_eq!(assets.len(), 1);
    }
}
