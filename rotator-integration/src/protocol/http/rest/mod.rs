use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Configurable [`client::RestClient`] capable of executing signed [`RestRequest`]s and parsing
/// responses.
pub mod client;

/// Default Http [`reqwest::Request`] timeout Duration.
const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Where a [`RequestSigner`](super::private::RequestSigner) places the signed
/// parameter payload.
///
/// Most signed GETs carry everything in the query string. Some venues require
/// specific signed POSTs (eg/ quote acceptance) to carry the payload as an
/// `application/x-www-form-urlencoded` body instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SignaturePlacement {
    #[default]
    Query,
    FormBody,
}

/// Http REST request that can be executed by a [`RestClient`](self::client::RestClient).
pub trait RestRequest {
    /// Expected response type if this request was successful.
    type Response: DeserializeOwned;

    /// Serialisable query parameters type - use unit struct () if not required for this request.
    type QueryParams: Serialize;

    /// Serialisable Body type - use unit struct () if not required for this request.
    type Body: Serialize;

    /// Additional [`Url`](url::Url) path to the resource.
    fn path(&self) -> std::borrow::Cow<'static, str>;

    /// Http [`reqwest::Method`] of this request.
    fn method() -> reqwest::Method;

    /// Optional query parameters for this request.
    fn query_params(&self) -> Option<&Self::QueryParams> {
        None
    }

    /// Optional Body for this request.
    fn body(&self) -> Option<&Self::Body> {
        None
    }

    /// Http request timeout [`Duration`].
    fn timeout() -> Duration {
        DEFAULT_HTTP_REQUEST_TIMEOUT
    }

    /// Venue-assigned request weight consumed by this call.
    ///
    /// Takes `&self` since some venues scale the weight with the parameters
    /// provided (eg/ single symbol vs. all symbols).
    fn weight(&self) -> u32 {
        1
    }

    /// Placement of the signed payload if this request is executed through a
    /// signing [`BuildStrategy`](super::BuildStrategy).
    fn placement() -> SignaturePlacement {
        SignaturePlacement::Query
    }
}
