use super::BuildStrategy;
use crate::error::TransportError;
use crate::protocol::http::rest::RestRequest;

/// [`RestRequest`] [`BuildStrategy`] that builds a non-authenticated Http request with no
/// headers, attaching any query parameters and JSON body the request provides.
#[derive(Debug, Copy, Clone)]
pub struct PublicNoHeaders;

impl BuildStrategy for PublicNoHeaders {
    fn build<Request>(
        &self,
        request: &Request,
        mut builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        if let Some(query_params) = request.query_params() {
            builder = builder.query(query_params);
        }

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        builder.build().map_err(TransportError::from)
    }
}
