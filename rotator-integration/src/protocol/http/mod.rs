use self::rest::RestRequest;
use crate::error::TransportError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::error;

/// Defines an abstract [`RestRequest`] that can be executed by a fully
/// configurable [`RestClient`](rest::client::RestClient).
pub mod rest;

/// Defines a configurable [`RequestSigner`](private::RequestSigner) that signs Http
/// [`RestRequest`] using venue specific logic.
pub mod private;

/// Defines a default [`BuildStrategy`] that builds a non-authenticated Http
/// [`RestRequest`] with no headers.
pub mod public;

/// Recovery action the [`RestClient`](rest::client::RestClient) takes after a
/// failed request, as classified by the [`HttpParser`] in use.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Recovery {
    /// Do not retry. Configuration, authentication and client-request errors
    /// land here: retrying cannot succeed without operator intervention.
    Abort,

    /// Retry after an exponential backoff sleep (throttling, 5xx, network).
    Retry,

    /// Re-fetch the venue server time, re-align the local clock offset, and
    /// retry at most once.
    SyncClockAndRetry,
}

/// [`RestRequest`] build strategy for the API being interacted with.
///
/// An API that requires authenticated [`RestRequest`]s will likely utilise the
/// configurable [`RequestSigner`](private::RequestSigner) to sign requests
/// before building. An API that requires no authentication may just attach
/// query parameters and any mandatory `reqwest` headers.
///
/// The strategy owns parameter attachment entirely, so signed venues can
/// serialise parameters exactly once and guarantee the signature covers the
/// payload that is sent.
pub trait BuildStrategy {
    /// Use a [`RestRequest`] and [`reqwest::RequestBuilder`] to construct a
    /// [`reqwest::Request`] that is ready for executing.
    ///
    /// Takes the request by reference so the [`RestClient`](rest::client::RestClient)
    /// can rebuild (and re-sign with a fresh timestamp) on every retry attempt.
    fn build<Request>(
        &self,
        request: &Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest;
}

/// Utilised by a [`RestClient`](rest::client::RestClient) to deserialise
/// [`RestRequest::Response`], and upon failure parses venue errors returned
/// from the server.
pub trait HttpParser {
    type ApiError: DeserializeOwned;
    type OutputError: From<TransportError> + std::fmt::Display;

    /// Attempt to parse a [`StatusCode`] & bytes payload into a deserialisable `Response`.
    fn parse<Response>(
        &self,
        status: StatusCode,
        payload: &[u8],
    ) -> Result<Response, Self::OutputError>
    where
        Response: DeserializeOwned,
    {
        // Attempt to deserialise reqwest::Response bytes into Ok(Response)
        let parse_ok_error = match serde_json::from_slice::<Response>(payload) {
            Ok(response) => return Ok(response),
            Err(serde_error) => serde_error,
        };

        // Attempt to deserialise API Error if Ok(Response) deserialisation failed
        let parse_api_error_error = match serde_json::from_slice::<Self::ApiError>(payload) {
            Ok(api_error) => return Err(self.parse_api_error(status, api_error)),
            Err(serde_error) => serde_error,
        };

        // A non-success status with an unrecognised body still carries the
        // status information needed for retry classification.
        if !status.is_success() {
            return Err(Self::OutputError::from(TransportError::HttpResponse(
                status,
                String::from_utf8_lossy(payload).into_owned(),
            )));
        }

        // Log errors if failed to deserialise reqwest::Response into Response or API Self::Error
        error!(
            status_code = ?status,
            ?parse_ok_error,
            ?parse_api_error_error,
            response_body = %String::from_utf8_lossy(payload),
            "error deserializing HTTP response"
        );

        Err(Self::OutputError::from(TransportError::DeserialiseBinary {
            error: parse_ok_error,
            payload: payload.to_vec(),
        }))
    }

    /// If [`parse`](Self::parse) fails to deserialise the `Ok(Response)`, this function parses
    /// the API [`Self::ApiError`] associated with the response.
    fn parse_api_error(&self, status: StatusCode, error: Self::ApiError) -> Self::OutputError;

    /// Classify an output error into the [`Recovery`] action the
    /// [`RestClient`](rest::client::RestClient) retry loop takes.
    fn recovery(&self, _error: &Self::OutputError) -> Recovery {
        Recovery::Abort
    }

    /// True if the error indicates the venue throttled us, in which case the
    /// client additionally penalises its token bucket refill interval.
    fn is_rate_violation(&self, _error: &Self::OutputError) -> bool {
        false
    }
}
