use reqwest::Error;
use thiserror::Error;

/// All transport IO related errors generated in `rotator-integration`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Deserialising JSON error: {error} for payload: {payload}")]
    Deserialise {
        error: serde_json::Error,
        payload: String,
    },

    #[error("Deserialising JSON error: {error} for binary payload: {payload:?}")]
    DeserialiseBinary {
        error: serde_json::Error,
        payload: Vec<u8>,
    },

    #[error("Serialising JSON error: {0}")]
    Serialise(serde_json::Error),

    #[error("SerDe Query String serialisation error: {0}")]
    QueryParams(#[from] serde_qs::Error),

    #[error("SerDe url encoding serialisation error: {0}")]
    UrlEncoded(#[from] serde_urlencoded::ser::Error),

    #[error("error parsing Url: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("HTTP request timed out")]
    HttpTimeout(reqwest::Error),

    /// REST http response error that matched neither the expected response
    /// shape nor the venue error shape.
    #[error("HTTP response (status={0}) error: {1}")]
    HttpResponse(reqwest::StatusCode, String),

    /// Request could not be signed or assembled with the provided inputs.
    #[error("invalid request configuration: {0}")]
    RequestBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: Error) -> Self {
        match error {
            error if error.is_timeout() => TransportError::HttpTimeout(error),
            error => TransportError::Http(error),
        }
    }
}

impl TransportError {
    /// True for failures worth retrying at the transport level: connection
    /// errors, timeouts, and throttling / server-side HTTP statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(_) | TransportError::HttpTimeout(_) => true,
            TransportError::HttpResponse(status, _) => {
                status.as_u16() == 429 || status.as_u16() == 418 || status.is_server_error()
            }
            _ => false,
        }
    }
}
