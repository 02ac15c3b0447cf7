use rotator_integration::error::TransportError;
use std::fmt;
use thiserror::Error;

/// All errors surfaced by venue clients in `rotator-execution`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connectivity: {0}")]
    Connectivity(#[from] TransportError),

    #[error("Api: {0}")]
    Api(#[from] ApiError),

    /// Rejected locally by the cycle budget before any network IO.
    #[error("throttled: {0}")]
    Throttled(ThrottleReason),

    /// Caller-side misuse (empty quoteId, oversized tradeFlow span, ...).
    /// Fails immediately; retrying is pointless.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ClientError {
    /// Error code carried by the venue rejection, if any.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            ClientError::Api(api) => api.code(),
            _ => None,
        }
    }
}

/// Typed Binance rejections. The variant determines the policy applied by the
/// [`RestClient`](rotator_integration::protocol::http::rest::client::RestClient)
/// retry loop and, further up, by the executor.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ApiError {
    /// `-1003` or a throttling HTTP status: retry with backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// `-1021`: local timestamp outside the venue receive window. Re-align
    /// the clock offset and retry once.
    #[error("timestamp outside recvWindow: {0}")]
    ClockSkew(String),

    /// `-1022`: the signature did not verify. Configuration error.
    #[error("signature for this request is not valid: {0}")]
    SignatureInvalid(String),

    /// `-1102`: mandatory parameter missing. Programming error.
    #[error("mandatory parameter missing: {0}")]
    MissingParameter(String),

    /// `-1111`: parameter outside venue precision rules.
    #[error("parameter invalid: {0}")]
    InvalidParameter(String),

    /// `-2015`: API key lacks Convert permission or IP is not whitelisted.
    #[error("api-key permission denied: {0}")]
    PermissionDenied(String),

    /// `-2010`: balance insufficient for the requested fromAmount.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Venue reported the quote as expired or no longer valid.
    #[error("quote expired: {0}")]
    QuoteExpired(String),

    /// `345239` or an "hourly"/"daily" quota body: Convert quota exhausted,
    /// the remaining cycle must throttle.
    #[error("convert quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Remaining business-rule rejections (below minimum, above maximum,
    /// asset delisted, pair suspended): skip the action and continue.
    #[error("business rule rejection (code={code}): {msg}")]
    BusinessRule { code: i64, msg: String },

    #[error("venue error (code={code}): {msg}")]
    Other { code: i64, msg: String },
}

impl ApiError {
    /// Canonical venue error code for this rejection, if one exists.
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::RateLimited(_) => Some(-1003),
            ApiError::ClockSkew(_) => Some(-1021),
            ApiError::SignatureInvalid(_) => Some(-1022),
            ApiError::MissingParameter(_) => Some(-1102),
            ApiError::InvalidParameter(_) => Some(-1111),
            ApiError::PermissionDenied(_) => Some(-2015),
            ApiError::InsufficientBalance(_) => Some(-2010),
            ApiError::QuoteExpired(_) => None,
            ApiError::QuotaExhausted(_) => Some(345239),
            ApiError::BusinessRule { code, .. } | ApiError::Other { code, .. } => Some(*code),
        }
    }

    /// True for rejections the executor records and skips without aborting
    /// the remaining actions of the cycle.
    pub fn is_business_skip(&self) -> bool {
        matches!(
            self,
            ApiError::InsufficientBalance(_)
                | ApiError::InvalidParameter(_)
                | ApiError::BusinessRule { .. }
        )
    }
}

/// Reason the local cycle budget rejected a request.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ThrottleReason {
    DailyQuota { count: u32, limit: u32 },
    CycleRequests { count: u32, max: u32 },
    CycleWeight { weight: u64, max: u64 },
}

impl fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleReason::DailyQuota { count, limit } => {
                write!(f, "daily quote quota reached ({count}/{limit})")
            }
            ThrottleReason::CycleRequests { count, max } => {
                write!(f, "per-cycle request cap reached ({count}/{max})")
            }
            ThrottleReason::CycleWeight { weight, max } => {
                write!(f, "per-cycle weight ceiling reached ({weight}/{max})")
            }
        }
    }
}
