use crate::error::{ApiError, ClientError};
use rotator_integration::{
    error::TransportError,
    protocol::http::{HttpParser, Recovery},
};
use serde::{Deserialize, Serialize};

/// Parses Binance REST payloads: successful responses deserialise into the
/// request's `Response`, failures into the `{code, msg}` error body which is
/// then mapped onto the [`ApiError`] taxonomy driving retry / skip decisions.
#[derive(Debug, Clone)]
pub struct BinanceParser;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceHttpError {
    pub code: i64,
    pub msg: String,
}

impl BinanceParser {
    fn classify(error: BinanceHttpError) -> ApiError {
        let BinanceHttpError { code, msg } = error;
        let lower = msg.to_ascii_lowercase();

        match code {
            -1003 => ApiError::RateLimited(msg),
            -1021 => ApiError::ClockSkew(msg),
            -1022 => ApiError::SignatureInvalid(msg),
            -1102 => ApiError::MissingParameter(msg),
            -1111 => ApiError::InvalidParameter(msg),
            -2015 => ApiError::PermissionDenied(msg),
            -2010 => ApiError::InsufficientBalance(msg),
            345239 => ApiError::QuotaExhausted(msg),
            _ if lower.contains("hourly") || lower.contains("daily limit") => {
                ApiError::QuotaExhausted(msg)
            }
            _ if lower.contains("quote") && (lower.contains("expire") || lower.contains("invalid")) => {
                ApiError::QuoteExpired(msg)
            }
            // Convert business rejections share the 345xxx block (below
            // minimum, above maximum, pair suspended, asset delisted).
            code if (345000..346000).contains(&code) => ApiError::BusinessRule { code, msg },
            -2011 => ApiError::BusinessRule { code, msg },
            code => ApiError::Other { code, msg },
        }
    }
}

impl HttpParser for BinanceParser {
    type ApiError = BinanceHttpError;
    type OutputError = ClientError;

    fn parse_api_error(
        &self,
        _status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        ClientError::Api(Self::classify(error))
    }

    fn recovery(&self, error: &Self::OutputError) -> Recovery {
        match error {
            ClientError::Connectivity(transport) if transport.is_transient() => Recovery::Retry,
            ClientError::Api(ApiError::RateLimited(_)) => Recovery::Retry,
            ClientError::Api(ApiError::ClockSkew(_)) => Recovery::SyncClockAndRetry,
            _ => Recovery::Abort,
        }
    }

    fn is_rate_violation(&self, error: &Self::OutputError) -> bool {
        match error {
            ClientError::Api(ApiError::RateLimited(_)) => true,
            ClientError::Connectivity(TransportError::HttpResponse(status, _)) => {
                status.as_u16() == 429 || status.as_u16() == 418
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: i64, msg: &str) -> ApiError {
        BinanceParser::classify(BinanceHttpError {
            code,
            msg: msg.to_string(),
        })
    }

    #[test]
    fn test_code_taxonomy() {
        assert!(matches!(classify(-1003, "too many"), ApiError::RateLimited(_)));
        assert!(matches!(classify(-1021, "ahead of time"), ApiError::ClockSkew(_)));
        assert!(matches!(
            classify(-1022, "bad signature"),
            ApiError::SignatureInvalid(_)
        ));
        assert!(matches!(
            classify(-1102, "param missing"),
            ApiError::MissingParameter(_)
        ));
        assert!(matches!(
            classify(-2015, "invalid api-key"),
            ApiError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(345239, "limit reached"),
            ApiError::QuotaExhausted(_)
        ));
        assert!(matches!(
            classify(100001, "hourly convert limit"),
            ApiError::QuotaExhausted(_)
        ));
        assert!(matches!(
            classify(100002, "Quote expired, please requote"),
            ApiError::QuoteExpired(_)
        ));
        assert!(matches!(
            classify(345233, "amount below minimum"),
            ApiError::BusinessRule { code: 345233, .. }
        ));
    }

    #[test]
    fn test_recovery_classes() {
        let parser = BinanceParser;

        let retry = ClientError::Api(ApiError::RateLimited("slow down".into()));
        assert_eq!(parser.recovery(&retry), Recovery::Retry);
        assert!(parser.is_rate_violation(&retry));

        let skew = ClientError::Api(ApiError::ClockSkew("outside window".into()));
        assert_eq!(parser.recovery(&skew), Recovery::SyncClockAndRetry);

        let fatal = ClientError::Api(ApiError::SignatureInvalid("nope".into()));
        assert_eq!(parser.recovery(&fatal), Recovery::Abort);

        let business = ClientError::Api(ApiError::BusinessRule {
            code: 345233,
            msg: "below min".into(),
        });
        assert_eq!(parser.recovery(&business), Recovery::Abort);
    }
}
