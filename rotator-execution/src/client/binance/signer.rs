use rotator_integration::{
    clock::Clock,
    error::TransportError,
    protocol::http::{
        private::{RequestSigner, Signer},
        private::encoder::HexEncoder,
        rest::{RestRequest, SignaturePlacement},
    },
};

pub type BinanceRequestSigner = RequestSigner<BinanceSigner, hmac::Hmac<sha2::Sha256>, HexEncoder>;

const HEADER_KEY_API_KEY: &str = "X-MBX-APIKEY";
const CONVERT_PATH_PREFIX: &str = "/sapi/v1/convert/";

/// Receive window floor and ceiling mandated by the venue.
const RECV_WINDOW_MIN_MS: u64 = 5_000;
const RECV_WINDOW_MAX_MS: u64 = 60_000;

/// Binance HMAC-SHA256 request signing.
///
/// The canonical payload is the url-encoded parameter string with `timestamp`
/// (venue-aligned via [`Clock`]) and `recvWindow` appended; the hex signature
/// is attached as the final `signature` parameter. Convert endpoints always
/// sign with the maximum receive window, everything else uses the configured
/// default.
#[derive(Debug, Clone)]
pub struct BinanceSigner {
    api_key: String,
    clock: Clock,
    recv_window_ms: u64,
}

impl BinanceSigner {
    pub fn new(api_key: String, clock: Clock, recv_window_ms: u64) -> Self {
        Self {
            api_key,
            clock,
            recv_window_ms: recv_window_ms.clamp(RECV_WINDOW_MIN_MS, RECV_WINDOW_MAX_MS),
        }
    }

    fn recv_window_for(path: &str) -> Option<u64> {
        path.contains(CONVERT_PATH_PREFIX).then_some(RECV_WINDOW_MAX_MS)
    }
}

pub struct BinanceSignConfig<'a> {
    pub api_key: &'a str,
    /// Url-encoded parameters including `timestamp` and `recvWindow`; exactly
    /// the bytes covered by the signature.
    pub params: String,
    pub placement: SignaturePlacement,
}

impl Signer for BinanceSigner {
    type Config<'a>
        = BinanceSignConfig<'a>
    where
        Self: 'a;

    fn config<'a, Request>(&'a self, request: &Request) -> Result<Self::Config<'a>, TransportError>
    where
        Request: RestRequest,
    {
        let mut params = request
            .query_params()
            .map(serde_urlencoded::to_string)
            .transpose()?
            .unwrap_or_default();

        let recv_window = Self::recv_window_for(&request.path()).unwrap_or(self.recv_window_ms);
        let timestamp = self.clock.now_ms();

        if !params.is_empty() {
            params.push('&');
        }
        params.push_str(&format!("timestamp={timestamp}&recvWindow={recv_window}"));

        Ok(BinanceSignConfig {
            api_key: self.api_key.as_str(),
            params,
            placement: Request::placement(),
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.params.as_bytes());
    }

    fn build_signed_request<Request>(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        let payload = format!("{}&signature={signature}", config.params);
        let builder = builder.header(HEADER_KEY_API_KEY, config.api_key);

        match config.placement {
            SignaturePlacement::Query => {
                let mut request = builder.build().map_err(TransportError::from)?;
                request.url_mut().set_query(Some(&payload));
                Ok(request)
            }
            SignaturePlacement::FormBody => builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(payload)
                .build()
                .map_err(TransportError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;
    use rotator_integration::protocol::http::BuildStrategy;
    use serde::Serialize;
    use std::borrow::Cow;

    #[derive(Serialize)]
    struct Params {
        #[serde(rename = "fromAsset")]
        from_asset: &'static str,
        #[serde(rename = "toAsset")]
        to_asset: &'static str,
    }

    struct InfoRequest(Params);

    impl RestRequest for InfoRequest {
        type Response = serde_json::Value;
        type QueryParams = Params;
        type Body = ();

        fn path(&self) -> Cow<'static, str> {
            "/sapi/v1/convert/exchangeInfo".into()
        }

        fn method() -> reqwest::Method {
            reqwest::Method::GET
        }

        fn query_params(&self) -> Option<&Self::QueryParams> {
            Some(&self.0)
        }
    }

    fn signer_for(secret: &str) -> (BinanceSigner, BinanceRequestSigner) {
        let clock = Clock::new();
        let signer = BinanceSigner::new("api-key".to_string(), clock.clone(), 5_000);
        let mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        (
            signer.clone(),
            BinanceRequestSigner::new(signer, mac, HexEncoder),
        )
    }

    #[test]
    fn test_signature_covers_exact_query_string() {
        let secret = "test-secret";
        let (_, strategy) = signer_for(secret);
        let http = reqwest::Client::new();

        let request = InfoRequest(Params {
            from_asset: "BTC",
            to_asset: "USDT",
        });
        let built = strategy
            .build(
                &request,
                http.get("https://api.binance.com/sapi/v1/convert/exchangeInfo"),
            )
            .unwrap();

        let query = built.url().query().unwrap().to_string();
        let (params, signature) = query
            .rsplit_once("&signature=")
            .expect("signature must be the final parameter");

        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(params.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(signature, expected);

        // deterministic parameter order with timestamp & recvWindow appended
        assert!(params.starts_with("fromAsset=BTC&toAsset=USDT&timestamp="));
        assert!(params.contains("&recvWindow=60000"));

        assert_eq!(
            built.headers().get(HEADER_KEY_API_KEY).unwrap(),
            "api-key"
        );
    }

    #[test]
    fn test_convert_paths_force_max_recv_window() {
        assert_eq!(
            BinanceSigner::recv_window_for("/sapi/v1/convert/getQuote"),
            Some(60_000)
        );
        assert_eq!(BinanceSigner::recv_window_for("/api/v3/account"), None);
    }

    #[test]
    fn test_recv_window_clamped() {
        let clock = Clock::new();
        let low = BinanceSigner::new("k".into(), clock.clone(), 100);
        assert_eq!(low.recv_window_ms, 5_000);
        let high = BinanceSigner::new("k".into(), clock, 120_000);
        assert_eq!(high.recv_window_ms, 60_000);
    }
}
