use crate::{
    backoff::Backoff,
    clock::Clock,
    error::TransportError,
    protocol::http::{BuildStrategy, HttpParser, Recovery, rest::RestRequest},
    rate_limit::RateLimiter,
};
use bytes::Bytes;
use serde::Deserialize;
use std::borrow::Cow;
use tracing::{debug, warn};

/// Configurable REST client capable of executing signed [`RestRequest`]s. Use this when
/// integrating APIs that require Http in order to interact with resources. Each API will require
/// a specific combination of [`Signer`](super::super::private::Signer), [`Mac`](hmac::Mac),
/// signature [`Encoder`](super::super::private::encoder::Encoder), and [`HttpParser`].
///
/// Every execution acquires a token from the shared [`RateLimiter`] before the
/// request leaves the process, and failed executions are retried according to
/// the [`Recovery`] classification returned by the parser:
/// transient failures back off exponentially, clock-skew failures re-align the
/// [`Clock`] against the venue server time and retry once, and everything else
/// surfaces immediately.
#[derive(Debug, Clone)]
pub struct RestClient<'a, Strategy, Parser> {
    /// HTTP [`reqwest::Client`] for executing signed [`reqwest::Request`]s.
    pub http_client: reqwest::Client,

    /// Base Url of the API being interacted with.
    pub base_url: Cow<'a, str>,

    /// [`RestRequest`] build strategy for the API being interacted with that implements
    /// [`BuildStrategy`].
    pub strategy: Strategy,

    /// [`HttpParser`] that deserialises [`RestRequest::Response`]s, and upon failure parses
    /// API errors returned from the server.
    pub parser: Parser,

    /// Token bucket gating every outbound request.
    pub bucket: RateLimiter,

    /// Retry policy applied to transient failures.
    pub backoff: Backoff,

    /// Signed offset added to local time before request signing.
    pub clock: Clock,

    /// Venue path returning `{"serverTime": <ms>}`, used to re-align
    /// [`Self::clock`] after a clock-skew rejection. Clock-skew failures abort
    /// immediately when absent.
    pub time_path: Option<Cow<'static, str>>,
}

#[derive(Deserialize)]
struct ServerTime {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

impl<Strategy, Parser> RestClient<'_, Strategy, Parser>
where
    Strategy: BuildStrategy,
    Parser: HttpParser,
{
    /// Execute the provided [`RestRequest`], retrying per the parser's
    /// [`Recovery`] classification.
    pub async fn execute<Request>(
        &self,
        request: Request,
    ) -> Result<Request::Response, Parser::OutputError>
    where
        Request: RestRequest,
    {
        let mut attempt: u32 = 0;
        let mut clock_synced = false;

        loop {
            // Gate on the shared token bucket (retries included)
            self.bucket.acquire().await;

            let built = self.build(&request)?;
            let result = match self.measured_execution::<Request>(built).await {
                Ok((status, payload)) => self.parser.parse::<Request::Response>(status, &payload),
                Err(transport) => Err(Parser::OutputError::from(transport)),
            };

            let error = match result {
                Ok(response) => {
                    self.bucket.reset_backoff().await;
                    return Ok(response);
                }
                Err(error) => error,
            };

            match self.parser.recovery(&error) {
                Recovery::Abort => return Err(error),
                Recovery::Retry => {
                    if attempt >= self.backoff.max_retries {
                        return Err(error);
                    }
                    if self.parser.is_rate_violation(&error) {
                        self.bucket.report_violation().await;
                    }
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        path = %request.path(),
                        attempt,
                        ?delay,
                        %error,
                        "transient request failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Recovery::SyncClockAndRetry => {
                    // One re-aligned retry only; a second skew rejection means
                    // something other than drift is wrong.
                    if clock_synced || attempt >= self.backoff.max_retries {
                        return Err(error);
                    }
                    self.sync_clock().await?;
                    clock_synced = true;
                    attempt += 1;
                }
            }
        }
    }

    /// Use the provided [`RestRequest`] to construct a Http [`reqwest::Request`], delegating
    /// parameter attachment (and any signing) to the configured [`BuildStrategy`].
    pub fn build<Request>(&self, request: &Request) -> Result<reqwest::Request, TransportError>
    where
        Request: RestRequest,
    {
        // Construct url
        let url = format!("{}{}", self.base_url, request.path());

        // Construct RequestBuilder with method & url
        let builder = self
            .http_client
            .request(Request::method(), url)
            .timeout(Request::timeout());

        // Use RequestBuilder (public or private strategy) to build reqwest::Request
        self.strategy.build(request, builder)
    }

    /// Execute the built [`reqwest::Request`] using the [`reqwest::Client`].
    pub async fn measured_execution<Request>(
        &self,
        request: reqwest::Request,
    ) -> Result<(reqwest::StatusCode, Bytes), TransportError>
    where
        Request: RestRequest,
    {
        let path = request.url().path().to_owned();

        // Measure the HTTP request round trip duration
        let start = std::time::Instant::now();
        let response = self.http_client.execute(request).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let status_code = response.status();
        debug!(
            http_method = %Request::method(),
            %path,
            status_code = %status_code,
            duration_ms,
            "http request executed"
        );

        let payload = response.bytes().await?;
        Ok((status_code, payload))
    }

    /// Fetch the venue server time and re-align the local [`Clock`] offset.
    async fn sync_clock(&self) -> Result<(), TransportError> {
        let Some(time_path) = &self.time_path else {
            return Err(TransportError::RequestBuild(
                "clock-skew rejection but no server time endpoint configured".to_string(),
            ));
        };

        let url = format!("{}{}", self.base_url, time_path);
        let server: ServerTime = self
            .http_client
            .get(url)
            .send()
            .await?
            .json()
            .await
            .map_err(TransportError::from)?;

        let offset = self.clock.align(server.server_time);
        debug!(offset_ms = offset, "clock offset re-aligned to server time");
        Ok(())
    }
}

impl<'a, Strategy, Parser> RestClient<'a, Strategy, Parser> {
    /// Construct a new [`Self`] using the provided configuration.
    ///
    /// Defaults to an unbounded-ish [`RateLimiter`] and conservative retry
    /// policy; override with [`Self::with_bucket`] / [`Self::with_backoff`].
    pub fn new<Url: Into<Cow<'a, str>>>(base_url: Url, strategy: Strategy, parser: Parser) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            strategy,
            parser,
            bucket: RateLimiter::default(),
            backoff: Backoff::default(),
            clock: Clock::default(),
            time_path: None,
        }
    }

    pub fn with_http_client(self, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            ..self
        }
    }

    pub fn with_bucket(self, bucket: RateLimiter) -> Self {
        Self { bucket, ..self }
    }

    pub fn with_backoff(self, backoff: Backoff) -> Self {
        Self { backoff, ..self }
    }

    pub fn with_clock(self, clock: Clock) -> Self {
        Self { clock, ..self }
    }

    pub fn with_time_path<Path: Into<Cow<'static, str>>>(self, time_path: Path) -> Self {
        Self {
            time_path: Some(time_path.into()),
            ..self
        }
    }
}
