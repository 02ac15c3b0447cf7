//! # Rotator-Integration
//! Low-level plumbing for composing signed REST integrations with centralized
//! exchanges. Provides a flexible [`RestClient`](protocol::http::rest::client::RestClient)
//! with pluggable request signing, a token-bucket [`RateLimiter`](rate_limit::RateLimiter),
//! a categorized retry loop with exponential [`Backoff`](backoff::Backoff), and
//! clock-offset tracking for venues that reject requests signed with a skewed
//! local clock.

/// Transport-level errors generated by `rotator-integration`.
pub mod error;

/// Defines an abstract `RestRequest` and the signing / parsing traits used to
/// execute it against a venue.
pub mod protocol;

/// Token-bucket rate limiting shared by every outbound request.
pub mod rate_limit;

/// Exponential backoff policy with bounded jitter.
pub mod backoff;

/// Signed clock offset applied to request timestamps before signing.
pub mod clock;
