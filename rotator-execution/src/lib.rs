//! # Rotator-Execution
//! Binance Convert venue integration: signed quote lifecycle wrappers
//! (`exchangeInfo`, `getQuote`, `acceptQuote`, `orderStatus`, `tradeFlow`),
//! public market data, wallet balances, per-cycle request/weight accounting,
//! and the [`ConvertExecutor`](executor::ConvertExecutor) state machine that
//! settles rebalance actions through them.

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Errors generated by venue clients, split into connectivity and typed API
/// rejections that drive the retry / skip policy.
pub mod error;

/// Convert domain records: quotes, orders, routes, rebalance actions and the
/// append-only history schema.
pub mod order;

/// Amount flooring and wire formatting rules for Convert `fromAmount`s.
pub mod amounts;

/// Signed venue clients.
pub mod client;

/// Public Spot market data gateway.
pub mod market;

/// Wallet balance reading.
pub mod balance;

/// Per-cycle request count / endpoint weight accounting and the persistent
/// daily quote quota.
pub mod counters;

/// Quote -> accept -> order-status execution state machine.
pub mod executor;

/// Venue API credentials.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}
