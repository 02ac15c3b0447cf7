//! # Rotator
//! Scheduled rebalancing loop over a centralized exchange's Convert facility.
//! Each region-scoped run walks `pre-analyze -> analyze -> trade -> guard`
//! under an exclusive lock: snapshot holdings and convertibility, rank
//! candidate targets from market data, diff desired vs. actual allocation into
//! swap actions, settle them through the signed Convert gateway, and enforce
//! the drawdown stop.

/// Application errors.
pub mod error;

/// Asset symbol normalization (leveraged-token suffixes, Earn wrappers).
pub mod asset;

/// Convert route resolution over the venue pair table.
pub mod route;

/// Candidate scoring and shortlisting.
pub mod ranker;

/// Target allocation and rebalance diffing.
pub mod planner;

/// Durable position state with per-asset and portfolio peaks.
pub mod position;

/// Drawdown stop policy.
pub mod guard;

/// Region windows, startup jitter and the per-region exclusive lock.
pub mod scheduler;

/// Read-once process configuration.
pub mod config;

/// Tracing subscriber setup and the per-day artifact directory.
pub mod logging;

/// CSV / JSON audit artifact writers.
pub mod report;

/// Phase orchestration wiring the gateways, strategy and persistence together.
pub mod app;
