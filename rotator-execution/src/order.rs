use crate::balance::Wallet;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Time-bounded commitment by the venue to swap `from_asset` into `to_asset`
/// at `ratio`. Immutable once returned; stateful only via its `quote_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quote {
    pub quote_id: String,
    pub from_asset: SmolStr,
    pub to_asset: SmolStr,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub ratio: Decimal,
    pub inverse_ratio: Decimal,
    /// Millisecond timestamp after which the venue no longer honours this quote.
    pub valid_timestamp: i64,
    pub wallet: Wallet,
}

impl Quote {
    /// True while the venue still honours this quote at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.valid_timestamp
    }
}

/// Convert order resulting from an accepted [`Quote`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Order {
    pub order_id: String,
    pub quote_id: Option<String>,
    pub status: OrderStatus,
    pub from_asset: SmolStr,
    pub from_amount: Decimal,
    pub to_asset: SmolStr,
    pub to_amount: Decimal,
    pub ratio: Decimal,
    pub create_time: DateTime<Utc>,
}

/// Lifecycle: `Process` -> terminal, one-way.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Process,
    Success,
    Fail,
    Expired,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Process)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            OrderStatus::Process => "PROCESS",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Fail => "FAIL",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Canceled => "CANCELED",
        };
        write!(f, "{status}")
    }
}

/// One Convert hop.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Constructor)]
pub struct RouteStep {
    pub from_asset: SmolStr,
    pub to_asset: SmolStr,
}

/// Ordered non-empty sequence of Convert hops from one asset to another,
/// possibly through hub assets. Quote limits are those of the first step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConvertRoute {
    pub steps: Vec<RouteStep>,
    pub min_quote: Decimal,
    pub max_quote: Decimal,
}

impl ConvertRoute {
    /// Single-hop route.
    pub fn direct(
        from: impl Into<SmolStr>,
        to: impl Into<SmolStr>,
        min_quote: Decimal,
        max_quote: Decimal,
    ) -> Self {
        Self {
            steps: vec![RouteStep::new(from.into(), to.into())],
            min_quote,
            max_quote,
        }
    }

    /// Two-hop route through `hub`.
    pub fn via_hub(
        from: impl Into<SmolStr>,
        hub: impl Into<SmolStr>,
        to: impl Into<SmolStr>,
        min_quote: Decimal,
        max_quote: Decimal,
    ) -> Self {
        let hub = hub.into();
        Self {
            steps: vec![
                RouteStep::new(from.into(), hub.clone()),
                RouteStep::new(hub, to.into()),
            ],
            min_quote,
            max_quote,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.steps.len() == 1
    }

    /// True when the step chain is non-empty and contiguous
    /// (`steps[i].to_asset == steps[i+1].from_asset`).
    pub fn is_contiguous(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .windows(2)
                .all(|pair| pair[0].to_asset == pair[1].from_asset)
    }

    /// Short human label: `direct` or `hub:<HUB>|<HUB>`.
    pub fn description(&self) -> String {
        if self.is_direct() {
            return "direct".to_string();
        }
        let hubs = self
            .steps
            .iter()
            .take(self.steps.len().saturating_sub(1))
            .map(|step| step.to_asset.as_str())
            .collect::<Vec<_>>()
            .join("|");
        format!("hub:{hubs}")
    }
}

impl fmt::Display for ConvertRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}->{}", step.from_asset, step.to_asset)?;
            first = false;
        }
        Ok(())
    }
}

/// A swap the planner (or guard) wants settled. `amount` is in units of
/// `from_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Constructor)]
pub struct RebalanceAction {
    pub from_asset: SmolStr,
    pub to_asset: SmolStr,
    pub amount: Decimal,
    pub route: ConvertRoute,
}

/// Append-only audit record, one per executed (or skipped) Convert leg.
///
/// `order_id` is present whenever `accepted` is true and the leg produced a
/// venue order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConvertHistoryRecord {
    #[serde(rename = "quoteId")]
    pub quote_id: Option<String>,
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub from_token: SmolStr,
    pub to_token: SmolStr,
    pub ratio: Option<Decimal>,
    #[serde(rename = "inverseRatio")]
    pub inverse_ratio: Option<Decimal>,
    pub from_amount: Option<Decimal>,
    pub to_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prob_up: Option<f64>,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
