use crate::{
    amounts::floor_8dp,
    balance::Wallet,
    client::binance::{AcceptedQuote, BinanceConvertClient, OrderLookup},
    error::{ApiError, ClientError},
    order::{ConvertHistoryRecord, OrderStatus, Quote, RebalanceAction},
};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub wallet: Wallet,
    /// Gap between orderStatus polls.
    pub poll_interval: Duration,
    /// Wall-clock deadline for the whole poll loop.
    pub poll_deadline: Duration,
    /// tradeFlow window searched when an accept outcome was lost to the
    /// network.
    pub reconcile_lookback: Duration,
    /// Log would-be actions and skip every signed POST.
    pub dry_run: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            wallet: Wallet::Spot,
            poll_interval: Duration::from_secs(2),
            poll_deadline: Duration::from_secs(60),
            reconcile_lookback: Duration::from_secs(3600),
            dry_run: false,
        }
    }
}

/// Terminal classification of one action (the weakest of its legs).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ActionStatus {
    /// Every leg settled with venue status SUCCESS.
    Executed,
    /// Dry-run: quotes fetched, nothing accepted.
    DryRun,
    /// Rejected before acceptance (business rule, throttle, expiry).
    Skipped,
    /// Accepted but did not settle, or an infrastructure failure.
    Failed,
}

/// Outcome of executing one [`RebalanceAction`], with one audit record per
/// Convert leg.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub records: Vec<ConvertHistoryRecord>,
}

impl ActionOutcome {
    pub fn executed(&self) -> bool {
        self.status == ActionStatus::Executed
    }
}

#[derive(Debug)]
struct LegOutcome {
    status: ActionStatus,
    record: ConvertHistoryRecord,
    /// Amount available to the next leg of a hub route.
    next_amount: Option<Decimal>,
}

/// Drives each [`RebalanceAction`] through the quote lifecycle:
///
/// ```text
/// IDLE --getQuote--> QUOTED --acceptQuote--> ACCEPTED --orderStatus--> {SUCCESS, FAIL}
///                      |                                         ^
///                      +-- validTimestamp expired --- re-quote --+
/// ```
///
/// Expired or venue-invalidated quotes earn exactly one re-quote per leg.
/// Acceptance runs behind the client's idempotency shield. A network failure
/// after an accept was issued is reconciled through `tradeFlow` before the
/// leg is declared failed.
#[derive(Debug, Clone)]
pub struct ConvertExecutor {
    client: BinanceConvertClient,
    config: ExecutorConfig,
}

impl ConvertExecutor {
    pub fn new(client: BinanceConvertClient, config: ExecutorConfig) -> Self {
        Self { client, config }
    }

    /// Execute every leg of `action`, feeding each leg's settled amount into
    /// the next. `score` is carried into the audit records when the action
    /// originated from a ranked candidate.
    pub async fn execute(&self, action: &RebalanceAction, score: Option<f64>) -> ActionOutcome {
        let mut records = Vec::with_capacity(action.route.steps.len());
        let mut status = ActionStatus::Executed;
        let mut amount = action.amount;

        if !action.route.is_contiguous() {
            return ActionOutcome {
                status: ActionStatus::Skipped,
                records: vec![self.record_without_quote(
                    &action.from_asset,
                    &action.to_asset,
                    None,
                    Some("route steps are not contiguous".to_string()),
                )],
            };
        }

        for step in &action.route.steps {
            let leg = self
                .execute_leg(&step.from_asset, &step.to_asset, amount, score)
                .await;

            info!(
                from = %step.from_asset,
                to = %step.to_asset,
                status = ?leg.status,
                quote_id = leg.record.quote_id.as_deref().unwrap_or("-"),
                order_id = leg.record.order_id.as_deref().unwrap_or("-"),
                reason = leg.record.error_msg.as_deref().unwrap_or("-"),
                "convert leg finished"
            );

            let leg_status = leg.status;
            let next_amount = leg.next_amount;
            records.push(leg.record);

            match leg_status {
                ActionStatus::Executed | ActionStatus::DryRun => {
                    if leg_status == ActionStatus::DryRun {
                        status = ActionStatus::DryRun;
                    }
                    match next_amount {
                        Some(next) => amount = next,
                        None => break,
                    }
                }
                other => {
                    status = other;
                    break;
                }
            }
        }

        ActionOutcome { status, records }
    }

    async fn execute_leg(
        &self,
        from_asset: &SmolStr,
        to_asset: &SmolStr,
        amount: Decimal,
        score: Option<f64>,
    ) -> LegOutcome {
        // Route limits come from the pair's exchangeInfo (TTL-cached).
        let pair = match self.client.exchange_info(from_asset, to_asset).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                return self.leg_skipped(from_asset, to_asset, None, "pair not convertible");
            }
            Err(error) => return self.leg_client_error(from_asset, to_asset, None, error),
        };

        let mut amount = floor_8dp(amount);
        let (min_quote, max_quote) = (pair.min_quote(), pair.max_quote());
        if min_quote > Decimal::ZERO && amount < min_quote {
            return self.leg_skipped(
                from_asset,
                to_asset,
                None,
                &format!("amount {amount} below pair minimum {min_quote}"),
            );
        }
        if max_quote > Decimal::ZERO && amount > max_quote {
            amount = max_quote;
        }

        // QUOTED
        let mut requotes_left: u8 = 1;
        let mut quote = match self
            .client
            .get_quote(from_asset, to_asset, amount, self.config.wallet)
            .await
        {
            Ok(quote) => quote,
            Err(error) => return self.leg_client_error(from_asset, to_asset, None, error),
        };

        // Expiry check before acceptance, with a single re-quote.
        while !quote.is_valid_at(self.client.clock().now_ms()) {
            if requotes_left == 0 {
                return self.leg_skipped_with_quote(&quote, "quote expired");
            }
            requotes_left -= 1;
            quote = match self
                .client
                .get_quote(from_asset, to_asset, amount, self.config.wallet)
                .await
            {
                Ok(quote) => quote,
                Err(error) => return self.leg_client_error(from_asset, to_asset, None, error),
            };
        }

        if self.config.dry_run {
            let mut record = self.record_from_quote(&quote, score);
            record.error_msg = Some("dry-run".to_string());
            return LegOutcome {
                status: ActionStatus::DryRun,
                record,
                next_amount: Some(quote.to_amount),
            };
        }

        // ACCEPTED
        let accepted = loop {
            match self.client.accept_quote(&quote.quote_id).await {
                Ok(accepted) => break accepted,
                Err(ClientError::Api(ApiError::QuoteExpired(msg))) if requotes_left > 0 => {
                    requotes_left -= 1;
                    warn!(quote_id = %quote.quote_id, %msg, "venue invalidated quote, re-quoting");
                    quote = match self
                        .client
                        .get_quote(from_asset, to_asset, amount, self.config.wallet)
                        .await
                    {
                        Ok(quote) => quote,
                        Err(error) => {
                            return self.leg_client_error(from_asset, to_asset, None, error);
                        }
                    };
                }
                Err(ClientError::Api(ApiError::QuoteExpired(_))) => {
                    return self.leg_skipped_with_quote(&quote, "quote expired");
                }
                // The accept may or may not have reached the venue: check
                // tradeFlow before concluding failure.
                Err(ClientError::Connectivity(error)) => {
                    return self.reconcile_leg(&quote, error.to_string(), score).await;
                }
                Err(error) => return self.leg_client_error(from_asset, to_asset, Some(&quote), error),
            }
        };

        let AcceptedQuote {
            order_id,
            duplicate,
            ..
        } = accepted;

        if duplicate {
            // Success-like synthetic outcome; accepted stays false since the
            // history schema ties accepted=true to a venue orderId.
            let mut record = self.record_from_quote(&quote, score);
            record.error_msg = Some("duplicate acceptQuote suppressed".to_string());
            return LegOutcome {
                status: ActionStatus::Executed,
                record,
                next_amount: Some(quote.to_amount),
            };
        }

        let Some(order_id) = order_id else {
            let mut record = self.record_from_quote(&quote, score);
            record.error_msg = Some("acceptQuote returned no orderId".to_string());
            return LegOutcome {
                status: ActionStatus::Failed,
                record,
                next_amount: None,
            };
        };

        // POLLING: only SUCCESS counts as executed.
        self.poll_order(&quote, order_id, score).await
    }

    async fn poll_order(&self, quote: &Quote, order_id: String, score: Option<f64>) -> LegOutcome {
        let deadline = Instant::now() + self.config.poll_deadline;

        loop {
            match self
                .client
                .order_status(OrderLookup::OrderId(order_id.clone()))
                .await
            {
                Ok(order) if order.status.is_terminal() => {
                    let mut record = self.record_from_quote(quote, score);
                    record.accepted = true;
                    record.order_id = Some(order.order_id);
                    record.to_amount = Some(order.to_amount);

                    return if order.status == OrderStatus::Success {
                        LegOutcome {
                            status: ActionStatus::Executed,
                            record,
                            next_amount: Some(order.to_amount),
                        }
                    } else {
                        record.error_msg = Some(format!("terminal status {}", order.status));
                        LegOutcome {
                            status: ActionStatus::Failed,
                            record,
                            next_amount: None,
                        }
                    };
                }
                Ok(_) => {}
                Err(ClientError::Connectivity(error)) => {
                    warn!(order_id, %error, "orderStatus poll failed, retrying until deadline");
                }
                Err(error) => {
                    let mut record = self.record_from_quote(quote, score);
                    record.accepted = true;
                    record.order_id = Some(order_id);
                    record.error_code = error.api_code();
                    record.error_msg = Some(error.to_string());
                    return LegOutcome {
                        status: ActionStatus::Failed,
                        record,
                        next_amount: None,
                    };
                }
            }

            if Instant::now() >= deadline {
                let mut record = self.record_from_quote(quote, score);
                record.accepted = true;
                record.order_id = Some(order_id);
                record.error_msg = Some("orderStatus poll deadline exceeded".to_string());
                return LegOutcome {
                    status: ActionStatus::Failed,
                    record,
                    next_amount: None,
                };
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// The accept outcome was lost to the network: search recent tradeFlow
    /// for an order spawned by this quote before concluding failure.
    async fn reconcile_leg(&self, quote: &Quote, error: String, score: Option<f64>) -> LegOutcome {
        warn!(
            quote_id = %quote.quote_id,
            %error,
            "network failure after acceptQuote was issued, reconciling via tradeFlow"
        );

        match self
            .client
            .reconcile_quote(&quote.quote_id, self.config.reconcile_lookback)
            .await
        {
            Ok(Some(trade)) => {
                let mut record = self.record_from_quote(quote, score);
                record.accepted = true;
                record.order_id = Some(trade.order_id.clone());
                record.to_amount = Some(trade.to_amount);

                if trade.order_status == OrderStatus::Success {
                    LegOutcome {
                        status: ActionStatus::Executed,
                        record,
                        next_amount: Some(trade.to_amount),
                    }
                } else {
                    record.error_msg =
                        Some(format!("reconciled terminal status {}", trade.order_status));
                    LegOutcome {
                        status: ActionStatus::Failed,
                        record,
                        next_amount: None,
                    }
                }
            }
            Ok(None) => {
                let mut record = self.record_from_quote(quote, score);
                record.error_msg = Some(format!("accept outcome unknown ({error}), not in tradeFlow"));
                LegOutcome {
                    status: ActionStatus::Failed,
                    record,
                    next_amount: None,
                }
            }
            Err(reconcile_error) => {
                let mut record = self.record_from_quote(quote, score);
                record.error_msg = Some(format!(
                    "accept outcome unknown ({error}), reconcile failed ({reconcile_error})"
                ));
                LegOutcome {
                    status: ActionStatus::Failed,
                    record,
                    next_amount: None,
                }
            }
        }
    }

    fn record_from_quote(&self, quote: &Quote, score: Option<f64>) -> ConvertHistoryRecord {
        ConvertHistoryRecord {
            quote_id: Some(quote.quote_id.clone()),
            order_id: None,
            from_token: quote.from_asset.clone(),
            to_token: quote.to_asset.clone(),
            ratio: Some(quote.ratio),
            inverse_ratio: Some(quote.inverse_ratio),
            from_amount: Some(quote.from_amount),
            to_amount: Some(quote.to_amount),
            score,
            expected_profit: None,
            prob_up: None,
            accepted: false,
            error_code: None,
            error_msg: None,
            timestamp: self.client.clock().now_ms(),
        }
    }

    fn record_without_quote(
        &self,
        from_asset: &SmolStr,
        to_asset: &SmolStr,
        error_code: Option<i64>,
        error_msg: Option<String>,
    ) -> ConvertHistoryRecord {
        ConvertHistoryRecord {
            quote_id: None,
            order_id: None,
            from_token: from_asset.clone(),
            to_token: to_asset.clone(),
            ratio: None,
            inverse_ratio: None,
            from_amount: None,
            to_amount: None,
            score: None,
            expected_profit: None,
            prob_up: None,
            accepted: false,
            error_code,
            error_msg,
            timestamp: self.client.clock().now_ms(),
        }
    }

    fn leg_skipped(
        &self,
        from_asset: &SmolStr,
        to_asset: &SmolStr,
        code: Option<i64>,
        reason: &str,
    ) -> LegOutcome {
        LegOutcome {
            status: ActionStatus::Skipped,
            record: self.record_without_quote(from_asset, to_asset, code, Some(reason.to_string())),
            next_amount: None,
        }
    }

    fn leg_skipped_with_quote(&self, quote: &Quote, reason: &str) -> LegOutcome {
        let mut record = self.record_from_quote(quote, None);
        record.error_msg = Some(reason.to_string());
        LegOutcome {
            status: ActionStatus::Skipped,
            record,
            next_amount: None,
        }
    }

    fn leg_client_error(
        &self,
        from_asset: &SmolStr,
        to_asset: &SmolStr,
        quote: Option<&Quote>,
        error: ClientError,
    ) -> LegOutcome {
        let status = match &error {
            ClientError::Throttled(_) => ActionStatus::Skipped,
            ClientError::Api(api) if api.is_business_skip() => ActionStatus::Skipped,
            ClientError::Api(ApiError::QuotaExhausted(_)) => ActionStatus::Skipped,
            _ => ActionStatus::Failed,
        };

        let mut record = match quote {
            Some(quote) => self.record_from_quote(quote, None),
            None => self.record_without_quote(from_asset, to_asset, None, None),
        };
        record.error_code = error.api_code();
        record.error_msg = Some(error.to_string());

        LegOutcome {
            status,
            record,
            next_amount: None,
        }
    }
}
