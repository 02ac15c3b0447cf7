use clap::{Parser, Subcommand};
use rotator::{
    app::App,
    config::Config,
    error::AppError,
    logging,
    ranker::{self, composite_score},
    scheduler::{Phase, Region},
};
use rotator_execution::{
    balance::Wallet,
    client::binance::OrderLookup,
    order::OrderStatus,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "rotator", about = "Convert rebalancing loop and quote tooling")]
struct Cli {
    /// Enable debug logs.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn parse_wallet(raw: &str) -> Result<Wallet, String> {
    raw.parse()
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("expected 0 or 1, got {other}")),
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show Convert limits and balances for a pair.
    Info {
        from_asset: String,
        to_asset: String,
    },
    /// Fetch a convert quote without accepting it.
    Quote {
        from_asset: String,
        to_asset: String,
        amount: Decimal,
        #[arg(long, default_value = "SPOT", value_parser = parse_wallet)]
        wallet: Wallet,
    },
    /// Execute a conversion immediately (quote, accept, settle).
    Now {
        from_asset: String,
        to_asset: String,
        amount: Decimal,
        #[arg(long, default_value = "SPOT", value_parser = parse_wallet)]
        wallet: Wallet,
        #[arg(long, value_parser = parse_switch)]
        dry_run: Option<bool>,
    },
    /// Check the status of a convert order.
    Status { order_id: String },
    /// Show recent Convert trade history.
    Trades {
        #[arg(long, default_value_t = 24)]
        hours: i64,
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long)]
        detailed: bool,
    },
    /// Invoke one auto-cycle phase for a region.
    Run {
        #[arg(long)]
        region: Region,
        #[arg(long)]
        phase: Phase,
        #[arg(long, value_parser = parse_switch)]
        dry_run: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_logging_with_default(tracing_subscriber::filter::LevelFilter::DEBUG);
    } else {
        logging::init_logging();
    }

    match dispatch(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("command failed: {err}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(command: Command) -> Result<u8, AppError> {
    let app = App::new(Config::from_env()?)?;

    match command {
        Command::Info {
            from_asset,
            to_asset,
        } => cmd_info(&app, &from_asset, &to_asset).await,
        Command::Quote {
            from_asset,
            to_asset,
            amount,
            wallet,
        } => cmd_quote(&app, &from_asset, &to_asset, amount, wallet).await,
        Command::Now {
            from_asset,
            to_asset,
            amount,
            wallet,
            dry_run,
        } => cmd_now(&app, &from_asset, &to_asset, amount, wallet, dry_run).await,
        Command::Status { order_id } => cmd_status(&app, order_id).await,
        Command::Trades {
            hours,
            limit,
            detailed,
        } => cmd_trades(&app, hours, limit, detailed).await,
        Command::Run {
            region,
            phase,
            dry_run,
        } => {
            // A cancellation signal during any sleep ends the cycle cleanly;
            // in-flight actions are reconciled via tradeFlow next cycle.
            let phases = [phase];
            tokio::select! {
                code = app.run(region, &phases, dry_run) => Ok(code),
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!(%region, %phase, "interrupted, terminating cycle");
                    Ok(phase.exit_bit())
                }
            }
        }
    }
}

async fn cmd_info(app: &App, from_asset: &str, to_asset: &str) -> Result<u8, AppError> {
    let from_asset = from_asset.to_ascii_uppercase();
    let to_asset = to_asset.to_ascii_uppercase();

    println!("Pair: {from_asset}/{to_asset}");
    match app.client().exchange_info(&from_asset, &to_asset).await? {
        Some(pair) => {
            println!("Min amount: {}", pair.min_quote());
            if pair.max_quote() > Decimal::ZERO {
                println!("Max amount: {}", pair.max_quote());
            }
        }
        None => println!("Pair not convertible"),
    }

    if let Ok(precisions) = app.client().asset_info().await {
        for asset in [&from_asset, &to_asset] {
            if let Some(precision) = precisions.iter().find(|row| row.asset == *asset) {
                println!("{asset} fraction: {}", precision.fraction);
            }
        }
    }

    for wallet in [Wallet::Spot, Wallet::Funding] {
        let from_free = app.balances().read_free(&from_asset, wallet).await?;
        let to_free = app.balances().read_free(&to_asset, wallet).await?;
        println!("{wallet}: {from_asset}={from_free} {to_asset}={to_free}");
    }
    Ok(0)
}

/// Composite pair score over the live quote ratio and Spot references;
/// `None` when no mid reference exists.
async fn pair_score(app: &App, from_asset: &str, to_asset: &str, ratio: Decimal) -> Option<f64> {
    let market = app.market();
    let mid = market.mid_price_cross(from_asset, to_asset).await?;

    let symbol = format!("{from_asset}{to_asset}");
    let (liquidity, momentum, spread) = match market.ticker_24hr(&symbol).await {
        Ok(Some(stats)) => {
            let qvol = stats.quote_volume.to_f64().unwrap_or(0.0);
            let chg = stats.price_change_percent.to_f64().unwrap_or(0.0);
            let spread = ranker::spread_bps(
                stats
                    .bid_price
                    .and_then(|price| price.to_f64())
                    .unwrap_or(0.0),
                stats
                    .ask_price
                    .and_then(|price| price.to_f64())
                    .unwrap_or(0.0),
            );
            (
                (qvol.max(0.0) + 1.0).log10() / 10.0,
                chg.clamp(-50.0, 50.0) / 100.0,
                (spread / 10_000.0).min(1.0),
            )
        }
        _ => (0.0, 0.0, 0.0),
    };

    let volatility = market
        .recent_volatility(&symbol, mid)
        .await
        .and_then(|vol| vol.to_f64())
        .unwrap_or(0.0);

    composite_score(
        &app.config().scoring_weights,
        ratio.to_f64()?,
        mid.to_f64()?,
        liquidity,
        momentum,
        spread,
        volatility,
    )
}

async fn cmd_quote(
    app: &App,
    from_asset: &str,
    to_asset: &str,
    amount: Decimal,
    wallet: Wallet,
) -> Result<u8, AppError> {
    let from_asset = from_asset.to_ascii_uppercase();
    let to_asset = to_asset.to_ascii_uppercase();
    println!("Quote {from_asset}->{to_asset} wallet={wallet} amount={amount}");

    let quote = app
        .client()
        .get_quote(&from_asset, &to_asset, amount, wallet)
        .await?;
    println!("Quote id: {}", quote.quote_id);
    println!("Ratio: {}", quote.ratio);
    println!("To amount: {}", quote.to_amount);
    println!("Valid until: {}", quote.valid_timestamp);

    if let Some(score) = pair_score(app, &from_asset, &to_asset, quote.ratio).await {
        println!("Score: {score:.6}");
    }
    Ok(0)
}

async fn cmd_now(
    app: &App,
    from_asset: &str,
    to_asset: &str,
    amount: Decimal,
    wallet: Wallet,
    dry_run: Option<bool>,
) -> Result<u8, AppError> {
    let from_asset = from_asset.to_ascii_uppercase();
    let to_asset = to_asset.to_ascii_uppercase();
    let dry_run = dry_run.unwrap_or(app.config().dry_run);

    let quote = app
        .client()
        .get_quote(&from_asset, &to_asset, amount, wallet)
        .await?;
    println!("Quote {from_asset}->{to_asset} wallet={wallet} amount={amount}");
    println!("Ratio: {} To amount: {}", quote.ratio, quote.to_amount);

    if dry_run {
        println!("Dry run: acceptQuote not executed");
        return Ok(0);
    }

    let accepted = app.client().accept_quote(&quote.quote_id).await?;
    if accepted.duplicate {
        println!("Quote {} was already accepted", quote.quote_id);
        return Ok(0);
    }
    let Some(order_id) = accepted.order_id else {
        println!("acceptQuote returned no orderId");
        return Ok(1);
    };
    println!("Order ID: {order_id}");

    // settle within a short window, mirroring the executor's poll loop
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let order = app
            .client()
            .order_status(OrderLookup::OrderId(order_id.clone()))
            .await?;
        if order.status.is_terminal() {
            println!("Status: {}", order.status);
            if order.status == OrderStatus::Success {
                println!("To amount: {}", order.to_amount);
                return Ok(0);
            }
            return Ok(1);
        }
        if Instant::now() >= deadline {
            println!("Status: still {} after 30s", order.status);
            return Ok(1);
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

async fn cmd_status(app: &App, order_id: String) -> Result<u8, AppError> {
    let order = app
        .client()
        .order_status(OrderLookup::OrderId(order_id.clone()))
        .await?;
    println!("Order {order_id}: {}", order.status);
    println!("From: {} {}", order.from_amount, order.from_asset);
    println!("To: {} {}", order.to_amount, order.to_asset);
    println!("Ratio: {}", order.ratio);
    Ok(0)
}

async fn cmd_trades(app: &App, hours: i64, limit: u32, detailed: bool) -> Result<u8, AppError> {
    let end = app.client().clock().now_ms();
    let start = end - hours * 3_600_000;

    let trades = app.client().trade_flow(start, end, Some(limit)).await?;
    println!("Trades in last {hours}h: {}", trades.len());

    if detailed {
        for trade in &trades {
            println!(
                "#{} {} {}->{} amount={} ratio={}",
                trade.order_id,
                trade.order_status,
                trade.from_asset,
                trade.to_asset,
                trade.from_amount,
                trade.ratio,
            );
        }
    }
    Ok(0)
}
