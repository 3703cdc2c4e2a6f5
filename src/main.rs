//! Spot trading agent.
//!
//! Trades a single spot pair on RSI / Parabolic SAR signals with a take
//! profit, a stop loss and a loss-streak cooldown, controlled remotely
//! through a Telegram chat.

mod api;
mod bot;
mod cadence;
mod commands;
mod indicators;
mod market;
mod models;
mod trading;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{
    Credentials, DryRunOrders, ExchangeClient, MarketDataGateway, OrderGateway, TelegramClient,
    MEXC_API_BASE,
};
use crate::bot::{Bot, BotConfig, Gateways};
use crate::indicators::{Signals, DEFAULT_RSI_PERIOD};
use crate::trading::RuntimeConfig;

/// Single-pair spot trading bot CLI.
#[derive(Parser)]
#[command(name = "spotbot")]
#[command(about = "RSI / Parabolic SAR spot trading bot with Telegram control", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Exchange REST base URL
    #[arg(long, default_value = MEXC_API_BASE)]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading loop
    Run {
        /// Exchange API key
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: String,

        /// Exchange API secret
        #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
        secret_key: String,

        /// Telegram bot token
        #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
        telegram_token: String,

        /// Telegram chat allowed to control the bot
        #[arg(long, env = "CHAT_ID")]
        chat_id: i64,

        /// Trading pair
        #[arg(short, long, default_value = "XRPUSDT")]
        symbol: String,

        /// Quote currency committed per entry
        #[arg(short, long, default_value = "2")]
        capital: f64,

        /// Kline interval used for indicators
        #[arg(long, default_value = "1m")]
        interval: String,

        /// Tick period in milliseconds
        #[arg(long, default_value = "1000")]
        tick_ms: u64,

        /// Dry run (don't place orders)
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the current indicator readings for a pair
    Indicators {
        /// Trading pair
        #[arg(short, long, default_value = "XRPUSDT")]
        symbol: String,

        /// Kline interval
        #[arg(short, long, default_value = "1m")]
        interval: String,

        /// Number of candles to fetch
        #[arg(long, default_value = "100")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level.to_lowercase()))
        .context("Invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            api_key,
            secret_key,
            telegram_token,
            chat_id,
            symbol,
            capital,
            interval,
            tick_ms,
            dry_run,
        } => {
            let capital = Decimal::try_from(capital).context("Invalid capital")?;
            if capital <= Decimal::ZERO {
                bail!("Capital must be positive, got {}", capital);
            }
            if tick_ms == 0 {
                bail!("Tick period must be at least 1ms");
            }

            let exchange = Arc::new(ExchangeClient::new(
                cli.base_url,
                Credentials {
                    api_key,
                    api_secret: secret_key,
                },
            )?);
            let telegram = Arc::new(TelegramClient::new(telegram_token, chat_id.to_string())?);
            let orders: Arc<dyn OrderGateway> = if dry_run {
                info!("Dry run: orders are logged, not sent");
                Arc::new(DryRunOrders)
            } else {
                exchange.clone()
            };

            let runtime = RuntimeConfig {
                symbol: symbol.to_uppercase(),
                capital: capital.normalize(),
                ..Default::default()
            };
            let config = BotConfig {
                tick_period: Duration::from_millis(tick_ms),
                candle_interval: interval,
                chat_id: Some(chat_id),
                dry_run,
                ..Default::default()
            };

            let mut bot = Bot::new(
                config,
                runtime,
                Gateways {
                    market: exchange.clone(),
                    orders,
                    account: exchange,
                    commands: telegram.clone(),
                    notifier: telegram,
                },
            );
            bot.run().await?;
        }

        Commands::Indicators {
            symbol,
            interval,
            limit,
        } => {
            let symbol = symbol.to_uppercase();
            let client = ExchangeClient::public(cli.base_url)?;

            let candles = client
                .get_candles(&symbol, &interval, limit)
                .await
                .with_context(|| format!("Failed to fetch candles for {}", symbol))?;
            let price = client
                .get_price(&symbol)
                .await
                .with_context(|| format!("Failed to fetch price for {}", symbol))?;
            let signals = Signals::compute(&candles, DEFAULT_RSI_PERIOD);

            println!("\n=== {} ({}, {} candles) ===", symbol, interval, candles.len());
            println!("{:<8} {:>14}", "Price", format!("{:.4}", price));
            println!("{:<8} {:>14}", "RSI", format!("{:.2}", signals.rsi));
            println!("{:<8} {:>14}", "SAR", format!("{:.4}", signals.sar));
            println!("{:<8} {:>14}", "Trend", signals.trend.to_string());
        }
    }

    Ok(())
}
