//! Bot runner: the fixed-period tick loop.
//!
//! Each tick, in order:
//! - lifts an expired loss cooldown
//! - polls and applies operator commands (own cadence)
//! - fetches the live price and refreshes candles (own cadence)
//! - computes indicators and evaluates the position state machine
//! - places the resulting order and applies it on acknowledgment

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{
    with_timeout, AccountGateway, CommandChannel, MarketDataGateway, NotificationSink,
    OrderGateway,
};
use crate::cadence::Cadence;
use crate::commands::CommandProcessor;
use crate::indicators::{Signals, DEFAULT_RSI_PERIOD};
use crate::market::{CandleCache, DEFAULT_CANDLE_CAPACITY};
use crate::models::{TradeLedger, TradeSide};
use crate::trading::{
    evaluate, BotState, ClosedTrade, GovernorOutcome, RuntimeConfig, SharedState, TradeAction,
};

/// Deadlines for each kind of external call.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub price: Duration,
    pub candles: Duration,
    pub order: Duration,
    pub account: Duration,
    pub command: Duration,
    pub notify: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            price: Duration::from_millis(800),
            candles: Duration::from_millis(1500),
            order: Duration::from_secs(3),
            account: Duration::from_secs(2),
            command: Duration::from_secs(3),
            notify: Duration::from_secs(3),
        }
    }
}

/// Loop configuration. Trading parameters live in [`RuntimeConfig`].
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Period of the main loop
    pub tick_period: Duration,

    /// How often the command channel is polled (at least 5s)
    pub command_poll_interval: Duration,

    /// How often the full candle window is refetched
    pub candle_refresh_interval: Duration,

    /// Kline interval, e.g. "1m"
    pub candle_interval: String,

    /// Candles requested and kept
    pub candle_limit: usize,

    pub rsi_period: usize,

    /// Trade records retained for /trades
    pub ledger_capacity: usize,

    /// Delay between startup bootstrap attempts
    pub bootstrap_backoff: Duration,

    /// Minimum gap between repeated order-failure messages for one side
    pub order_failure_alert_interval: Duration,

    pub timeouts: Timeouts,

    /// Operator chat; commands from elsewhere are ignored
    pub chat_id: Option<i64>,

    /// Orders are simulated (only affects messages)
    pub dry_run: bool,
}

/// Lower bound on the command poll interval.
pub const MIN_COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(5);

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            command_poll_interval: MIN_COMMAND_POLL_INTERVAL,
            candle_refresh_interval: Duration::from_secs(30),
            candle_interval: "1m".to_string(),
            candle_limit: DEFAULT_CANDLE_CAPACITY,
            rsi_period: DEFAULT_RSI_PERIOD,
            ledger_capacity: TradeLedger::DEFAULT_CAPACITY,
            bootstrap_backoff: Duration::from_secs(2),
            order_failure_alert_interval: Duration::from_secs(60),
            timeouts: Timeouts::default(),
            chat_id: None,
            dry_run: false,
        }
    }
}

/// External collaborators of the bot.
#[derive(Clone)]
pub struct Gateways {
    pub market: Arc<dyn MarketDataGateway>,
    pub orders: Arc<dyn OrderGateway>,
    pub account: Arc<dyn AccountGateway>,
    pub commands: Arc<dyn CommandChannel>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// What a single tick ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Price unavailable; nothing evaluated
    NoPrice,
    /// No candle window for the current symbol yet
    NoWindow,
    Hold,
    Opened { price: Decimal, quantity: Decimal },
    Closed(ClosedTrade),
    /// The order was not acknowledged; state untouched
    OrderFailed(TradeSide),
}

/// Main bot runner.
pub struct Bot {
    config: BotConfig,
    market: Arc<dyn MarketDataGateway>,
    orders: Arc<dyn OrderGateway>,
    notifier: Arc<dyn NotificationSink>,
    commands: CommandProcessor,

    state: SharedState,
    candles: CandleCache,
    command_cadence: Cadence,
    refresh_cadence: Cadence,
    buy_failure_alert: Cadence,
    sell_failure_alert: Cadence,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    pub fn new(mut config: BotConfig, runtime: RuntimeConfig, gateways: Gateways) -> Self {
        if config.command_poll_interval < MIN_COMMAND_POLL_INTERVAL {
            warn!(
                requested = ?config.command_poll_interval,
                "Command poll interval raised to the minimum"
            );
            config.command_poll_interval = MIN_COMMAND_POLL_INTERVAL;
        }

        let commands = CommandProcessor::new(
            gateways.commands,
            gateways.market.clone(),
            gateways.account,
            config.chat_id,
            config.timeouts,
        )
        .with_rsi_period(config.rsi_period);

        let candles = CandleCache::new(runtime.symbol.clone(), config.candle_limit);
        let state = BotState::new(runtime, config.ledger_capacity).shared();

        Self {
            command_cadence: Cadence::new(config.command_poll_interval),
            refresh_cadence: Cadence::new(config.candle_refresh_interval),
            buy_failure_alert: Cadence::new(config.order_failure_alert_interval),
            sell_failure_alert: Cadence::new(config.order_failure_alert_interval),
            market: gateways.market,
            orders: gateways.orders,
            notifier: gateways.notifier,
            commands,
            state,
            candles,
            shutdown: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Handle to the shared state, e.g. for reporting.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Fetch the initial candle window, retrying until it succeeds or a
    /// shutdown is requested.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let symbol = self.candles.symbol().to_string();
        info!(symbol = %symbol, "Bootstrapping candle window");

        let market = self.market.clone();
        let shutdown = self.shutdown.clone();
        let interval = self.config.candle_interval.clone();
        let limit = self.config.candle_limit;
        let limit_time = self.config.timeouts.candles;

        let fetch = || {
            let market = market.clone();
            let shutdown = shutdown.clone();
            let symbol = symbol.clone();
            let interval = interval.clone();
            async move {
                if shutdown.load(Ordering::SeqCst) {
                    return Err(backoff::Error::permanent(anyhow!(
                        "shutdown requested during bootstrap"
                    )));
                }
                let candles = with_timeout(
                    "candles",
                    limit_time,
                    market.get_candles(&symbol, &interval, limit),
                )
                .await
                .map_err(|e| backoff::Error::transient(anyhow::Error::from(e)))?;
                if candles.is_empty() {
                    return Err(backoff::Error::transient(anyhow!("empty candle window")));
                }
                Ok(candles)
            }
        };

        let candles = backoff::future::retry_notify(
            backoff::backoff::Constant::new(self.config.bootstrap_backoff),
            fetch,
            |e: anyhow::Error, wait: Duration| {
                warn!(error = %e, retry_in = ?wait, "Candle bootstrap failed, retrying");
            },
        )
        .await
        .context("Candle bootstrap abandoned")?;

        self.candles.replace(candles);
        self.refresh_cadence.fire(Instant::now());
        info!(candles = self.candles.len(), "Candle window ready");
        Ok(())
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        self.bootstrap().await?;

        let (symbol, capital) = {
            let state = self.state.lock().await;
            (state.config.symbol.clone(), state.config.capital)
        };
        info!(
            symbol = %symbol,
            capital = %capital,
            dry_run = self.config.dry_run,
            tick = ?self.config.tick_period,
            "Starting bot run loop"
        );
        let mode = if self.config.dry_run { " (dry run)" } else { "" };
        self.notify(&format!(
            "Bot started on {} with ${} capital{}.",
            symbol, capital, mode
        ))
        .await;

        let mut ticker = interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let outcome = self.tick(Instant::now(), Utc::now()).await;
            debug!(outcome = ?outcome, "Tick complete");
        }

        info!("Bot stopped");
        self.notify("Bot stopped.").await;
        Ok(())
    }

    /// Single iteration of the main loop.
    ///
    /// `now` drives the cadences, `wall` timestamps trades and the cooldown.
    pub async fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> TickOutcome {
        let shared = self.state.clone();
        let mut state = shared.lock().await;

        if state.resume_if_due(wall) {
            self.notify("Bot resumed after cooldown period.").await;
        }

        if self.command_cadence.fire(now) {
            let window = self.candles.window();
            let outcomes = self.commands.process(&mut state, &window).await;
            for outcome in outcomes {
                if outcome.symbol_changed {
                    self.candles.reset(state.config.symbol.clone());
                    self.refresh_cadence.force();
                }
                self.notify(&outcome.reply).await;
            }
        }

        let symbol = state.config.symbol.clone();
        let price = match with_timeout(
            "price",
            self.config.timeouts.price,
            self.market.get_price(&symbol),
        )
        .await
        {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Price unavailable, skipping tick");
                return TickOutcome::NoPrice;
            }
        };

        if self.refresh_cadence.fire(now) || self.candles.is_empty() {
            self.refresh_candles(&symbol).await;
        }
        if let Some(p) = price.to_f64() {
            self.candles.merge_tick(p);
        }

        if self.candles.is_empty() {
            debug!(symbol = %symbol, "No candle window yet, skipping evaluation");
            return TickOutcome::NoWindow;
        }

        let window = self.candles.window();
        let signals = Signals::compute(&window, self.config.rsi_period);

        info!(
            pair = %symbol,
            price = %price,
            rsi = format_args!("{:.2}", signals.rsi),
            sar = format_args!("{:.4}", signals.sar),
            trend = %signals.trend,
            active = state.config.active,
            "Heartbeat"
        );

        match evaluate(&state, price, &signals) {
            TradeAction::Hold => TickOutcome::Hold,
            TradeAction::Enter { quantity, reason } => {
                info!(price = %price, quantity = %quantity, reason = ?reason, "Entry signal");
                let placed = with_timeout(
                    "order",
                    self.config.timeouts.order,
                    self.orders
                        .place_market_order(&symbol, TradeSide::Buy, quantity),
                )
                .await;

                let ack = match placed {
                    Ok(ack) => ack,
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "BUY order failed");
                        if self.buy_failure_alert.fire(now) {
                            self.notify(&format!("BUY order failed for {}: {}", symbol, e))
                                .await;
                        }
                        return TickOutcome::OrderFailed(TradeSide::Buy);
                    }
                };
                self.buy_failure_alert.force();

                match state.open_position(price, ack.quantity, wall) {
                    Ok(position) => {
                        info!(
                            symbol = %symbol,
                            price = %position.buy_price,
                            amount = %position.amount,
                            order_id = ?ack.order_id,
                            "Position opened"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Acknowledged BUY could not be applied");
                        return TickOutcome::Hold;
                    }
                }

                let capital = state.config.capital;
                self.notify(&format!(
                    "Bought {} at {:.4} (${})",
                    symbol, price, capital
                ))
                .await;

                TickOutcome::Opened {
                    price,
                    quantity: ack.quantity,
                }
            }
            TradeAction::Exit { amount, pnl, reason } => {
                info!(price = %price, pnl = %pnl, reason = %reason, "Exit signal");
                let placed = with_timeout(
                    "order",
                    self.config.timeouts.order,
                    self.orders
                        .place_market_order(&symbol, TradeSide::Sell, amount),
                )
                .await;

                if let Err(e) = placed {
                    error!(symbol = %symbol, error = %e, "SELL order failed");
                    if self.sell_failure_alert.fire(now) {
                        self.notify(&format!("SELL order failed for {}: {}", symbol, e))
                            .await;
                    }
                    return TickOutcome::OrderFailed(TradeSide::Sell);
                }
                self.sell_failure_alert.force();

                let closed = match state.close_position(price, wall) {
                    Ok(closed) => closed,
                    Err(e) => {
                        error!(error = %e, "Acknowledged SELL could not be applied");
                        return TickOutcome::Hold;
                    }
                };

                info!(
                    symbol = %symbol,
                    price = %closed.price,
                    pnl = %closed.pnl,
                    reason = %reason,
                    "Position closed"
                );
                self.notify(&format!(
                    "Sold {} at {:.4} | PnL: ${:.4} ({})",
                    symbol, price, closed.pnl, reason
                ))
                .await;

                if let GovernorOutcome::Paused { .. } = closed.governor {
                    self.notify(&format!(
                        "Bot paused after {} losses. Cooling down for {} min.",
                        state.risk.loss_streak,
                        state.config.cooldown_minutes()
                    ))
                    .await;
                }

                TickOutcome::Closed(closed)
            }
        }
    }

    /// Refetch the confirmed window; on failure the stale window stays.
    async fn refresh_candles(&mut self, symbol: &str) {
        let fetched = with_timeout(
            "candles",
            self.config.timeouts.candles,
            self.market
                .get_candles(symbol, &self.config.candle_interval, self.config.candle_limit),
        )
        .await;

        match fetched {
            Ok(candles) => {
                if !self.candles.replace(candles) {
                    warn!(symbol = %symbol, "Empty candle response, keeping previous window");
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Candle refresh failed, keeping previous window");
            }
        }
    }

    /// Best-effort operator notification.
    async fn notify(&self, text: &str) {
        if let Err(e) = with_timeout("notify", self.config.timeouts.notify, self.notifier.notify(text)).await
        {
            warn!(error = %e, "Notification dropped");
        }
    }
}
