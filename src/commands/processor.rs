//! Polls the command channel and applies operator commands to the state.

use std::fmt::Write as _;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::{
    with_timeout, AccountGateway, Balance, CommandChannel, CommandUpdate, MarketDataGateway,
};
use crate::bot::Timeouts;
use crate::indicators::{Signals, DEFAULT_RSI_PERIOD};
use crate::models::Candle;
use crate::trading::BotState;

use super::parser::{parse, Command, HELP_TEXT};

/// Number of ledger records shown by `/trades`.
const RECENT_TRADES_SHOWN: usize = 10;

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Text to send back to the operator
    pub reply: String,
    /// The traded symbol changed; the candle window must be rebuilt
    pub symbol_changed: bool,
}

impl CommandOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            symbol_changed: false,
        }
    }
}

pub struct CommandProcessor {
    channel: Arc<dyn CommandChannel>,
    market: Arc<dyn MarketDataGateway>,
    account: Arc<dyn AccountGateway>,
    /// Only messages from this chat are obeyed
    chat_id: Option<i64>,
    last_update_id: Option<i64>,
    timeouts: Timeouts,
    rsi_period: usize,
}

impl CommandProcessor {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        market: Arc<dyn MarketDataGateway>,
        account: Arc<dyn AccountGateway>,
        chat_id: Option<i64>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            channel,
            market,
            account,
            chat_id,
            last_update_id: None,
            timeouts,
            rsi_period: DEFAULT_RSI_PERIOD,
        }
    }

    pub fn with_rsi_period(mut self, period: usize) -> Self {
        self.rsi_period = period;
        self
    }

    #[cfg(test)]
    pub fn last_update_id(&self) -> Option<i64> {
        self.last_update_id
    }

    /// Fetch new updates addressed to this bot, oldest first.
    ///
    /// Failures are logged and yield nothing; the same updates are requested
    /// again on the next poll.
    pub async fn poll(&mut self) -> Vec<CommandUpdate> {
        let fetched = with_timeout(
            "command poll",
            self.timeouts.command,
            self.channel.poll_updates(self.last_update_id),
        )
        .await;

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Command poll failed");
                return Vec::new();
            }
        };
        let mut updates = batch.updates;
        updates.sort_by_key(|u| u.update_id);

        let newest = updates
            .iter()
            .map(|u| u.update_id)
            .chain(batch.last_update_id)
            .max();
        if let Some(max) = newest {
            self.last_update_id = Some(self.last_update_id.map_or(max, |last| last.max(max)));
        }

        updates.retain(|u| match (self.chat_id, u.chat_id) {
            (Some(expected), Some(actual)) => expected == actual,
            (Some(_), None) => false,
            (None, _) => true,
        });
        updates
    }

    /// Poll and apply every pending command against `state`.
    ///
    /// `candles` is the current indicator window, used for `/status`. It
    /// belongs to the old symbol once a `/setpair` in the batch succeeds, so
    /// later commands see no window.
    pub async fn process(&mut self, state: &mut BotState, candles: &[Candle]) -> Vec<CommandOutcome> {
        let updates = self.poll().await;
        let mut outcomes = Vec::with_capacity(updates.len());
        let mut window = candles;

        for update in updates {
            let command = match parse(&update.text) {
                Ok(Some(command)) => command,
                Ok(None) => {
                    debug!(update_id = update.update_id, "Ignoring non-command message");
                    continue;
                }
                Err(e) => {
                    outcomes.push(CommandOutcome::reply(e.to_string()));
                    continue;
                }
            };

            info!(update_id = update.update_id, command = ?command, "Applying command");
            let outcome = self.apply(command, state, window).await;
            if outcome.symbol_changed {
                window = &[];
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Apply one parsed command.
    pub async fn apply(
        &self,
        command: Command,
        state: &mut BotState,
        candles: &[Candle],
    ) -> CommandOutcome {
        match command {
            Command::Help => CommandOutcome::reply(HELP_TEXT),
            Command::Start => {
                // A manual start supersedes any governor pause.
                state.config.active = true;
                state.risk.cooldown_deadline = None;
                CommandOutcome::reply("Bot started manually.")
            }
            Command::Stop => {
                state.config.active = false;
                CommandOutcome::reply("Bot stopped manually.")
            }
            Command::Buy => {
                if state.is_open() {
                    return CommandOutcome::reply(
                        "A position is already open. Use /sell to close it first.",
                    );
                }
                state.config.force_buy = true;
                CommandOutcome::reply("Force BUY command received.")
            }
            Command::Sell => {
                if !state.is_open() {
                    return CommandOutcome::reply("No open position to sell.");
                }
                state.config.force_sell = true;
                CommandOutcome::reply("Force SELL command received.")
            }
            Command::SetPair(symbol) => self.set_pair(symbol, state).await,
            Command::SetCapital(capital) => {
                state.config.capital = capital;
                CommandOutcome::reply(format!("Trading capital updated to ${}", capital))
            }
            Command::SetLossCount { count, minutes } => {
                state.config.max_loss_count = count;
                state.config.cooldown = chrono::Duration::minutes(i64::from(minutes));
                CommandOutcome::reply(format!(
                    "Loss control updated: {} losses -> pause {} min.",
                    count, minutes
                ))
            }
            Command::ResetLossCount => {
                state.risk.reset(&mut state.config);
                CommandOutcome::reply("Loss count reset to 0. Bot resumed trading.")
            }
            Command::Status => CommandOutcome::reply(self.status_report(state, candles).await),
            Command::Pnl => CommandOutcome::reply(pnl_report(state)),
            Command::Trades => CommandOutcome::reply(trades_report(state)),
        }
    }

    async fn set_pair(&self, symbol: String, state: &mut BotState) -> CommandOutcome {
        let probe = with_timeout("price", self.timeouts.price, self.market.get_price(&symbol)).await;
        match probe {
            Ok(_) => {
                info!(from = %state.config.symbol, to = %symbol, "Switching trading pair");
                state.switch_symbol(symbol.clone());
                CommandOutcome {
                    reply: format!("Trading pair updated to {}", symbol),
                    symbol_changed: true,
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Pair probe failed");
                CommandOutcome::reply("Invalid or unsupported pair.")
            }
        }
    }

    async fn status_report(&self, state: &BotState, candles: &[Candle]) -> String {
        let config = &state.config;
        let (base, quote) = split_symbol(&config.symbol);

        let (price, quote_balance, base_balance) = futures::join!(
            with_timeout("price", self.timeouts.price, self.market.get_price(&config.symbol)),
            with_timeout("account", self.timeouts.account, self.account.get_balance(quote)),
            with_timeout("account", self.timeouts.account, self.account.get_balance(base)),
        );
        let price = price.ok();

        let mut msg = format!(
            "*Bot Status*\n\nPair: {}\nActive: {}\nLoss Streak: {}/{}\nCooldown: {} min\n",
            config.symbol,
            if config.active { "ON" } else { "OFF" },
            state.risk.loss_streak,
            config.max_loss_count,
            config.cooldown_minutes(),
        );

        let balances = [(quote, quote_balance, 2u32), (base, base_balance, 4u32)];
        let mut header_written = false;
        for (asset, balance, dp) in balances {
            let Ok(Some(Balance { free, locked })) = balance else {
                continue;
            };
            if !header_written {
                msg.push_str("\nBalances:\n");
                header_written = true;
            }
            let _ = writeln!(
                msg,
                "{}: {} (locked {})",
                asset,
                free.round_dp(dp),
                locked.round_dp(dp)
            );
        }

        if let Some(price) = price {
            let _ = write!(msg, "\nPrice: {:.4}\n", price);
        }
        if candles.is_empty() {
            msg.push_str("Indicators: waiting for candles\n");
        } else {
            let signals = Signals::compute(candles, self.rsi_period);
            let _ = write!(
                msg,
                "RSI: {:.2}\nSAR: {:.4}\nTrend: {}\n",
                signals.rsi, signals.sar, signals.trend
            );
        }
        let _ = write!(msg, "Capital: ${}", config.capital);

        match &state.position {
            Some(position) => {
                let pnl = price.map_or(Decimal::ZERO, |p| position.pnl_at(p));
                let _ = write!(
                    msg,
                    "\n\nPosition:\nBuy: {:.4}\nAmount: {:.4}\nPnL: ${:.4}",
                    position.buy_price, position.amount, pnl
                );
            }
            None => msg.push_str("\n\nNo open position"),
        }

        if let Some(until) = state.risk.cooldown_deadline {
            let _ = write!(msg, "\nPaused until: {}", until.format("%H:%M:%S UTC"));
        }

        msg
    }
}

/// Split a pair into (base, quote). USDT pairs quote in USDT, anything else
/// is assumed to carry a three-letter quote asset.
pub fn split_symbol(symbol: &str) -> (&str, &str) {
    if let Some(base) = symbol.strip_suffix("USDT") {
        return (base, "USDT");
    }
    match symbol.len().checked_sub(3) {
        Some(idx) if idx > 0 && symbol.is_char_boundary(idx) => symbol.split_at(idx),
        _ => (symbol, ""),
    }
}

fn pnl_report(state: &BotState) -> String {
    let risk = &state.risk;
    format!(
        "*Total Performance*\n\nTotal Trades: {}\nProfit: ${:.4}\nLoss: ${:.4}\nNet: ${:.4}\nLoss Streak: {}/{}",
        risk.total_trades,
        risk.total_profit,
        risk.total_loss,
        risk.net_pnl(),
        risk.loss_streak,
        state.config.max_loss_count,
    )
}

fn trades_report(state: &BotState) -> String {
    if state.ledger.is_empty() {
        return "No trades yet.".to_string();
    }
    let mut msg = String::from("*Trade History*\n\n");
    for record in state.ledger.recent(RECENT_TRADES_SHOWN) {
        let _ = writeln!(msg, "{}", record);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CommandBatch, GatewayError, GatewayResult};
    use crate::indicators::test_support::candles_from_closes;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Prices by symbol; unknown symbols fail like an exchange 400.
    struct FakeMarket {
        prices: Vec<(&'static str, Decimal)>,
    }

    #[async_trait]
    impl MarketDataGateway for FakeMarket {
        async fn get_price(&self, symbol: &str) -> GatewayResult<Decimal> {
            self.prices
                .iter()
                .find(|(s, _)| *s == symbol)
                .map(|(_, p)| *p)
                .ok_or_else(|| GatewayError::Status {
                    status: 400,
                    body: "Invalid symbol.".to_string(),
                })
        }

        async fn get_candles(&self, _: &str, _: &str, _: usize) -> GatewayResult<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    struct FakeAccount;

    #[async_trait]
    impl AccountGateway for FakeAccount {
        async fn get_balance(&self, asset: &str) -> GatewayResult<Option<Balance>> {
            Ok(match asset {
                "USDT" => Some(Balance {
                    free: dec!(12.3456),
                    locked: Decimal::ZERO,
                }),
                _ => None,
            })
        }
    }

    #[derive(Default)]
    struct FakeChannel {
        batches: Mutex<Vec<CommandBatch>>,
        requested: Mutex<Vec<Option<i64>>>,
        fail: AtomicBool,
    }

    impl FakeChannel {
        fn push(&self, updates: Vec<CommandUpdate>) {
            let last_update_id = updates.iter().map(|u| u.update_id).max();
            self.batches.lock().unwrap().push(CommandBatch {
                updates,
                last_update_id,
            });
        }
    }

    #[async_trait]
    impl CommandChannel for FakeChannel {
        async fn poll_updates(&self, after: Option<i64>) -> GatewayResult<CommandBatch> {
            self.requested.lock().unwrap().push(after);
            if self.fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Status {
                    status: 502,
                    body: "Bad Gateway".to_string(),
                });
            }
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(CommandBatch::default())
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    fn update(id: i64, chat: i64, text: &str) -> CommandUpdate {
        CommandUpdate {
            update_id: id,
            chat_id: Some(chat),
            text: text.to_string(),
        }
    }

    fn processor(channel: Arc<FakeChannel>) -> CommandProcessor {
        CommandProcessor::new(
            channel,
            Arc::new(FakeMarket {
                prices: vec![("XRPUSDT", dec!(0.5)), ("ETHUSDT", dec!(2500))],
            }),
            Arc::new(FakeAccount),
            Some(42),
            Timeouts::default(),
        )
    }

    #[tokio::test]
    async fn test_setcapital_rejects_invalid_and_accepts_valid() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();
        assert!(parse("/setcapital -5").is_err());
        assert!(parse("/setcapital abc").is_err());
        assert_eq!(state.config.capital, dec!(2));

        let cmd = parse("/setcapital 10").unwrap().unwrap();
        let outcome = proc.apply(cmd, &mut state, &[]).await;
        assert_eq!(state.config.capital, dec!(10));
        assert_eq!(outcome.reply, "Trading capital updated to $10");
    }

    #[tokio::test]
    async fn test_invalid_capital_replies_usage_through_process() {
        let channel = Arc::new(FakeChannel::default());
        channel.push(vec![update(1, 42, "/setcapital -5"), update(2, 42, "/setcapital abc")]);
        let mut proc = processor(channel);
        let mut state = BotState::default();

        let outcomes = proc.process(&mut state, &[]).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| o.reply == "Invalid amount. Example: /setcapital 5"));
        assert_eq!(state.config.capital, dec!(2));
    }

    #[tokio::test]
    async fn test_setpair_failed_probe_leaves_state() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();
        state.open_position(dec!(0.5), dec!(4), Utc::now()).unwrap();

        let outcome = proc
            .apply(Command::SetPair("BADSYM".to_string()), &mut state, &[])
            .await;
        assert_eq!(outcome.reply, "Invalid or unsupported pair.");
        assert!(!outcome.symbol_changed);
        assert_eq!(state.config.symbol, "XRPUSDT");
        assert!(state.is_open());
        assert_eq!(state.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_setpair_success_clears_position_and_ledger() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();
        state.open_position(dec!(0.5), dec!(4), Utc::now()).unwrap();

        let outcome = proc
            .apply(Command::SetPair("ETHUSDT".to_string()), &mut state, &[])
            .await;
        assert!(outcome.symbol_changed);
        assert_eq!(state.config.symbol, "ETHUSDT");
        assert!(state.position.is_none());
        assert!(state.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_process_applies_whole_batch_in_order_and_filters_chat() {
        let channel = Arc::new(FakeChannel::default());
        channel.push(vec![
            update(12, 42, "/start"),
            update(10, 42, "/stop"),
            update(11, 99, "/setcapital 100"),
            update(13, 42, "just chatting"),
        ]);
        let mut proc = processor(channel.clone());
        let mut state = BotState::default();
        state.config.active = false;

        let outcomes = proc.process(&mut state, &[]).await;
        // /stop then /start: ends active.
        assert_eq!(outcomes.len(), 2);
        assert!(state.config.active);
        assert_eq!(state.config.capital, dec!(2));
        assert_eq!(proc.last_update_id(), Some(13));

        proc.process(&mut state, &[]).await;
        assert_eq!(*channel.requested.lock().unwrap(), vec![None, Some(13)]);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cursor() {
        let channel = Arc::new(FakeChannel::default());
        channel.push(vec![update(5, 42, "/stop")]);
        let mut proc = processor(channel.clone());
        let mut state = BotState::default();

        assert_eq!(proc.process(&mut state, &[]).await.len(), 1);
        assert_eq!(proc.last_update_id(), Some(5));

        channel.fail.store(true, Ordering::SeqCst);
        assert!(proc.process(&mut state, &[]).await.is_empty());
        assert_eq!(proc.last_update_id(), Some(5));

        channel.fail.store(false, Ordering::SeqCst);
        channel.push(vec![update(6, 42, "/start")]);
        assert_eq!(proc.process(&mut state, &[]).await.len(), 1);
        assert!(state.config.active);
        assert_eq!(
            *channel.requested.lock().unwrap(),
            vec![None, Some(5), Some(5)]
        );
        assert_eq!(proc.last_update_id(), Some(6));
    }

    #[tokio::test]
    async fn test_batch_without_commands_advances_cursor() {
        let channel = Arc::new(FakeChannel::default());
        channel.batches.lock().unwrap().push(CommandBatch {
            updates: Vec::new(),
            last_update_id: Some(9),
        });
        let mut proc = processor(channel.clone());
        let mut state = BotState::default();

        assert!(proc.process(&mut state, &[]).await.is_empty());
        assert_eq!(proc.last_update_id(), Some(9));

        proc.process(&mut state, &[]).await;
        assert_eq!(*channel.requested.lock().unwrap(), vec![None, Some(9)]);
    }

    #[tokio::test]
    async fn test_status_after_setpair_in_same_batch_skips_old_window() {
        let channel = Arc::new(FakeChannel::default());
        channel.push(vec![update(1, 42, "/setpair ETHUSDT"), update(2, 42, "/status")]);
        let mut proc = processor(channel);
        let mut state = BotState::default();
        let xrp_window = candles_from_closes(&[0.49, 0.50, 0.51]);

        let outcomes = proc.process(&mut state, &xrp_window).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].symbol_changed);
        let status = &outcomes[1].reply;
        assert!(status.contains("Pair: ETHUSDT"));
        assert!(status.contains("Price: 2500.0000"));
        assert!(status.contains("Indicators: waiting for candles"));
        assert!(!status.contains("RSI:"));
    }

    #[tokio::test]
    async fn test_manual_start_clears_governor_deadline() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();
        let t0 = Utc::now();
        for _ in 0..3 {
            state.open_position(dec!(100), dec!(0.02), t0).unwrap();
            state.close_position(dec!(99), t0).unwrap();
        }
        assert!(!state.config.active);
        let deadline = state.risk.cooldown_deadline.unwrap();

        proc.apply(Command::Start, &mut state, &[]).await;
        assert!(state.config.active);
        assert!(state.risk.cooldown_deadline.is_none());

        proc.apply(Command::Stop, &mut state, &[]).await;
        assert!(!state.resume_if_due(deadline + chrono::Duration::hours(1)));
        assert!(!state.config.active);
    }

    #[tokio::test]
    async fn test_force_flags_respect_position_state() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();

        let outcome = proc.apply(Command::Sell, &mut state, &[]).await;
        assert_eq!(outcome.reply, "No open position to sell.");
        assert!(!state.config.force_sell);

        proc.apply(Command::Buy, &mut state, &[]).await;
        assert!(state.config.force_buy);

        state.open_position(dec!(1), dec!(2), Utc::now()).unwrap();
        let outcome = proc.apply(Command::Buy, &mut state, &[]).await;
        assert!(outcome.reply.starts_with("A position is already open"));
        proc.apply(Command::Sell, &mut state, &[]).await;
        assert!(state.config.force_sell);
    }

    #[tokio::test]
    async fn test_setlosscount_and_reset() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();

        proc.apply(
            Command::SetLossCount {
                count: 5,
                minutes: 30,
            },
            &mut state,
            &[],
        )
        .await;
        assert_eq!(state.config.max_loss_count, 5);
        assert_eq!(state.config.cooldown_minutes(), 30);

        state.config.active = false;
        state.risk.loss_streak = 5;
        state.risk.cooldown_deadline = Some(Utc::now());
        proc.apply(Command::ResetLossCount, &mut state, &[]).await;
        assert!(state.config.active);
        assert_eq!(state.risk.loss_streak, 0);
        assert!(state.risk.cooldown_deadline.is_none());
    }

    #[tokio::test]
    async fn test_status_report_contents() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();
        let candles = candles_from_closes(&[0.49, 0.50, 0.51]);

        let reply = proc.apply(Command::Status, &mut state, &candles).await.reply;
        assert!(reply.contains("Pair: XRPUSDT"));
        assert!(reply.contains("Active: ON"));
        assert!(reply.contains("Loss Streak: 0/3"));
        assert!(reply.contains("Cooldown: 10 min"));
        assert!(reply.contains("USDT: 12.35"));
        assert!(!reply.contains("XRP: "));
        assert!(reply.contains("Price: 0.5000"));
        assert!(reply.contains("RSI: 50.00"));
        assert!(reply.ends_with("No open position"));

        state.open_position(dec!(0.4), dec!(5), Utc::now()).unwrap();
        let reply = proc.apply(Command::Status, &mut state, &candles).await.reply;
        assert!(reply.contains("Buy: 0.4000"));
        assert!(reply.contains("PnL: $0.5000"));
    }

    #[tokio::test]
    async fn test_pnl_and_trades_reports() {
        let proc = processor(Arc::new(FakeChannel::default()));
        let mut state = BotState::default();

        let reply = proc.apply(Command::Trades, &mut state, &[]).await.reply;
        assert_eq!(reply, "No trades yet.");

        state.open_position(dec!(100), dec!(0.02), Utc::now()).unwrap();
        state.close_position(dec!(101), Utc::now()).unwrap();

        let reply = proc.apply(Command::Pnl, &mut state, &[]).await.reply;
        assert!(reply.contains("Total Trades: 1"));
        assert!(reply.contains("Net: $0.0200"));

        let reply = proc.apply(Command::Trades, &mut state, &[]).await.reply;
        assert_eq!(reply.lines().filter(|l| l.contains(" XRPUSDT @ ")).count(), 2);
        assert!(reply.contains("PnL: $0.0200"));
    }

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("XRPUSDT"), ("XRP", "USDT"));
        assert_eq!(split_symbol("ETHBTC"), ("ETH", "BTC"));
        assert_eq!(split_symbol("BTC"), ("BTC", ""));
    }
}
