//! Text grammar of the remote command channel.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

/// A recognized operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Stop,
    Buy,
    Sell,
    Status,
    Pnl,
    Trades,
    SetPair(String),
    SetCapital(Decimal),
    SetLossCount { count: u32, minutes: u32 },
    ResetLossCount,
}

/// Malformed arguments to an otherwise recognized command.
///
/// The display text is sent back to the operator as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: /setpair <symbol>")]
    SetPairUsage,

    #[error("Invalid amount. Example: /setcapital 5")]
    InvalidCapital,

    #[error("Usage: /setlosscount <count> <minutes>")]
    SetLossCountUsage,
}

/// Parse one message.
///
/// Returns `Ok(None)` for text that is not a command this bot understands.
pub fn parse(text: &str) -> Result<Option<Command>, CommandError> {
    let mut parts = text.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    // Group chats address commands as "/status@SomeBot".
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "/cmd" | "/command" => Command::Help,
        "/start" => Command::Start,
        "/stop" => Command::Stop,
        "/buy" => Command::Buy,
        "/sell" => Command::Sell,
        "/status" => Command::Status,
        "/pnl" => Command::Pnl,
        "/trades" => Command::Trades,
        "/resetlosscount" => Command::ResetLossCount,
        "/setpair" => match args.as_slice() {
            [symbol] if is_symbol(symbol) => Command::SetPair(symbol.to_ascii_uppercase()),
            _ => return Err(CommandError::SetPairUsage),
        },
        "/setcapital" => match args.as_slice() {
            [amount] => Command::SetCapital(parse_capital(amount)?),
            _ => return Err(CommandError::InvalidCapital),
        },
        "/setlosscount" => match args.as_slice() {
            [count, minutes] => Command::SetLossCount {
                count: parse_positive(count)?,
                minutes: parse_positive(minutes)?,
            },
            _ => return Err(CommandError::SetLossCountUsage),
        },
        _ => return Ok(None),
    };

    Ok(Some(command))
}

fn is_symbol(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn parse_capital(s: &str) -> Result<Decimal, CommandError> {
    match Decimal::from_str(s) {
        Ok(amount) if amount > Decimal::ZERO => Ok(amount.normalize()),
        _ => Err(CommandError::InvalidCapital),
    }
}

fn parse_positive(s: &str) -> Result<u32, CommandError> {
    match s.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::SetLossCountUsage),
    }
}

/// Reply to `/cmd`.
pub const HELP_TEXT: &str = "*Trading Bot Commands*\n\n\
/start - Start/resume the bot\n\
/stop - Stop/pause the bot\n\
/status - Show bot status and indicators\n\
/buy - Force buy immediately\n\
/sell - Force sell immediately\n\
/setpair <symbol> - Change trading pair\n\
/setcapital <amount> - Set trading capital\n\
/setlosscount <count> <minutes> - Adjust loss control\n\
/resetlosscount - Reset loss streak\n\
/pnl - Show total profit/loss\n\
/trades - Show recent trades\n";

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_simple_commands_case_insensitive() {
        assert_eq!(parse("/START"), Ok(Some(Command::Start)));
        assert_eq!(parse("  /stop  "), Ok(Some(Command::Stop)));
        assert_eq!(parse("/Status@spot_bot"), Ok(Some(Command::Status)));
        assert_eq!(parse("/command"), Ok(Some(Command::Help)));
        assert_eq!(parse("/cmd"), Ok(Some(Command::Help)));
        assert_eq!(parse("/resetlosscount"), Ok(Some(Command::ResetLossCount)));
    }

    #[test]
    fn test_unrecognized_text_ignored() {
        assert_eq!(parse("hello"), Ok(None));
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("/moon"), Ok(None));
    }

    #[test]
    fn test_setpair_uppercases() {
        assert_eq!(
            parse("/setpair ethusdt"),
            Ok(Some(Command::SetPair("ETHUSDT".to_string())))
        );
        assert_eq!(parse("/setpair"), Err(CommandError::SetPairUsage));
        assert_eq!(parse("/setpair ETH/USDT"), Err(CommandError::SetPairUsage));
    }

    #[test]
    fn test_setcapital_validation() {
        assert_eq!(parse("/setcapital 10"), Ok(Some(Command::SetCapital(dec!(10)))));
        assert_eq!(parse("/setcapital 2.50"), Ok(Some(Command::SetCapital(dec!(2.5)))));
        assert_eq!(parse("/setcapital -5"), Err(CommandError::InvalidCapital));
        assert_eq!(parse("/setcapital 0"), Err(CommandError::InvalidCapital));
        assert_eq!(parse("/setcapital abc"), Err(CommandError::InvalidCapital));
        assert_eq!(parse("/setcapital NaN"), Err(CommandError::InvalidCapital));
        assert_eq!(parse("/setcapital"), Err(CommandError::InvalidCapital));
        assert_eq!(
            CommandError::InvalidCapital.to_string(),
            "Invalid amount. Example: /setcapital 5"
        );
    }

    #[test]
    fn test_setlosscount_validation() {
        assert_eq!(
            parse("/setlosscount 5 30"),
            Ok(Some(Command::SetLossCount {
                count: 5,
                minutes: 30
            }))
        );
        assert_eq!(parse("/setlosscount 0 30"), Err(CommandError::SetLossCountUsage));
        assert_eq!(parse("/setlosscount 3 -1"), Err(CommandError::SetLossCountUsage));
        assert_eq!(parse("/setlosscount 3"), Err(CommandError::SetLossCountUsage));
        assert_eq!(parse("/setlosscount a b"), Err(CommandError::SetLossCountUsage));
    }
}
