//! Remote operator commands: grammar and application.

mod parser;
mod processor;

pub use parser::{Command, CommandError};
pub use processor::{CommandOutcome, CommandProcessor};
