//! Log verbosity: repeat `-v`, or name a level in `CODELEARN_LOG_LEVEL`.

use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; the index is the `-v` count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_verbosity(value: &str) -> Result<u8, String> {
    let value = value.trim().to_ascii_lowercase();
    let index = LEVEL_NAMES
        .iter()
        .position(|name| *name == value)
        .or_else(|| value.parse::<usize>().ok().filter(|n| *n < LEVEL_NAMES.len()));

    index.and_then(|n| u8::try_from(n).ok()).ok_or_else(|| {
        format!(
            "invalid log level '{value}', expected one of {} or 0-4",
            LEVEL_NAMES.join(", ")
        )
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log more: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("CODELEARN_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_verbosity)),
    )
}

/// Level for the log filter; `None` keeps the default (errors only).
#[must_use]
pub fn level(matches: &ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}
