//! Parsing of textual requests.
//!
//! One request per line, case-insensitive verb followed by at most one
//! argument:
//!
//! ```text
//! insert 5      search 5      delete 5
//! random [n]    reset         order 4
//! speed 2       stats         layout
//! log           check
//! ```

use std::fmt;
use std::str::FromStr;

use crate::simulator::Command;

/// Keys inserted by `random` without a count.
pub const DEFAULT_RANDOM_COUNT: usize = 10;
/// Largest count accepted by `random`.
pub const MAX_RANDOM_COUNT: usize = 1000;

/// A request for the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Insert, search or delete one key.
    Run(Command),
    /// Insert this many random keys, one after another.
    Random(usize),
    Reset,
    SetOrder(usize),
    SetSpeed(f64),
    Stats,
    Layout,
    Log,
    Check,
}

/// Error returned when a request line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownVerb(String),
    MissingArgument(&'static str),
    InvalidArgument { verb: &'static str, value: String },
    UnexpectedArgument(&'static str),
    TooManyArguments(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty request"),
            Self::UnknownVerb(verb) => write!(f, "unknown request: '{verb}'"),
            Self::MissingArgument(verb) => write!(f, "'{verb}' needs an argument"),
            Self::InvalidArgument { verb, value } => {
                write!(f, "invalid argument for '{verb}': '{value}'")
            }
            Self::UnexpectedArgument(verb) => write!(f, "'{verb}' takes no argument"),
            Self::TooManyArguments(verb) => write!(f, "'{verb}' takes at most one argument"),
        }
    }
}

impl std::error::Error for ParseError {}

const VERBS: [&str; 11] = [
    "insert", "search", "delete", "random", "order", "speed", "reset", "stats", "layout", "log",
    "check",
];

impl FromStr for Request {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let word = words.next().ok_or(ParseError::Empty)?.to_ascii_lowercase();
        let verb = VERBS
            .into_iter()
            .find(|v| *v == word)
            .ok_or(ParseError::UnknownVerb(word))?;
        let argument = words.next();
        if words.next().is_some() {
            return Err(ParseError::TooManyArguments(verb));
        }

        let request = match verb {
            "insert" => Self::Run(Command::Insert(parse_arg(verb, argument)?)),
            "search" => Self::Run(Command::Search(parse_arg(verb, argument)?)),
            "delete" => Self::Run(Command::Delete(parse_arg(verb, argument)?)),
            "random" => {
                let count = match argument {
                    Some(_) => parse_arg::<usize>(verb, argument)?,
                    None => DEFAULT_RANDOM_COUNT,
                };
                if count > MAX_RANDOM_COUNT {
                    return Err(invalid(verb, &count.to_string()));
                }
                Self::Random(count)
            }
            "order" => Self::SetOrder(parse_arg(verb, argument)?),
            "speed" => Self::SetSpeed(parse_arg(verb, argument)?),
            "reset" => no_arg(verb, argument, Self::Reset)?,
            "stats" => no_arg(verb, argument, Self::Stats)?,
            "layout" => no_arg(verb, argument, Self::Layout)?,
            "log" => no_arg(verb, argument, Self::Log)?,
            _ => no_arg(verb, argument, Self::Check)?,
        };
        Ok(request)
    }
}

fn invalid(verb: &'static str, value: &str) -> ParseError {
    ParseError::InvalidArgument {
        verb,
        value: value.to_string(),
    }
}

fn parse_arg<T: FromStr>(verb: &'static str, argument: Option<&str>) -> Result<T, ParseError> {
    let value = argument.ok_or(ParseError::MissingArgument(verb))?;
    value.parse().map_err(|_| invalid(verb, value))
}

const fn no_arg(
    verb: &'static str,
    argument: Option<&str>,
    request: Request,
) -> Result<Request, ParseError> {
    match argument {
        Some(_) => Err(ParseError::UnexpectedArgument(verb)),
        None => Ok(request),
    }
}
