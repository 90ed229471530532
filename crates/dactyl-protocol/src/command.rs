//! The enumerated command set of the control channel.
//!
//! Wire syntax, one command per line:
//!
//! ```text
//! ADD <finger> <username> <0|1>
//! RETRY <cause>
//! ```
//!
//! `ADD` queues a simulated scan event: the next scan the device
//! consumes carries the given finger and username and is declared a
//! match (`1`) or non-match (`0`) against whatever probe is being
//! evaluated. `RETRY` queues a transient scan failure instead.
//! Anything else is a protocol error; there are no silently ignored
//! commands.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use dactyl_core::{Error, Finger, Result, RetryCause};

/// Binary match decision carried by a queued scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Match,
    NoMatch,
}

impl MatchOutcome {
    /// Parse the wire code of an `ADD` command.
    ///
    /// `1`, `success`, `SUCCESS` and `MATCH` mean match; any other
    /// code means non-match. The decision is binary by construction,
    /// never scored.
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" | "success" | "SUCCESS" | "MATCH" => MatchOutcome::Match,
            _ => MatchOutcome::NoMatch,
        }
    }

    pub fn is_match(self) -> bool {
        matches!(self, MatchOutcome::Match)
    }

    /// Canonical wire code.
    pub fn code(self) -> &'static str {
        match self {
            MatchOutcome::Match => "1",
            MatchOutcome::NoMatch => "0",
        }
    }
}

/// A parsed control-channel command.
///
/// # Examples
///
/// ```
/// use dactyl_protocol::{MatchOutcome, SimCommand};
/// use dactyl_core::Finger;
///
/// let cmd: SimCommand = "ADD left-little testuser 1".parse().unwrap();
/// assert_eq!(
///     cmd,
///     SimCommand::Add {
///         finger: Finger::LeftLittle,
///         username: "testuser".into(),
///         outcome: MatchOutcome::Match,
///     }
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SimCommand {
    /// Queue a scan event attributed to `finger`/`username` with the
    /// given match outcome.
    Add {
        finger: Finger,
        username: String,
        outcome: MatchOutcome,
    },

    /// Queue a transient scan failure with the given cause.
    Retry { cause: RetryCause },
}

impl SimCommand {
    /// Parse one command line.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Protocol`] on an unknown command word, an
    /// unknown finger or retry-cause nick, or missing fields. An
    /// `ADD` naming the `unknown` finger is rejected: scan events must
    /// be attributable.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (word, rest) = match line.split_once(' ') {
            Some((word, rest)) => (word, rest),
            None => (line, ""),
        };

        match word {
            "ADD" => Self::parse_add(rest),
            "RETRY" => Self::parse_retry(rest),
            other => Err(Error::protocol(format!("unknown command '{other}'"))),
        }
    }

    fn parse_add(args: &str) -> Result<Self> {
        let mut parts = args.splitn(3, ' ');
        let (Some(finger), Some(username), Some(code)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::protocol(format!(
                "ADD needs <finger> <username> <0|1>, got '{args}'"
            )));
        };

        let finger: Finger = finger.parse()?;
        if finger == Finger::Unknown {
            return Err(Error::protocol("ADD cannot queue an unattributed finger"));
        }
        if username.is_empty() {
            return Err(Error::protocol("ADD needs a non-empty username"));
        }

        Ok(SimCommand::Add {
            finger,
            username: username.to_string(),
            outcome: MatchOutcome::from_code(code),
        })
    }

    fn parse_retry(args: &str) -> Result<Self> {
        if args.is_empty() {
            return Err(Error::protocol("RETRY needs a <cause>"));
        }
        Ok(SimCommand::Retry {
            cause: args.parse()?,
        })
    }
}

impl FromStr for SimCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SimCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimCommand::Add {
                finger,
                username,
                outcome,
            } => write!(f, "ADD {finger} {username} {}", outcome.code()),
            SimCommand::Retry { cause } => write!(f, "RETRY {cause}"),
        }
    }
}
