//! No-IP response interpretation
//!
//! The update endpoint answers with a short plaintext body such as
//! `good 203.0.113.5` or `badauth`. This module classifies that body into a
//! [`StatusCode`], decides what the scheduler should do next, and computes the
//! sensor state that gets exposed on the contact characteristic.
//!
//! Two sensor values are produced for every response:
//!
//! - `classified`: derived from the matched token, drives logging and the
//!   suspend policy
//! - `sensor`: `InSync` iff the body contains `nochg` anywhere; this is the
//!   value written to the accessory
//!
//! A `good` response therefore logs as in-sync while the exposed sensor reads
//! out-of-sync until the next `nochg`.

use std::fmt;

use tracing::Level;

use crate::sensor::SensorState;

/// Token the provider returns when the record already matches
pub const NO_CHANGE_TOKEN: &str = "nochg";

/// Tokens searched before anything else
const COMMON_CODES: [StatusCode; 2] = [StatusCode::Good, StatusCode::NoChange];

/// Tokens that halt polling until an operator intervenes
const FATAL_CODES: [StatusCode; 6] = [
    StatusCode::NoHost,
    StatusCode::BadAuth,
    StatusCode::BadAgent,
    StatusCode::NotDonator,
    StatusCode::Abuse,
    StatusCode::ServerError,
];

/// Known status tokens of the `/nic/update` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// `good`: the record was updated
    Good,
    /// `nochg`: the record already had this address
    NoChange,
    /// `nohost`: hostname does not exist under the account
    NoHost,
    /// `badauth`: invalid username/password
    BadAuth,
    /// `badagent`: client disabled by the provider
    BadAgent,
    /// `!donator`: feature needs a paid account
    NotDonator,
    /// `abuse`: account blocked
    Abuse,
    /// `911`: provider-side fatal error
    ServerError,
}

impl StatusCode {
    /// The literal token as it appears in the response body
    pub fn token(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::NoChange => NO_CHANGE_TOKEN,
            Self::NoHost => "nohost",
            Self::BadAuth => "badauth",
            Self::BadAgent => "badagent",
            Self::NotDonator => "!donator",
            Self::Abuse => "abuse",
            Self::ServerError => "911",
        }
    }

    /// Whether this code suspends polling
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::Good | Self::NoChange)
    }

    /// Operator-facing explanation for fatal codes
    pub fn explanation(self) -> &'static str {
        match self {
            Self::Good => "IP address has been updated.",
            Self::NoChange => "IP address has not changed.",
            Self::NoHost => {
                "Hostname supplied does not exist under specified account, client exit and \
                 require user to enter new login credentials before performing an additional request."
            }
            Self::BadAuth => "Invalid username password combination.",
            Self::BadAgent => {
                "Client disabled. Client should exit and not perform any more updates \
                 without user intervention."
            }
            Self::NotDonator => {
                "An update request was sent, including a feature that is not available to \
                 that particular user such as offline options."
            }
            Self::Abuse => {
                "Username is blocked due to abuse. Either for not following our update \
                 specifications or disabled due to violation of the No-IP terms of service. \
                 Our terms of service can be viewed [here](https://www.noip.com/legal/tos). \
                 Client should stop sending updates."
            }
            Self::ServerError => {
                "A fatal error on our side such as a database outage. Retry the update no \
                 sooner than 30 minutes."
            }
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// What the scheduler should do after a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep polling on the fixed interval
    Continue,
    /// Halt polling until the device is reconstructed
    Suspend,
}

/// A parsed response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResponse {
    /// Trimmed response text
    pub raw: String,
    /// First matching status token, if any
    pub code: Option<StatusCode>,
    /// Second whitespace-delimited field (the echoed IP for good/nochg)
    pub detail: Option<String>,
}

impl UpdateResponse {
    /// Parse a raw response body
    pub fn parse(body: &str) -> Self {
        let raw = body.trim().to_string();
        let code = leftmost_match(&raw, &COMMON_CODES).or_else(|| fatal_token(&raw));
        let detail = raw.split_whitespace().nth(1).map(str::to_string);

        Self { raw, code, detail }
    }

    /// Whether the body contains the no-change token anywhere
    pub fn reports_no_change(&self) -> bool {
        self.raw.contains(NO_CHANGE_TOKEN)
    }
}

/// First token of `codes` to occur in `text`, by position
fn leftmost_match(text: &str, codes: &[StatusCode]) -> Option<StatusCode> {
    codes
        .iter()
        .filter_map(|code| text.find(code.token()).map(|pos| (pos, *code)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, code)| code)
}

/// First whitespace-delimited word of `text` that is a fatal token
fn fatal_token(text: &str) -> Option<StatusCode> {
    text.split_whitespace()
        .find_map(|word| FATAL_CODES.iter().copied().find(|code| code.token() == word))
}

/// Outcome of interpreting one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    /// The parsed response
    pub response: UpdateResponse,
    /// State exposed on the contact characteristic
    pub sensor: SensorState,
    /// State implied by the classified token (`None` when unrecognized)
    pub classified: Option<SensorState>,
    /// Scheduler directive
    pub directive: Directive,
    /// Level the message should be logged at
    pub level: Level,
    /// Human-readable message
    pub message: String,
}

/// Interpret a raw response body for the device named `display_name`
pub fn interpret(display_name: &str, body: &str) -> Interpretation {
    let response = UpdateResponse::parse(body);
    let sensor = if response.reports_no_change() {
        SensorState::InSync
    } else {
        SensorState::OutOfSync
    };
    let ip = response.detail.as_deref().unwrap_or("unknown");

    let (classified, directive, level, message) = match response.code {
        None => (None, Directive::Continue, Level::DEBUG, response.raw.clone()),
        Some(StatusCode::NoChange) => (
            Some(SensorState::InSync),
            Directive::Continue,
            Level::DEBUG,
            format!("{display_name}'s IP address has not updated, IP address: {ip}"),
        ),
        Some(StatusCode::Good) => (
            Some(SensorState::InSync),
            Directive::Continue,
            Level::WARN,
            format!("{display_name}'s IP address has been updated, IP address: {ip}"),
        ),
        Some(code) => (
            Some(SensorState::OutOfSync),
            Directive::Suspend,
            Level::ERROR,
            code.explanation().to_string(),
        ),
    };

    Interpretation {
        response,
        sensor,
        classified,
        directive,
        level,
        message,
    }
}
