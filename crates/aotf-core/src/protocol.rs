//! AOTF command framing and completion detection
//!
//! Commands are ASCII text terminated by a carriage return. The controller
//! answers by echoing the command, then the reply lines, then a line holding
//! an asterisk. All reply lines are separated by CR LF:
//!
//! ```text
//! -> "BoardId Serial\r"
//! <- "BoardId Serial\r\n" "2410-0042\r\n" "* "
//! ```

use core::fmt;
use std::time::{Duration, Instant};

/// Appended to every command before it is written
pub const COMMAND_TERMINATOR: &str = "\r";

/// Separator between reply lines
pub const LINE_SEPARATOR: &str = "\r\n";

/// Character that marks the final reply line
pub const COMPLETION_MARKER: char = '*';

/// Bytes requested from the transport per read
pub const DEFAULT_READ_LEN: usize = 256;

/// Wall-clock budget of a single query
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between polls when no data is available
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Frame a command for transmission
pub fn frame_command(command: &str) -> Vec<u8> {
    let mut framed = Vec::with_capacity(command.len() + COMMAND_TERMINATOR.len());
    framed.extend_from_slice(command.as_bytes());
    framed.extend_from_slice(COMMAND_TERMINATOR.as_bytes());
    framed
}

/// Whether `buffer` holds a complete reply to `command`
///
/// The first line must be the echoed command and the last non-empty line
/// must contain the completion marker. A trailing CR LF after the marker
/// line leaves an empty segment, which is ignored.
pub fn is_complete(buffer: &str, command: &str) -> bool {
    let mut lines = buffer.split(LINE_SEPARATOR);
    if lines.next() != Some(command) {
        return false;
    }
    lines
        .filter(|line| !line.is_empty())
        .last()
        .is_some_and(|line| line.contains(COMPLETION_MARKER))
}

/// Strip the echo and the completion marker from a complete reply
pub fn extract_payload(buffer: &str, command: &str) -> String {
    let body = buffer.strip_prefix(command).unwrap_or(buffer);
    let body = body.strip_prefix(LINE_SEPARATOR).unwrap_or(body);
    body.trim_end_matches(|c: char| c == COMPLETION_MARKER || c.is_whitespace())
        .to_string()
}

/// Result of a query
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Response {
    /// The controller finished replying; the payload has echo and marker removed
    Completed(String),
    /// No complete reply arrived within the timeout
    TimedOut,
}

impl Response {
    /// Payload of a completed reply
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Completed(payload) => Some(payload),
            Self::TimedOut => None,
        }
    }

    /// Consume the response, returning the payload of a completed reply
    pub fn into_payload(self) -> Option<String> {
        match self {
            Self::Completed(payload) => Some(payload),
            Self::TimedOut => None,
        }
    }

    /// Whether the query ran out of time
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(payload) => f.write_str(payload),
            Self::TimedOut => f.write_str("<timed out>"),
        }
    }
}

/// State of one in-flight query
///
/// Created when the command is written and dropped when the query returns.
#[derive(Debug)]
pub struct PendingExchange {
    command: String,
    received: Vec<u8>,
    started: Instant,
    timeout: Duration,
}

impl PendingExchange {
    /// Start tracking a reply to `command`
    pub fn new(command: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            received: Vec::new(),
            started: Instant::now(),
            timeout,
        }
    }

    /// Append bytes read from the transport
    pub fn push(&mut self, bytes: &[u8]) {
        self.received.extend_from_slice(bytes);
    }

    /// Everything received so far, decoded as text
    pub fn buffer(&self) -> String {
        String::from_utf8_lossy(&self.received).into_owned()
    }

    /// The reply payload, once the reply is complete
    pub fn payload(&self) -> Option<String> {
        let buffer = self.buffer();
        is_complete(&buffer, &self.command).then(|| extract_payload(&buffer, &self.command))
    }

    /// Time since the command was written
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the timeout has passed
    pub fn is_expired(&self) -> bool {
        self.elapsed() > self.timeout
    }
}
