//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTPUT: &str = "output.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Destination of the final JSON artifact.
    pub output: PathBuf,
    pub connect_timeout: Option<Duration>,
    /// Applied to reads and writes on the socket.
    pub read_timeout: Option<Duration>,
    /// Open a second connection for the repair pass instead of reusing the stream.
    pub reconnect_for_repairs: bool,
}

impl ClientConfig {
    /// `host:port`, with IPv6 literals bracketed so the result resolves.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            output: PathBuf::from(DEFAULT_OUTPUT),
            connect_timeout: None,
            read_timeout: None,
            reconnect_for_repairs: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration must not be empty")]
    Empty,

    #[error("invalid duration value: {0}")]
    Invalid(String),

    #[error("duration must be greater than zero")]
    Zero,
}

/// Parse `150ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| DurationError::Invalid(input.to_string()))?;
    if value == 0 {
        return Err(DurationError::Zero);
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
