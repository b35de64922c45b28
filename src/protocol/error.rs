use thiserror::Error;

/// Protocol-level errors for command framing and the greeting exchange
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected response to greeting: {0:?}")]
    UnexpectedGreeting(String),

    #[error("unexpected response to greeting: {0}")]
    GreetingUnreadable(#[source] std::io::Error),

    #[error("reading {field} string: {source}")]
    MissingServerInfo {
        field: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
