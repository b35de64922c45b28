use crate::protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Sub-test of a full run, attached to errors for context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ping,
    Send,
    Receive,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Ping => f.write_str("ping"),
            Phase::Send => f.write_str("send"),
            Phase::Receive => f.write_str("receive"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error while {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transfer error: {0}")]
    Transfer(#[source] std::io::Error),

    #[error("{phase} test failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Wrap an I/O failure as a connection error with a short description
    pub fn connection(context: impl Into<String>, source: std::io::Error) -> Self {
        ClientError::Connection {
            context: context.into(),
            source,
        }
    }

    /// Attach the sub-test that produced this error
    pub fn in_phase(self, phase: Phase) -> Self {
        ClientError::Phase {
            phase,
            source: Box::new(self),
        }
    }

    /// The sub-test this error was raised in, if known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ClientError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The error with any phase context removed
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_phase_context_in_message() {
        let err = ClientError::connection("dialing remote server", io::ErrorKind::ConnectionRefused.into())
            .in_phase(Phase::Ping);
        assert_eq!(err.phase(), Some(Phase::Ping));
        assert!(matches!(err.root(), ClientError::Connection { .. }));
        let message = err.to_string();
        assert!(message.starts_with("ping test failed"));
        assert!(message.contains("dialing remote server"));
    }

    #[test]
    fn test_protocol_error_converts() {
        let err: ClientError = ProtocolError::UnexpectedGreeting("NOPE".into()).into();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert_eq!(err.phase(), None);
    }
}
