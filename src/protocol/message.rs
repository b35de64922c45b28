use crate::protocol::error::{ProtocolError, Result};
use std::fmt;
use tracing::debug;

/// Protocol version advertised in the `HELO` command
pub const PROTOCOL_VERSION: u8 = 0;

/// Payload byte sent (and echoed back) on every ping round trip
pub const PING_BYTE: u8 = 0x2E;

/// Acknowledgement line expected in response to `HELO`
pub const GREETING: &str = "HELO";

/// Canonical name a server sends when it has none configured
pub const NO_CANONICAL_NAME: &str = "none";

/// Terminator appended to every client command
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Commands understood by a sparkyfish server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Handshake, carrying the client's protocol version
    Helo(u8),
    /// Switch the server into echo mode
    Echo,
    /// Server receives a data stream from the client
    Receive,
    /// Server sends a data stream to the client
    Send,
}

impl Command {
    /// Encode the command as it travels on the wire, terminator included
    pub fn frame(&self) -> Vec<u8> {
        format!("{}{}", self, COMMAND_TERMINATOR).into_bytes()
    }

    /// Parse a single command line as read by a server
    pub fn parse(line: &str) -> Result<Self> {
        let verb = line.trim();
        let command = match verb {
            "ECO" => Command::Echo,
            "RCV" => Command::Receive,
            "SND" => Command::Send,
            _ => {
                let version = verb
                    .strip_prefix(GREETING)
                    .and_then(|v| v.parse::<u8>().ok())
                    .ok_or_else(|| ProtocolError::UnknownCommand(verb.to_string()))?;
                Command::Helo(version)
            }
        };
        debug!(command = %command, "Command parsed");
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Helo(version) => write!(f, "{}{}", GREETING, version),
            Command::Echo => f.write_str("ECO"),
            Command::Receive => f.write_str("RCV"),
            Command::Send => f.write_str("SND"),
        }
    }
}

/// Identity a server announces after acknowledging the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub canonical_name: String,
    pub location: String,
}

impl ServerInfo {
    /// Build from the two raw greeting lines; `none` is replaced by `remote`
    pub fn from_lines(canonical_name: &str, location: &str, remote: &str) -> Self {
        let canonical_name = match canonical_name.trim() {
            NO_CANONICAL_NAME => remote.to_string(),
            name => name.to_string(),
        };
        Self {
            canonical_name,
            location: location.trim().to_string(),
        }
    }

    /// Server side of the greeting: acknowledgement, name and location lines
    pub fn greeting(&self) -> String {
        format!("{}\n{}\n{}\n", GREETING, self.canonical_name, self.location)
    }
}

/// Check the first line a server sends back after `HELO`
pub fn check_greeting(line: &str) -> Result<()> {
    if line.trim() == GREETING {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedGreeting(line.trim().to_string()))
    }
}
