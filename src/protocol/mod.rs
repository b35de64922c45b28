//! Protocol module: sparkyfish command framing and greeting handling

pub mod error;
pub mod message;

pub use error::{ProtocolError, Result as ProtocolResult};
pub use message::{
    check_greeting, Command, ServerInfo, COMMAND_TERMINATOR, GREETING, NO_CANONICAL_NAME,
    PING_BYTE, PROTOCOL_VERSION,
};
