//! One client connection on the reference server
//!
//! A session is a handshake followed by exactly one test mode: echo for
//! pings, discard for client uploads, or a timed random stream for client
//! downloads. The session ends when the mode ends.

use crate::client::is_graceful_transfer_end;
use crate::protocol::{Command, ProtocolError, ServerInfo};
use crate::server::monitor::ServerCounters;
use rand::RngCore;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Read buffer used for echo and discard modes
const IO_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client closed the connection before sending a command")]
    Closed,

    #[error("unexpected command {0} at this point of the session")]
    UnexpectedCommand(Command),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Per-connection behavior of the server
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub info: ServerInfo,
    /// How long to stream data after SND
    pub send_duration: Duration,
    pub chunk_size: usize,
}

/// Serve a single client until its test mode finishes
///
/// Returns the mode the client selected.
pub fn handle_session<S: Read + Write>(
    stream: S,
    settings: &SessionSettings,
    counters: &ServerCounters,
) -> Result<Command, SessionError> {
    let mut reader = BufReader::new(stream);

    match read_command(&mut reader, counters)? {
        Command::Helo(version) => debug!(version = version, "Handshake received"),
        other => return Err(SessionError::UnexpectedCommand(other)),
    }

    let greeting = settings.info.greeting();
    reader.get_mut().write_all(greeting.as_bytes())?;
    counters.add_sent(greeting.len() as u64);

    let command = read_command(&mut reader, counters)?;
    debug!(command = %command, "Entering test mode");
    match command {
        Command::Echo => echo(&mut reader, counters)?,
        Command::Receive => discard(&mut reader, counters)?,
        Command::Send => stream_random(reader.get_mut(), settings, counters)?,
        Command::Helo(_) => return Err(SessionError::UnexpectedCommand(command)),
    }
    Ok(command)
}

fn read_command<R: BufRead>(
    reader: &mut R,
    counters: &ServerCounters,
) -> Result<Command, SessionError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Err(SessionError::Closed);
    }
    counters.add_received(n as u64);
    Ok(Command::parse(&line)?)
}

/// Read whatever arrives and end on a clean or abrupt close
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    match reader.read(buf) {
        Err(e) if is_graceful_transfer_end(&e) => Ok(0),
        other => other,
    }
}

fn echo<S: Read + Write>(
    reader: &mut BufReader<S>,
    counters: &ServerCounters,
) -> Result<(), SessionError> {
    let mut buf = [0u8; IO_BUFFER_SIZE];
    loop {
        let n = read_some(reader, &mut buf)?;
        if n == 0 {
            return Ok(());
        }
        counters.add_received(n as u64);
        match reader.get_mut().write_all(&buf[..n]) {
            Ok(()) => counters.add_sent(n as u64),
            Err(e) if is_graceful_transfer_end(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

fn discard<R: Read>(reader: &mut R, counters: &ServerCounters) -> Result<(), SessionError> {
    let mut buf = [0u8; IO_BUFFER_SIZE];
    loop {
        let n = read_some(reader, &mut buf)?;
        if n == 0 {
            return Ok(());
        }
        counters.add_received(n as u64);
    }
}

fn stream_random<W: Write>(
    writer: &mut W,
    settings: &SessionSettings,
    counters: &ServerCounters,
) -> Result<(), SessionError> {
    let mut payload = vec![0u8; settings.chunk_size];
    rand::thread_rng().fill_bytes(&mut payload);

    let start = Instant::now();
    loop {
        match writer.write_all(&payload) {
            Ok(()) => counters.add_sent(payload.len() as u64),
            Err(e) if is_graceful_transfer_end(&e) => {
                debug!("Client stopped reading");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        if start.elapsed() >= settings.send_duration {
            return Ok(());
        }
    }
}
