//! In-memory stream used by the unit tests

use std::io::{self, Cursor, Read, Write};

/// Stream that replays scripted input and records everything written
#[derive(Debug, Default)]
pub struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    read_end: Option<io::ErrorKind>,
    pub written: Vec<u8>,
    write_limit: Option<usize>,
    write_end: Option<io::ErrorKind>,
}

impl ScriptedStream {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: Cursor::new(input.into()),
            ..Self::default()
        }
    }

    /// Standard greeting followed by `payload`
    pub fn greeting_then(payload: impl AsRef<[u8]>) -> Self {
        let mut input = b"HELO\nhostX\nlocY\n".to_vec();
        input.extend_from_slice(payload.as_ref());
        Self::new(input)
    }

    /// Fail reads with `kind` once the scripted input is exhausted instead of EOF
    pub fn read_error_at_end(mut self, kind: io::ErrorKind) -> Self {
        self.read_end = Some(kind);
        self
    }

    /// Accept `limit` bytes, then fail writes with `kind`. `WriteZero` is
    /// simulated as a write that accepts nothing.
    pub fn write_error_after(mut self, limit: usize, kind: io::ErrorKind) -> Self {
        self.write_limit = Some(limit);
        self.write_end = Some(kind);
        self
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.input.read(buf)?;
        match (n, self.read_end) {
            (0, Some(kind)) if !buf.is_empty() => Err(kind.into()),
            _ => Ok(n),
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let accepted = match self.write_limit {
            Some(limit) => {
                let room = limit.saturating_sub(self.written.len());
                if room == 0 {
                    return match self.write_end {
                        Some(io::ErrorKind::WriteZero) | None => Ok(0),
                        Some(kind) => Err(kind.into()),
                    };
                }
                room.min(buf.len())
            }
            None => buf.len(),
        };
        self.written.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
