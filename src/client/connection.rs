use crate::client::error::{ClientError, Result};
use crate::client::interface;
use crate::protocol::{check_greeting, Command, ProtocolError, ServerInfo, PROTOCOL_VERSION};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where and how to reach a sparkyfish server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Local interface whose first address the connection is bound to
    pub interface: Option<String>,
    /// Read and write timeout applied to every connection
    pub timeout: Option<Duration>,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            interface: None,
            timeout: None,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn remote(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Lifecycle of a [`ProtocolClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
    HandshakeSent,
    Ready,
    Failed,
}

/// Open a TCP connection to the target, bound to its interface if one is set
pub fn dial(target: &Target) -> Result<TcpStream> {
    let remote = target.remote();
    debug!(remote = %remote, "Dialing remote server");

    let stream = match &target.interface {
        None => TcpStream::connect(&remote)
            .map_err(|e| ClientError::connection(format!("dialing remote server {}", remote), e))?,
        Some(name) => {
            let local_ip = interface::first_address(name)?;
            info!(interface = %name, ip = %local_ip, "Set local address");
            dial_from(&remote, local_ip)?
        }
    };

    if let Some(timeout) = target.timeout {
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .map_err(|e| ClientError::connection("setting socket timeout", e))?;
    }

    debug!(remote = %remote, "TCP connection established");
    Ok(stream)
}

fn dial_from(remote: &str, local_ip: IpAddr) -> Result<TcpStream> {
    let addr = remote
        .to_socket_addrs()
        .map_err(|e| ClientError::connection(format!("resolving {}", remote), e))?
        .find(|addr| addr.is_ipv4() == local_ip.is_ipv4())
        .ok_or_else(|| {
            ClientError::Config(format!(
                "{} has no address in the same family as {}",
                remote, local_ip
            ))
        })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ClientError::connection("creating socket", e))?;
    socket
        .bind(&SocketAddr::new(local_ip, 0).into())
        .map_err(|e| ClientError::connection(format!("binding to {}", local_ip), e))?;
    socket
        .connect(&addr.into())
        .map_err(|e| ClientError::connection(format!("dialing remote server {}", remote), e))?;

    Ok(socket.into())
}

/// One handshaken connection to a sparkyfish server
///
/// Reads go through a buffered reader so bytes that arrive together with the
/// greeting are not lost. The connection closes when the client is dropped.
#[derive(Debug)]
pub struct ProtocolClient<S: Read + Write> {
    reader: BufReader<S>,
    remote: String,
    state: ConnectionState,
    server: Option<ServerInfo>,
}

impl ProtocolClient<TcpStream> {
    /// Dial the target and perform the handshake
    pub fn connect(target: &Target) -> Result<Self> {
        let stream = dial(target)?;
        let mut client = Self::new(stream, target.remote());
        client.handshake()?;
        Ok(client)
    }
}

impl<S: Read + Write> ProtocolClient<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S, remote: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(stream),
            remote: remote.into(),
            state: ConnectionState::Connected,
            server: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The underlying stream
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Identity announced by the server, available once the handshake succeeded
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Send `HELO` and read the server's greeting
    pub fn handshake(&mut self) -> Result<&ServerInfo> {
        match self.try_handshake() {
            Ok(info) => {
                debug!(
                    cn = %info.canonical_name,
                    location = %info.location,
                    "Connected to server"
                );
                self.state = ConnectionState::Ready;
                Ok(self.server.insert(info))
            }
            Err(e) => {
                warn!(remote = %self.remote, error = %e, "Handshake failed");
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    fn try_handshake(&mut self) -> Result<ServerInfo> {
        self.write_command(Command::Helo(PROTOCOL_VERSION))?;
        self.state = ConnectionState::HandshakeSent;

        let helo = self
            .read_line()
            .map_err(ProtocolError::GreetingUnreadable)?;
        check_greeting(&helo)?;

        let cn = self
            .read_line()
            .map_err(|source| ProtocolError::MissingServerInfo { field: "cn", source })?;
        let loc = self
            .read_line()
            .map_err(|source| ProtocolError::MissingServerInfo { field: "loc", source })?;

        Ok(ServerInfo::from_lines(&cn, &loc, &self.remote))
    }

    /// Write `<command>\r\n` to the server
    pub fn write_command(&mut self, command: Command) -> Result<()> {
        debug!(command = %command, "Sending command");
        let stream = self.reader.get_mut();
        stream
            .write_all(&command.frame())
            .and_then(|_| stream.flush())
            .map_err(|e| {
                self.state = ConnectionState::Failed;
                ClientError::connection(format!("sending command {:?}", command.to_string()), e)
            })
    }

    /// Read one newline-terminated line; a line cut short by EOF is an error
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        if !line.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end of line",
            ));
        }
        Ok(line)
    }
}

impl<S: Read + Write> Read for ProtocolClient<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<S: Read + Write> Write for ProtocolClient<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reader.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }
}

impl<S: Read + Write> Drop for ProtocolClient<S> {
    fn drop(&mut self) {
        debug!(remote = %self.remote, state = ?self.state, "Closing connection");
    }
}

/// Source of fresh, handshaken connections
///
/// Every probe asks for its own connection; none is ever reused.
pub trait Dialer {
    type Stream: Read + Write;

    fn dial(&self) -> Result<ProtocolClient<Self::Stream>>;
}

/// Dialer for real TCP connections
#[derive(Debug, Clone)]
pub struct TcpDialer {
    target: Target,
}

impl TcpDialer {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&self) -> Result<ProtocolClient<TcpStream>> {
        ProtocolClient::connect(&self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::ScriptedStream;
    use mockall::mock;

    mock! {
        pub Dialer {}

        impl Dialer for Dialer {
            type Stream = ScriptedStream;

            fn dial(&self) -> Result<ProtocolClient<ScriptedStream>>;
        }
    }

    fn client(input: &[u8]) -> ProtocolClient<ScriptedStream> {
        ProtocolClient::new(ScriptedStream::new(input), "10.1.2.3:7121")
    }

    #[test]
    fn test_handshake_success() -> Result<()> {
        let mut client = client(b"HELO\nhostX\nlocY\n");
        assert_eq!(client.state(), ConnectionState::Connected);

        let info = client.handshake()?.clone();
        assert_eq!(info.canonical_name, "hostX");
        assert_eq!(info.location, "locY");
        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(client.get_ref().written, b"HELO0\r\n");
        Ok(())
    }

    #[test]
    fn test_handshake_none_uses_dialed_address() -> Result<()> {
        let mut client = client(b"HELO\r\nnone\r\nlocY\r\n");
        let info = client.handshake()?;
        assert_eq!(info.canonical_name, "10.1.2.3:7121");
        Ok(())
    }

    #[test]
    fn test_handshake_rejects_wrong_greeting() {
        let mut client = client(b"HELLO\nhostX\nlocY\n");
        let err = client.handshake().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::UnexpectedGreeting(_))
        ));
        assert_eq!(client.state(), ConnectionState::Failed);
        assert!(client.server_info().is_none());
    }

    #[test]
    fn test_handshake_closed_before_greeting() {
        let mut client = client(b"");
        let err = client.handshake().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::GreetingUnreadable(_))
        ));
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_handshake_missing_location() {
        let mut client = client(b"HELO\nhostX\nloc-without-newline");
        let err = client.handshake().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::MissingServerInfo { field: "loc", .. })
        ));
    }

    #[test]
    fn test_write_failure_is_connection_error() {
        let stream = ScriptedStream::new(b"HELO\nhostX\nlocY\n".to_vec())
            .write_error_after(0, io::ErrorKind::BrokenPipe);
        let mut client = ProtocolClient::new(stream, "10.1.2.3:7121");
        let err = client.handshake().unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_bytes_after_greeting_stay_readable() -> Result<()> {
        let mut client = client(b"HELO\nhostX\nlocY\n...");
        client.handshake()?;
        let mut buf = [0u8; 3];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"...");
        Ok(())
    }

    #[test]
    fn test_mock_dialer() -> Result<()> {
        let mut dialer = MockDialer::new();
        dialer.expect_dial().times(1).returning(|| {
            let mut client = ProtocolClient::new(
                ScriptedStream::greeting_then(b""),
                "10.1.2.3:7121",
            );
            client.handshake()?;
            Ok(client)
        });

        let client = dialer.dial()?;
        assert_eq!(client.state(), ConnectionState::Ready);
        Ok(())
    }

    #[test]
    fn test_target_remote() {
        assert_eq!(Target::new("spark.example.com", 7121).remote(), "spark.example.com:7121");
        assert_eq!(Target::new("::1", 7121).remote(), "[::1]:7121");
        assert_eq!(Target::new("[::1]", 7121).remote(), "[::1]:7121");
    }

    #[test]
    fn test_dial_refused_is_connection_error() {
        // Bind then drop to find a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = dial(&Target::new("127.0.0.1", port)).unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
    }

    #[test]
    fn test_dial_unknown_interface_is_config_error() {
        let target = Target::new("127.0.0.1", 7121).with_interface("does_not_exist_xyz99");
        let err = dial(&target).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}

#[cfg(test)]
pub use tests::MockDialer;
