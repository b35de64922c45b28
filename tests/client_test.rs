use continuous_spark::client::{
    ClientError, Direction, LatencyProbe, MonotonicClock, Phase, ProtocolClient, Result, Target,
    TestRunner, ThroughputProbe,
};
use continuous_spark::protocol::{ProtocolError, ServerInfo};
use continuous_spark::server::{handle_session, ServerCounters, SessionSettings};
use socket2::SockRef;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Test helper: reference server on an ephemeral port, one thread per client
fn start_reference_server(send_duration: Duration) -> (u16, Arc<ServerCounters>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test server");
    let port = listener.local_addr().unwrap().port();
    let counters = Arc::new(ServerCounters::default());
    let settings = Arc::new(SessionSettings {
        info: ServerInfo {
            canonical_name: "none".into(),
            location: "Test Lab".into(),
        },
        send_duration,
        chunk_size: 16 * 1024,
    });

    let server_counters = Arc::clone(&counters);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            server_counters.connection_opened();
            let counters = Arc::clone(&server_counters);
            let settings = Arc::clone(&settings);
            thread::spawn(move || {
                let _ = handle_session(stream, &settings, &counters);
                counters.connection_closed();
            });
        }
    });

    (port, counters)
}

/// Test helper: accept a single connection and hand it to `handler`
fn start_mock_server<F>(handler: F) -> u16
where
    F: FnOnce(BufReader<TcpStream>, TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind test server");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let reader = BufReader::new(stream.try_clone().unwrap());
            handler(reader, stream);
        }
    });
    port
}

fn expect_line(reader: &mut BufReader<TcpStream>, expected: &str) {
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line.trim_end(), expected);
}

/// Test helper: wait for the server to see every client socket closed
fn wait_until_idle(counters: &ServerCounters) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if counters.snapshot().active == 0 {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn target(port: u16) -> Target {
    Target::new("127.0.0.1", port).with_timeout(TIMEOUT)
}

#[test]
fn test_full_run_against_reference_server() -> Result<()> {
    let (port, counters) = start_reference_server(Duration::from_secs(2));

    let result = TestRunner::for_target(target(port))
        .with_ping_count(5)
        .with_budget(Duration::from_millis(200))
        .with_chunk_size(16 * 1024)
        .run()?;

    assert_eq!(result.ping.samples, 5);
    assert!(result.ping.min <= result.ping.avg);
    assert!(result.ping.avg <= result.ping.max);

    for summary in [&result.send, &result.receive] {
        assert!(summary.samples > 0);
        assert!(summary.min <= summary.avg);
        assert!(summary.avg <= summary.max);
    }

    // one connection per sub-test
    assert_eq!(counters.snapshot().connections, 3);
    Ok(())
}

#[test]
fn test_consecutive_runs_are_independent() -> Result<()> {
    let (port, counters) = start_reference_server(Duration::from_millis(300));
    let runner = TestRunner::for_target(target(port))
        .with_ping_count(3)
        .with_budget(Duration::from_millis(100))
        .with_chunk_size(16 * 1024);

    let first = runner.run()?;
    assert!(wait_until_idle(&counters), "connections left open after first run");
    assert_eq!(counters.snapshot().connections, 3);

    let second = runner.run()?;
    assert!(wait_until_idle(&counters), "connections left open after second run");

    assert_eq!(first.ping.samples, 3);
    assert_eq!(second.ping.samples, 3);
    assert!(second.receive.samples > 0);
    assert_eq!(counters.snapshot().connections, 6);
    Ok(())
}

#[test]
fn test_handshake_reads_server_identity() -> Result<()> {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nspark.example.com\nAmsterdam\n").unwrap();
    });

    let client = ProtocolClient::connect(&target(port))?;
    let info = client.server_info().unwrap();
    assert_eq!(info.canonical_name, "spark.example.com");
    assert_eq!(info.location, "Amsterdam");
    Ok(())
}

#[test]
fn test_handshake_without_canonical_name_uses_dialed_address() -> Result<()> {
    let (port, _) = start_reference_server(Duration::from_millis(100));

    let client = ProtocolClient::connect(&target(port))?;
    let info = client.server_info().unwrap();
    assert_eq!(info.canonical_name, format!("127.0.0.1:{}", port));
    assert_eq!(info.location, "Test Lab");
    Ok(())
}

#[test]
fn test_unexpected_greeting() {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"NOPE\n").unwrap();
    });

    let err = ProtocolClient::connect(&target(port)).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::UnexpectedGreeting(ref line)) if line == "NOPE"
    ));
}

#[test]
fn test_server_closes_before_location() {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nname\n").unwrap();
    });

    let err = ProtocolClient::connect(&target(port)).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::MissingServerInfo { field: "loc", .. })
    ));
}

#[test]
fn test_ping_measures_echo_delay() -> Result<()> {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nnone\nTest Lab\n").unwrap();
        expect_line(&mut reader, "ECO");
        let mut byte = [0u8; 1];
        while reader.read_exact(&mut byte).is_ok() {
            thread::sleep(Duration::from_millis(5));
            if stream.write_all(&byte).is_err() {
                break;
            }
        }
    });

    let client = ProtocolClient::connect(&target(port))?;
    let summary = LatencyProbe::new(MonotonicClock::new())
        .with_count(5)
        .run(client)?;

    assert_eq!(summary.samples, 5);
    assert!(summary.min >= 5.0, "min was {}", summary.min);
    assert!(summary.avg >= 5.0 && summary.avg < 250.0, "avg was {}", summary.avg);
    Ok(())
}

#[test]
fn test_receive_ends_cleanly_when_server_closes_mid_chunk() -> Result<()> {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nnone\nTest Lab\n").unwrap();
        expect_line(&mut reader, "SND");
        stream.write_all(&[0x5A; 1500]).unwrap();
    });

    let client = ProtocolClient::connect(&target(port))?;
    let summary = ThroughputProbe::new(MonotonicClock::new())
        .with_chunk_size(1000)
        .run(client, Direction::Receive)?;

    assert_eq!(summary.samples, 1);
    assert!(summary.avg > 0.0);
    Ok(())
}

#[test]
fn test_receive_tolerates_connection_reset() -> Result<()> {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nnone\nTest Lab\n").unwrap();
        expect_line(&mut reader, "SND");
        stream.write_all(&[0x5A; 1500]).unwrap();
        // zero linger turns the close into a reset
        SockRef::from(&stream)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
    });

    let client = ProtocolClient::connect(&target(port))?;
    let summary = ThroughputProbe::new(MonotonicClock::new())
        .with_chunk_size(1000)
        .run(client, Direction::Receive)?;

    assert!(summary.samples <= 1);
    Ok(())
}

#[test]
fn test_send_ends_cleanly_when_server_stops_reading() -> Result<()> {
    let port = start_mock_server(|mut reader, mut stream| {
        expect_line(&mut reader, "HELO0");
        stream.write_all(b"HELO\nnone\nTest Lab\n").unwrap();
        expect_line(&mut reader, "RCV");
        let mut buf = [0u8; 4096];
        let _ = reader.read(&mut buf);
    });

    let client = ProtocolClient::connect(&target(port))?;
    let summary = ThroughputProbe::new(MonotonicClock::new())
        .with_budget(Duration::from_secs(3))
        .with_chunk_size(64 * 1024)
        .run(client, Direction::Send)?;

    if summary.has_data() {
        assert!(summary.min <= summary.avg && summary.avg <= summary.max);
    }
    Ok(())
}

#[test]
fn test_connection_refused_is_reported_in_ping_phase() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = TestRunner::for_target(target(port)).run().unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Ping));
    assert!(matches!(err.root(), ClientError::Connection { .. }));
}
