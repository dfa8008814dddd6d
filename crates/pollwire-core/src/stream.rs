//! Raw byte-stream engine — a TCP (optionally TLS) connection with no
//! framing at all.
//!
//! Units here are arbitrary byte chunks: `write` appends bytes to the
//! socket verbatim, and `read` returns whatever chunks the reader task has
//! pulled off the wire since the last call. Chunk boundaries carry no
//! meaning; callers reassemble their own protocol on top.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use pollwire_types::ValidatedStreamRequest;

use crate::buffer::OutboundCmd;
use crate::conn::{self, Connection, DropPolicy, UnitCheck};
use crate::error::EngineError;
use crate::transport::{self, TlsConfig, Transport};

/// Read buffer size for the inbound half. Chunks surfaced to the caller
/// are at most this large.
const READ_CHUNK: usize = 16 * 1024;

/// Connect the transport and wire up an unframed connection.
pub(crate) async fn connect(
    req: ValidatedStreamRequest,
    tls: TlsConfig,
    policy: DropPolicy,
) -> Result<Connection, EngineError> {
    let transport = transport::connect(&req.host, req.port, req.tls.then_some(&tls)).await?;

    let (conn, parts) = conn::connection(policy, UnitCheck::None);
    let (read_half, write_half) = tokio::io::split(transport);

    spawn_writer(write_half, parts.rx, parts.status);
    spawn_reader(read_half, parts.inbound);

    Ok(conn)
}

/// Writer task: append queued units to the socket, then shut the write
/// half down so the peer sees EOF.
fn spawn_writer(
    mut half: tokio::io::WriteHalf<Transport>,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<OutboundCmd>,
    status: std::sync::Arc<crate::buffer::OutboundStatus>,
) {
    tokio::spawn(async move {
        let cause = loop {
            match rx.recv().await {
                Some(OutboundCmd::Unit(unit)) => {
                    if let Err(e) = half.write_all(&unit).await {
                        break format!("stream write failed: {e}");
                    }
                }
                Some(OutboundCmd::Abort) => break "connection closed".to_string(),
                None => break "connection closed".to_string(),
            }
        };
        status.close(cause);
        let _ = half.shutdown().await;
        tracing::debug!("stream writer finished");
    });
}

/// Reader task: pull chunks off the wire until EOF, error, or abandonment.
fn spawn_reader(
    mut half: tokio::io::ReadHalf<Transport>,
    inbound: std::sync::Weak<crate::buffer::Inbound>,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let result = half.read(&mut buf).await;
            let Some(inbound) = inbound.upgrade() else {
                break;
            };
            match result {
                Ok(0) => {
                    inbound.close("connection closed by peer");
                    break;
                }
                Ok(n) => {
                    inbound.push(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(e) => {
                    inbound.close(format!("stream receive failed: {e}"));
                    break;
                }
            }
        }
        tracing::debug!("stream reader finished");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollwire_types::StreamRequest;
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn validated(port: u16) -> ValidatedStreamRequest {
        StreamRequest::new("127.0.0.1", port).validate().unwrap()
    }

    async fn wait_units(conn: &Connection) -> Vec<Bytes> {
        for _ in 0..500 {
            let units = conn.read().expect("connection open");
            if !units.is_empty() {
                return units;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no units arrived");
    }

    /// Byte echo server over plain TCP, recording everything received.
    fn echo_server() -> (std::net::SocketAddr, Arc<Mutex<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        std::thread::spawn(move || {
            while let Ok((mut stream, _)) = listener.accept() {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    let mut buf = [0u8; 4096];
                    while let Ok(n) = stream.read(&mut buf) {
                        if n == 0 {
                            break;
                        }
                        sink.lock().unwrap().extend_from_slice(&buf[..n]);
                        if stream.write_all(&buf[..n]).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        (addr, received)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn bytes_roundtrip_verbatim() {
        let (addr, _) = echo_server();
        let conn = connect(
            validated(addr.port()),
            TlsConfig::dangerous_no_verify(),
            DropPolicy::GracefulDrain,
        )
        .await
        .unwrap();

        conn.write([Bytes::from_static(b"raw \x00\xff bytes")]).unwrap();
        let collected: Vec<u8> = wait_units(&conn)
            .await
            .iter()
            .flat_map(|u| u.iter().copied())
            .collect();
        assert_eq!(collected, b"raw \x00\xff bytes");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn units_concatenate_without_framing() {
        let (addr, received) = echo_server();
        let conn = connect(
            validated(addr.port()),
            TlsConfig::dangerous_no_verify(),
            DropPolicy::GracefulDrain,
        )
        .await
        .unwrap();

        conn.write([Bytes::from_static(b"ab"), Bytes::from_static(b"cd")])
            .unwrap();

        // The wire carries a single unbroken byte run.
        for _ in 0..500 {
            if received.lock().unwrap().as_slice() == b"abcd" {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("bytes did not arrive concatenated");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn peer_eof_closes_after_drain() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                stream.write_all(b"parting words").unwrap();
                // Drop closes the socket; the client sees data then EOF.
            }
        });

        let conn = connect(
            validated(addr.port()),
            TlsConfig::dangerous_no_verify(),
            DropPolicy::GracefulDrain,
        )
        .await
        .unwrap();

        assert_eq!(wait_units(&conn).await, vec![&b"parting words"[..]]);
        for _ in 0..500 {
            if let Err(cause) = conn.read() {
                assert!(cause.contains("closed"), "cause: {cause}");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connection never closed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_refused_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(
            validated(addr.port()),
            TlsConfig::dangerous_no_verify(),
            DropPolicy::GracefulDrain,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Connect { .. }), "got {err:?}");
    }
}
