//! TCP/TLS transports.
//!
//! A [`Transport`] is the single underlying stream every connection wraps —
//! plain TCP or TLS over TCP. TLS is managed transparently: the engines read
//! and write plaintext while `rustls` encrypts and decrypts underneath.
//! Closing the wrapping connection closes the transport, which is the only
//! resource it owns.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::EngineError;

// ── TlsConfig ────────────────────────────────────────────────────────

/// Client-side TLS configuration shared across connections.
#[derive(Clone)]
pub struct TlsConfig {
    /// Pre-built `rustls` client configuration.
    pub client_config: Arc<rustls::ClientConfig>,
}

impl TlsConfig {
    /// TLS config using the Mozilla root certificate store.
    ///
    /// This is the recommended configuration for production use.
    pub fn with_system_roots() -> Result<Self, EngineError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| EngineError::Setup(format!("tls protocol versions: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(config),
        })
    }

    /// TLS config that **skips certificate verification**.
    ///
    /// # Warning
    ///
    /// This is intended **only for testing**. Do not use in production.
    #[cfg(test)]
    pub fn dangerous_no_verify() -> Self {
        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .expect("safe default protocol versions")
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(danger::NoVerifier))
        .with_no_client_auth();

        Self {
            client_config: Arc::new(config),
        }
    }
}

/// Build a `TlsConfig` from a pre-configured `rustls::ClientConfig`.
impl From<Arc<rustls::ClientConfig>> for TlsConfig {
    fn from(client_config: Arc<rustls::ClientConfig>) -> Self {
        Self { client_config }
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// Underlying transport — plain TCP or TLS over TCP.
pub enum Transport {
    /// Unencrypted TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted TCP stream via `rustls`.
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tls = matches!(self, Transport::Tls(_));
        f.debug_struct("Transport").field("tls", &tls).finish()
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Resolve `host:port`, connect, and optionally wrap the stream in TLS
/// (verifying the certificate against `host`).
pub async fn connect(
    host: &str,
    port: u16,
    tls: Option<&TlsConfig>,
) -> Result<Transport, EngineError> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| EngineError::Resolve {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })?;
    let addr = addrs.next().ok_or_else(|| EngineError::Resolve {
        host: host.to_string(),
        port,
        reason: "no address found".to_string(),
    })?;

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| EngineError::Connect {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })?;

    // Low-latency interactive traffic; coalescing hurts more than it helps.
    let _ = stream.set_nodelay(true);

    tracing::debug!(
        host = %host,
        port = port,
        tls = tls.is_some(),
        "established tcp connection"
    );

    match tls {
        None => Ok(Transport::Plain(stream)),
        Some(config) => {
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| EngineError::Tls {
                    host: host.to_string(),
                    reason: format!("invalid server name: {e}"),
                })?;

            let connector = TlsConnector::from(Arc::clone(&config.client_config));
            let tls_stream =
                connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| EngineError::Tls {
                        host: host.to_string(),
                        reason: e.to_string(),
                    })?;
            Ok(Transport::Tls(Box::new(tls_stream)))
        }
    }
}

// ── Dangerous cert verifier (test only) ──────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Start a TCP echo server in a background thread. Returns its address.
    fn start_echo_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");
        std::thread::spawn(move || {
            while let Ok((mut stream, _)) = listener.accept() {
                std::thread::spawn(move || {
                    let mut buf = [0u8; 4096];
                    loop {
                        match stream.read(&mut buf) {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if stream.write_all(&buf[..n]).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn plain_connect_and_roundtrip() {
        let addr = start_echo_server();
        let mut transport = connect("127.0.0.1", addr.port(), None).await.unwrap();

        transport.write_all(b"hello transport").await.unwrap();
        let mut buf = [0u8; 64];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello transport");
    }

    #[tokio::test]
    async fn connect_refused_is_a_connect_error() {
        // Bind-then-drop to get a port with no listener.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = connect("127.0.0.1", port, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Connect { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unresolvable_host_is_a_resolve_error() {
        let err = connect("host.invalid", 80, None).await.unwrap_err();
        assert!(matches!(err, EngineError::Resolve { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn tls_against_plain_listener_fails_handshake() {
        let addr = start_echo_server();
        let config = TlsConfig::dangerous_no_verify();
        let err = connect("127.0.0.1", addr.port(), Some(&config))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Tls { .. }), "got {err:?}");
    }

    #[test]
    fn system_roots_config_builds() {
        assert!(TlsConfig::with_system_roots().is_ok());
    }

    #[test]
    fn debug_format_reports_tls_flag() {
        let addr = start_echo_server();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let transport = rt
            .block_on(connect("127.0.0.1", addr.port(), None))
            .unwrap();
        assert!(format!("{transport:?}").contains("tls: false"));
    }
}
