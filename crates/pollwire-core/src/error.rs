//! Internal error taxonomy for background work.
//!
//! Engines produce [`EngineError`] values; tasks memoize them rendered to
//! strings, because that is the only form the host boundary can carry.
//! [`WriteError`] keeps write-time validation distinct from closure, as the
//! two must stay distinguishable at the caller.

use thiserror::Error;

/// A failure inside background work — fails the owning task or closes the
/// owning connection, never the synchronous call that created it.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Engine or runtime construction failed.
    #[error("engine setup failed: {0}")]
    Setup(String),

    /// Hostname resolution produced no usable address.
    #[error("dns resolution failed for {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: u16,
        reason: String,
    },

    /// The TCP connection could not be established.
    #[error("connect to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// TLS session setup or handshake failed.
    #[error("tls handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    /// The HTTP exchange failed (framing, transport, or send).
    #[error("http request failed: {0}")]
    Http(String),

    /// The server response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Redirect chain exceeded the configured hop limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// The WebSocket upgrade was rejected or the transport failed mid-handshake.
    #[error("websocket handshake failed: {0}")]
    WsHandshake(String),
}

/// A synchronous failure from `Connection::write`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// A unit failed framing validation; nothing was enqueued.
    #[error("unit {index} is not valid utf-8 for a text frame")]
    InvalidUtf8 { index: usize },

    /// The connection is closed; the payload is the closure cause.
    #[error("{0}")]
    Closed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_render_descriptive_strings() {
        let err = EngineError::Connect {
            host: "example.test".into(),
            port: 80,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "connect to example.test:80 failed: connection refused"
        );
    }

    #[test]
    fn write_error_closed_renders_cause_verbatim() {
        let err = WriteError::Closed("connection closed by peer".into());
        assert_eq!(err.to_string(), "connection closed by peer");
    }

    #[test]
    fn write_error_validation_names_the_unit() {
        let err = WriteError::InvalidUtf8 { index: 2 };
        assert!(err.to_string().contains("unit 2"));
    }
}
