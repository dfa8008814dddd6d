//! Request descriptors and their validated forms.
//!
//! A descriptor carries exactly what the host hands over. `validate()`
//! resolves defaults (GET, scheme ports, ws/wss normalization) and rejects
//! malformed input synchronously, so engines only ever see well-formed
//! `Validated*` values.

use bytes::Bytes;
use http::{Method, Uri};

use crate::error::DescriptorError;
use crate::header::HeaderMap;

/// Methods accepted by the HTTP engine. Anything outside this set is an
/// `unsupported method` descriptor error.
const SUPPORTED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::PATCH,
];

/// Parse a URL string into a `Uri` with both scheme and host present.
fn parse_absolute_url(url: &str) -> Result<Uri, DescriptorError> {
    if url.is_empty() {
        return Err(DescriptorError::MissingUrl);
    }
    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        DescriptorError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;
    if uri.scheme_str().is_none() {
        return Err(DescriptorError::InvalidUrl {
            url: url.to_string(),
            reason: "missing scheme".to_string(),
        });
    }
    if uri.host().is_none() {
        return Err(DescriptorError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(uri)
}

// ── HTTP ─────────────────────────────────────────────────────────────

/// An HTTP request descriptor as received from the host.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Absolute request URL; scheme must be `http` or `https`.
    pub url: String,
    /// Request method; defaults to GET when absent.
    pub method: Option<String>,
    /// Extra request headers, in order, duplicates allowed.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Validate the descriptor, resolving defaults.
    pub fn validate(&self) -> Result<ValidatedHttpRequest, DescriptorError> {
        let uri = parse_absolute_url(&self.url)?;

        let (tls, default_port) = match uri.scheme_str() {
            Some("http") => (false, 80),
            Some("https") => (true, 443),
            Some(other) => return Err(DescriptorError::UnsupportedScheme(other.to_string())),
            None => unreachable!("parse_absolute_url guarantees a scheme"),
        };

        let method = match &self.method {
            None => Method::GET,
            Some(name) => {
                let upper = name.to_ascii_uppercase();
                SUPPORTED_METHODS
                    .iter()
                    .find(|m| m.as_str() == upper)
                    .cloned()
                    .ok_or_else(|| DescriptorError::UnsupportedMethod(name.clone()))?
            }
        };

        // Unwrap is safe: host presence was checked during parsing.
        let host = uri.host().unwrap_or_default().to_string();
        let port = uri.port_u16().unwrap_or(default_port);

        Ok(ValidatedHttpRequest {
            uri,
            method,
            host,
            port,
            tls,
            headers: self.headers.clone(),
            body: self.body.clone(),
        })
    }
}

/// A fully validated HTTP request, ready for the engine.
#[derive(Debug, Clone)]
pub struct ValidatedHttpRequest {
    pub uri: Uri,
    pub method: Method,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

// ── WebSocket ────────────────────────────────────────────────────────

/// How written units map onto WebSocket frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WsFrameKind {
    /// One binary frame per written unit; no write validation.
    #[default]
    Binary,
    /// One text frame per written unit; writes must be valid UTF-8.
    Text,
}

/// A WebSocket connect descriptor as received from the host.
#[derive(Debug, Clone, Default)]
pub struct WsRequest {
    /// Target URL; accepts `ws`, `wss`, `http` or `https` schemes
    /// (http normalizes to ws, https to wss).
    pub url: String,
    /// Optional `Origin` header value; must itself be an absolute URL.
    pub origin: Option<String>,
    /// Extra handshake headers, in order.
    pub headers: HeaderMap,
    /// Frame kind for the resulting connection.
    pub frames: WsFrameKind,
}

impl WsRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_frames(mut self, frames: WsFrameKind) -> Self {
        self.frames = frames;
        self
    }

    /// Validate the descriptor, normalizing the scheme to ws/wss.
    pub fn validate(&self) -> Result<ValidatedWsRequest, DescriptorError> {
        let uri = parse_absolute_url(&self.url)?;

        let (scheme, tls, default_port) = match uri.scheme_str() {
            Some("ws") | Some("http") => ("ws", false, 80),
            Some("wss") | Some("https") => ("wss", true, 443),
            Some(other) => return Err(DescriptorError::UnsupportedScheme(other.to_string())),
            None => unreachable!("parse_absolute_url guarantees a scheme"),
        };

        let host = uri.host().unwrap_or_default().to_string();
        let port = uri.port_u16().unwrap_or(default_port);

        // Rebuild the URI under the normalized scheme for the handshake.
        let authority = uri.authority().map(|a| a.as_str()).unwrap_or(&host);
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url: Uri = format!("{scheme}://{authority}{path_and_query}")
            .parse()
            .map_err(|e: http::uri::InvalidUri| DescriptorError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let origin = match &self.origin {
            None => None,
            Some(raw) => {
                parse_absolute_url(raw)
                    .map_err(|_| DescriptorError::InvalidOrigin(raw.clone()))?;
                Some(raw.clone())
            }
        };

        Ok(ValidatedWsRequest {
            url,
            host,
            port,
            tls,
            origin,
            headers: self.headers.clone(),
            frames: self.frames,
        })
    }
}

/// A fully validated WebSocket connect request.
#[derive(Debug, Clone)]
pub struct ValidatedWsRequest {
    /// Normalized ws/wss URL used in the handshake.
    pub url: Uri,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub origin: Option<String>,
    pub headers: HeaderMap,
    pub frames: WsFrameKind,
}

// ── Raw stream ───────────────────────────────────────────────────────

/// A raw byte-stream connect descriptor.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub host: String,
    pub port: u16,
    /// Wrap the stream in TLS, verifying against `host`.
    pub tls: bool,
}

impl StreamRequest {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
        }
    }

    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    pub fn validate(&self) -> Result<ValidatedStreamRequest, DescriptorError> {
        if self.host.is_empty() {
            return Err(DescriptorError::MissingHost);
        }
        if self.port == 0 {
            return Err(DescriptorError::InvalidPort);
        }
        Ok(ValidatedStreamRequest {
            host: self.host.clone(),
            port: self.port,
            tls: self.tls,
        })
    }
}

/// A fully validated raw stream connect request.
#[derive(Debug, Clone)]
pub struct ValidatedStreamRequest {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── HTTP validation ─────────────────────────────────────────────

    #[test]
    fn http_minimal_descriptor_defaults_to_get() {
        let valid = HttpRequest::new("http://example.test/").validate().unwrap();
        assert_eq!(valid.method, Method::GET);
        assert_eq!(valid.host, "example.test");
        assert_eq!(valid.port, 80);
        assert!(!valid.tls);
        assert!(valid.body.is_none());
    }

    #[test]
    fn http_https_scheme_enables_tls_and_port_443() {
        let valid = HttpRequest::new("https://example.test/path")
            .validate()
            .unwrap();
        assert!(valid.tls);
        assert_eq!(valid.port, 443);
    }

    #[test]
    fn http_explicit_port_wins() {
        let valid = HttpRequest::new("http://example.test:8080/")
            .validate()
            .unwrap();
        assert_eq!(valid.port, 8080);
    }

    #[test]
    fn http_empty_url_is_missing() {
        assert_eq!(
            HttpRequest::new("").validate().unwrap_err(),
            DescriptorError::MissingUrl
        );
    }

    #[test]
    fn http_relative_url_is_rejected() {
        // "not-a-url" parses as a bare path — no scheme, no host.
        let err = HttpRequest::new("not-a-url").validate().unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidUrl { .. }));
    }

    #[test]
    fn http_ftp_scheme_is_rejected() {
        let err = HttpRequest::new("ftp://example.test/").validate().unwrap_err();
        assert_eq!(err, DescriptorError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn http_method_is_case_insensitive() {
        let valid = HttpRequest::new("http://example.test/")
            .with_method("post")
            .validate()
            .unwrap();
        assert_eq!(valid.method, Method::POST);
    }

    #[test]
    fn http_nonstandard_method_is_rejected() {
        let err = HttpRequest::new("http://example.test/")
            .with_method("BREW")
            .validate()
            .unwrap_err();
        assert_eq!(err, DescriptorError::UnsupportedMethod("BREW".to_string()));
    }

    #[test]
    fn http_descriptor_carries_headers_and_body() {
        let valid = HttpRequest::new("http://example.test/")
            .with_method("POST")
            .with_header("Content-Type", "application/json")
            .with_body(&b"{}"[..])
            .validate()
            .unwrap();
        assert_eq!(valid.headers.get("content-type"), Some("application/json"));
        assert_eq!(valid.body.as_deref(), Some(&b"{}"[..]));
    }

    // ── WebSocket validation ────────────────────────────────────────

    #[test]
    fn ws_http_scheme_normalizes_to_ws() {
        let valid = WsRequest::new("http://example.test/socket")
            .validate()
            .unwrap();
        assert_eq!(valid.url.scheme_str(), Some("ws"));
        assert!(!valid.tls);
        assert_eq!(valid.port, 80);
    }

    #[test]
    fn ws_https_scheme_normalizes_to_wss() {
        let valid = WsRequest::new("https://example.test/").validate().unwrap();
        assert_eq!(valid.url.scheme_str(), Some("wss"));
        assert!(valid.tls);
        assert_eq!(valid.port, 443);
    }

    #[test]
    fn ws_native_schemes_pass_through() {
        let valid = WsRequest::new("ws://example.test:9001/live")
            .validate()
            .unwrap();
        assert_eq!(valid.url.scheme_str(), Some("ws"));
        assert_eq!(valid.port, 9001);
        assert_eq!(valid.url.path(), "/live");
    }

    #[test]
    fn ws_missing_path_becomes_root() {
        let valid = WsRequest::new("ws://example.test").validate().unwrap();
        assert_eq!(valid.url.path(), "/");
    }

    #[test]
    fn ws_valid_origin_is_kept_verbatim() {
        let valid = WsRequest::new("ws://example.test/")
            .with_origin("https://game.example.test")
            .validate()
            .unwrap();
        assert_eq!(valid.origin.as_deref(), Some("https://game.example.test"));
    }

    #[test]
    fn ws_relative_origin_is_rejected() {
        let err = WsRequest::new("ws://example.test/")
            .with_origin("no-scheme-here")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            DescriptorError::InvalidOrigin("no-scheme-here".to_string())
        );
    }

    #[test]
    fn ws_frame_kind_defaults_to_binary() {
        let valid = WsRequest::new("ws://example.test/").validate().unwrap();
        assert_eq!(valid.frames, WsFrameKind::Binary);

        let valid = WsRequest::new("ws://example.test/")
            .with_frames(WsFrameKind::Text)
            .validate()
            .unwrap();
        assert_eq!(valid.frames, WsFrameKind::Text);
    }

    // ── Stream validation ───────────────────────────────────────────

    #[test]
    fn stream_descriptor_validates() {
        let valid = StreamRequest::new("example.test", 4000).validate().unwrap();
        assert_eq!(valid.host, "example.test");
        assert_eq!(valid.port, 4000);
        assert!(!valid.tls);
    }

    #[test]
    fn stream_empty_host_is_rejected() {
        let err = StreamRequest::new("", 4000).validate().unwrap_err();
        assert_eq!(err, DescriptorError::MissingHost);
    }

    #[test]
    fn stream_port_zero_is_rejected() {
        let err = StreamRequest::new("example.test", 0).validate().unwrap_err();
        assert_eq!(err, DescriptorError::InvalidPort);
    }
}
