//! HTTP engine — one buffered round trip per task.
//!
//! The background work for an HTTP task: connect (TLS for https), drive an
//! HTTP/1.1 exchange over hyper's connection-level client, follow redirects,
//! and buffer the complete response. Every failure in here fails the owning
//! task; nothing is reported synchronously.
//!
//! hyper's connection-level client deliberately does not follow redirects,
//! so the hop loop lives here: 301/302/303/307/308 with a `Location` header
//! re-issue the request, switching to GET and dropping the body on 303 (and
//! on 301/302 for POST).

use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;

use pollwire_types::{HttpRequest, HttpResponse, ValidatedHttpRequest};

use crate::error::EngineError;
use crate::transport::{self, TlsConfig};

/// Engine-level knobs for HTTP work, snapshot from the engine config.
#[derive(Debug, Clone)]
pub(crate) struct HttpOptions {
    pub user_agent: String,
    pub max_redirects: usize,
}

/// Drive a validated request to a final (non-redirect) response.
pub(crate) async fn execute(
    req: ValidatedHttpRequest,
    options: HttpOptions,
    tls: TlsConfig,
) -> Result<HttpResponse, EngineError> {
    let mut current = req;
    let mut hops = 0usize;

    loop {
        let response = round_trip(&current, &options, &tls).await?;

        let Some(location) = redirect_location(&response) else {
            return Ok(response);
        };

        hops += 1;
        if hops > options.max_redirects {
            return Err(EngineError::TooManyRedirects(options.max_redirects));
        }
        tracing::debug!(
            code = response.code,
            location = %location,
            hop = hops,
            "following redirect"
        );
        current = redirect_request(&current, response.code, &location)?;
    }
}

/// One connection, one request, one buffered response.
async fn round_trip(
    req: &ValidatedHttpRequest,
    options: &HttpOptions,
    tls: &TlsConfig,
) -> Result<HttpResponse, EngineError> {
    let transport = transport::connect(&req.host, req.port, req.tls.then_some(tls)).await?;

    let io = TokioIo::new(transport);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| EngineError::Http(e.to_string()))?;

    // Drive the connection until the exchange finishes.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut builder = http::Request::builder()
        .method(req.method.clone())
        .uri(origin_form(req));

    if !req.headers.contains("host") {
        builder = builder.header(http::header::HOST, host_header(req));
    }
    if !req.headers.contains("user-agent") {
        builder = builder.header(http::header::USER_AGENT, options.user_agent.as_str());
    }
    for header in &req.headers {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }

    let body = Full::new(req.body.clone().unwrap_or_default());
    let request = builder
        .body(body)
        .map_err(|e| EngineError::Http(e.to_string()))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| EngineError::Http(e.to_string()))?;

    let code = response.status().as_u16();
    let status = HttpResponse::status_line(code, response.status().canonical_reason());

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| EngineError::MalformedResponse(e.to_string()))?
        .to_bytes();

    tracing::debug!(code = code, bytes = body.len(), "http exchange complete");

    Ok(HttpResponse {
        code,
        status,
        headers,
        body,
    })
}

/// Request target in origin form (`/path?query`).
fn origin_form(req: &ValidatedHttpRequest) -> String {
    req.uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// `Host` header value — authority with the default port omitted.
fn host_header(req: &ValidatedHttpRequest) -> String {
    let default_port = if req.tls { 443 } else { 80 };
    if req.port == default_port {
        req.host.clone()
    } else {
        format!("{}:{}", req.host, req.port)
    }
}

/// The redirect target, if this response is a followable redirect.
fn redirect_location(response: &HttpResponse) -> Option<String> {
    if !matches!(response.code, 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    response.headers.get("location").map(str::to_string)
}

/// Build the follow-up request for a redirect response.
fn redirect_request(
    current: &ValidatedHttpRequest,
    code: u16,
    location: &str,
) -> Result<ValidatedHttpRequest, EngineError> {
    let url = resolve_location(current, location);

    // 303 always demotes to GET; 301/302 do so for POST, matching the
    // behavior of mainstream clients.
    let demote = code == 303 || ((code == 301 || code == 302) && current.method == http::Method::POST);
    let (method, body) = if demote {
        (http::Method::GET, None)
    } else {
        (current.method.clone(), current.body.clone())
    };

    let descriptor = HttpRequest {
        url,
        method: Some(method.as_str().to_string()),
        headers: current.headers.clone(),
        body,
    };
    let mut next = descriptor.validate().map_err(|e| {
        EngineError::MalformedResponse(format!("redirect location '{location}': {e}"))
    })?;

    // Caller headers follow same-origin hops only in full: a hop to another
    // authority must not carry credentials or a stale explicit Host.
    if next.host != current.host || next.port != current.port || next.tls != current.tls {
        next.headers
            .retain(|h| !h.is_named("host") && !h.is_named("authorization") && !h.is_named("cookie"));
    }
    Ok(next)
}

/// Resolve a `Location` value against the current request URL.
fn resolve_location(current: &ValidatedHttpRequest, location: &str) -> String {
    // Absolute URL: use verbatim.
    if location.contains("://") {
        return location.to_string();
    }

    let scheme = if current.tls { "https" } else { "http" };
    let authority = current
        .uri
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| current.host.clone());

    if location.starts_with('/') {
        return format!("{scheme}://{authority}{location}");
    }

    // Relative path: resolve against the directory of the current path.
    let path = current.uri.path();
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    format!("{scheme}://{authority}{dir}{location}")
}
