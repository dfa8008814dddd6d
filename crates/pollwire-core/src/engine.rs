//! The engine: descriptor validation up front, background work behind a
//! [`Task`].
//!
//! ```text
//! host call (sync)                     background (runtime)
//! ─────────────────                    ────────────────────
//! engine.http_request(desc)
//!   validate ──Err──► DescriptorError
//!   │Ok
//!   Task::spawn ───────────────────►   connect → request → response
//!   returns Task<HttpResponse>              │
//!                                      task settles once
//! host polls the task  ◄──────────────────┘
//! ```
//!
//! Every fallible step after validation happens inside the spawned work and
//! surfaces only through the task's terminal state. The synchronous call
//! fails only on a malformed descriptor.

use pollwire_types::{
    DescriptorError, HttpRequest, HttpResponse, StreamRequest, WsRequest,
};

use crate::config::EngineConfig;
use crate::conn::Connection;
use crate::error::EngineError;
use crate::http::{self, HttpOptions};
use crate::task::Task;
use crate::transport::TlsConfig;
use crate::{stream, ws};

/// Either owns a runtime outright or borrows the host's.
enum RuntimeHolder {
    Owned(tokio::runtime::Runtime),
    Shared(tokio::runtime::Handle),
}

impl RuntimeHolder {
    fn handle(&self) -> &tokio::runtime::Handle {
        match self {
            RuntimeHolder::Owned(rt) => rt.handle(),
            RuntimeHolder::Shared(handle) => handle,
        }
    }
}

/// Entry point for all background I/O. One engine serves any number of
/// concurrent tasks and connections; dropping it after the last task is
/// released tears the runtime down with it.
pub struct Engine {
    runtime: RuntimeHolder,
    tls: TlsConfig,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine with its own multi-threaded runtime.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pollwire-io")
            .enable_all()
            .build()
            .map_err(|e| EngineError::Setup(format!("runtime construction failed: {e}")))?;
        Ok(Self {
            runtime: RuntimeHolder::Owned(runtime),
            tls: TlsConfig::with_system_roots()?,
            config,
        })
    }

    /// Build an engine on top of an existing runtime handle. Background work
    /// shares the host's executor instead of a private one.
    pub fn with_handle(
        config: EngineConfig,
        handle: tokio::runtime::Handle,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            runtime: RuntimeHolder::Shared(handle),
            tls: TlsConfig::with_system_roots()?,
            config,
        })
    }

    /// Start an HTTP request. Validation errors surface here; everything
    /// after that fails the returned task instead.
    pub fn http_request(
        &self,
        request: &HttpRequest,
    ) -> Result<Task<HttpResponse>, DescriptorError> {
        let validated = request.validate()?;
        tracing::debug!(url = %request.url, method = %validated.method, "http task started");

        let options = HttpOptions {
            user_agent: self.config.user_agent.clone(),
            max_redirects: self.config.max_redirects,
        };
        let tls = self.tls.clone();
        Ok(Task::spawn(self.runtime.handle(), async move {
            http::execute(validated, options, tls).await
        }))
    }

    /// Start a WebSocket connect. The task completes with a framed
    /// [`Connection`] once the upgrade handshake succeeds.
    pub fn ws_connect(&self, request: &WsRequest) -> Result<Task<Connection>, DescriptorError> {
        let validated = request.validate()?;
        tracing::debug!(url = %validated.url, "websocket task started");

        let tls = self.tls.clone();
        let policy = self.config.drop_policy;
        Ok(Task::spawn(self.runtime.handle(), async move {
            ws::connect(validated, tls, policy).await
        }))
    }

    /// Start a raw stream connect. The task completes with an unframed
    /// [`Connection`] once the transport is up.
    pub fn stream_connect(
        &self,
        request: &StreamRequest,
    ) -> Result<Task<Connection>, DescriptorError> {
        let validated = request.validate()?;
        tracing::debug!(host = %validated.host, port = validated.port, tls = validated.tls, "stream task started");

        let tls = self.tls.clone();
        let policy = self.config.drop_policy;
        Ok(Task::spawn(self.runtime.handle(), async move {
            stream::connect(validated, tls, policy).await
        }))
    }
}
