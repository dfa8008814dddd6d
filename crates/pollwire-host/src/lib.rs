//! pollwire-host — the embedding boundary.
//!
//! A [`ClientHost`] is what a host scripting environment talks to: opaque
//! `u64` handles in, plain data and string errors out. Nothing here blocks
//! and nothing calls back into the host; the host drives everything by
//! polling from its own loop.
//!
//! ```text
//! host script                ClientHost                 pollwire-core
//! ───────────                ──────────                 ─────────────
//! h = http_request(desc) ──► validate, spawn ─────────► Task<HttpResponse>
//! poll(h) ─────────────────► task.poll() ── Pending ──► nil / value / error
//! c = poll(ws_handle) ─────► connection handle minted on first completion
//! read(c) / write(c, ..) ──► Connection::read / write
//! release_task(h)
//! release_connection(c) ───► drop → close per engine drop policy
//! ```
//!
//! Handles are never reused within a host's lifetime; a released or unknown
//! handle is an error for poll/read/write and a no-op for release.

use std::collections::HashMap;

use bytes::Bytes;

use pollwire_core::{Connection, Engine, EngineConfig, Task, TaskStatus};
use pollwire_types::{HttpRequest, HttpResponse, StreamRequest, WsRequest};

/// A terminal poll result, as handed across the boundary.
#[derive(Debug, Clone)]
pub enum PollValue {
    /// An HTTP task finished with this response.
    Http(HttpResponse),
    /// A connect task finished; the payload is the connection handle.
    Connection(u64),
}

/// What a task handle resolves to once polled.
enum TaskSlot {
    Http(Task<HttpResponse>),
    Conn(Task<Connection>),
    /// A connect task whose connection handle has been minted. The task is
    /// dropped at that point so the registry's connection entry holds the
    /// only caller-side reference; later polls repeat the handle.
    ConnReady(u64),
}

/// Handle registry and string-error surface for one embedding host.
///
/// Not thread-safe by design: the host environments this serves are
/// single-threaded, so the registry takes `&mut self` and lets the engine
/// own all cross-thread state.
pub struct ClientHost {
    engine: Engine,
    next_handle: u64,
    tasks: HashMap<u64, TaskSlot>,
    connections: HashMap<u64, Connection>,
}

impl ClientHost {
    /// Build a host boundary with its own I/O runtime.
    pub fn new(config: EngineConfig) -> Result<Self, String> {
        Ok(Self::with_engine(Engine::new(config).map_err(|e| e.to_string())?))
    }

    /// Build a host boundary on an existing tokio runtime.
    pub fn with_handle(
        config: EngineConfig,
        handle: tokio::runtime::Handle,
    ) -> Result<Self, String> {
        Ok(Self::with_engine(
            Engine::with_handle(config, handle).map_err(|e| e.to_string())?,
        ))
    }

    fn with_engine(engine: Engine) -> Self {
        Self {
            engine,
            next_handle: 1,
            tasks: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    fn mint_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    // ── task creation ────────────────────────────────────────────────

    /// Start an HTTP request; returns a task handle to poll.
    pub fn http_request(&mut self, request: &HttpRequest) -> Result<u64, String> {
        let task = self.engine.http_request(request).map_err(|e| e.to_string())?;
        let handle = self.mint_handle();
        self.tasks.insert(handle, TaskSlot::Http(task));
        tracing::debug!(handle, url = %request.url, "http task registered");
        Ok(handle)
    }

    /// Start a WebSocket connect; the task completes with a connection handle.
    pub fn ws_connect(&mut self, request: &WsRequest) -> Result<u64, String> {
        let task = self.engine.ws_connect(request).map_err(|e| e.to_string())?;
        let handle = self.mint_handle();
        self.tasks.insert(handle, TaskSlot::Conn(task));
        tracing::debug!(handle, url = %request.url, "websocket task registered");
        Ok(handle)
    }

    /// Start a raw stream connect; the task completes with a connection handle.
    pub fn stream_connect(&mut self, request: &StreamRequest) -> Result<u64, String> {
        let task = self
            .engine
            .stream_connect(request)
            .map_err(|e| e.to_string())?;
        let handle = self.mint_handle();
        self.tasks.insert(handle, TaskSlot::Conn(task));
        tracing::debug!(handle, host = %request.host, port = request.port, "stream task registered");
        Ok(handle)
    }

    // ── polling ──────────────────────────────────────────────────────

    /// Poll a task handle.
    ///
    /// `Ok(None)` while the work is pending. `Ok(Some(..))` once it has
    /// completed; for connect tasks the connection handle is minted on the
    /// first completed poll and repeated on later ones. `Err` carries the
    /// failure message, identical on every poll of a failed task.
    pub fn poll(&mut self, handle: u64) -> Result<Option<PollValue>, String> {
        let slot = self
            .tasks
            .get_mut(&handle)
            .ok_or_else(|| format!("invalid task handle {handle}"))?;

        match slot {
            TaskSlot::Http(task) => match task.poll() {
                TaskStatus::Pending => Ok(None),
                TaskStatus::Completed(response) => Ok(Some(PollValue::Http(response))),
                TaskStatus::Failed(message) => Err(message),
            },
            TaskSlot::ConnReady(conn_handle) => Ok(Some(PollValue::Connection(*conn_handle))),
            TaskSlot::Conn(task) => match task.poll() {
                TaskStatus::Pending => Ok(None),
                TaskStatus::Completed(conn) => {
                    let conn_handle = self.next_handle;
                    self.next_handle += 1;
                    // Replacing the slot drops the task together with the
                    // connection clone memoized inside it; only the registry
                    // entry keeps the connection alive from here on.
                    *slot = TaskSlot::ConnReady(conn_handle);
                    self.connections.insert(conn_handle, conn);
                    tracing::debug!(task = handle, connection = conn_handle, "connection ready");
                    Ok(Some(PollValue::Connection(conn_handle)))
                }
                TaskStatus::Failed(message) => Err(message),
            },
        }
    }

    // ── connection I/O ───────────────────────────────────────────────

    /// Drain the units received on a connection since the last read.
    ///
    /// An empty vector means nothing new arrived. After all buffered units
    /// are drained from a closed connection, every read returns the closure
    /// cause as an error.
    pub fn read(&mut self, handle: u64) -> Result<Vec<Vec<u8>>, String> {
        let conn = self
            .connections
            .get(&handle)
            .ok_or_else(|| format!("invalid connection handle {handle}"))?;
        let units = conn.read()?;
        Ok(units.into_iter().map(|u| u.to_vec()).collect())
    }

    /// Queue units for transmission on a connection.
    ///
    /// All-or-nothing: if any unit fails frame validation, nothing is
    /// enqueued. The call never waits for the bytes to reach the wire.
    pub fn write(&mut self, handle: u64, units: Vec<Vec<u8>>) -> Result<(), String> {
        let conn = self
            .connections
            .get(&handle)
            .ok_or_else(|| format!("invalid connection handle {handle}"))?;
        conn.write(units.into_iter().map(Bytes::from))
            .map_err(|e| e.to_string())
    }

    // ── release ──────────────────────────────────────────────────────

    /// Forget a task handle. Running work is not cancelled; its eventual
    /// result is discarded. Unknown handles are ignored.
    pub fn release_task(&mut self, handle: u64) {
        if self.tasks.remove(&handle).is_some() {
            tracing::debug!(handle, "task released");
        }
    }

    /// Forget a connection handle. What happens to queued outbound units is
    /// the engine's drop policy. Unknown handles are ignored.
    pub fn release_connection(&mut self, handle: u64) {
        if self.connections.remove(&handle).is_some() {
            tracing::debug!(handle, "connection released");
        }
    }
}
