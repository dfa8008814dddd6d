//! pollwire-core — poll-based async I/O engines for embedding hosts.
//!
//! Everything here serves one calling convention: a synchronous host thread
//! that cannot block and cannot be called back. Work is started with a cheap
//! synchronous call, runs on a tokio runtime, and is observed by polling:
//! - **task**: one-shot poll handles with memoized terminal states
//! - **buffer**: inbound/outbound unit queues with sticky closure causes
//! - **conn**: the caller-facing `Connection` over those queues
//! - **transport**: TCP and TLS streams beneath every engine
//! - **http**: request/response engine with redirect following
//! - **ws**: WebSocket engine, one message per unit
//! - **stream**: raw byte-stream engine, no framing
//! - **engine**: validation plus task spawning, tied to a runtime

mod buffer;
pub mod config;
pub mod conn;
pub mod engine;
pub mod error;
mod http;
mod stream;
pub mod task;
pub mod transport;
mod ws;

pub use config::EngineConfig;
pub use conn::{Connection, DropPolicy};
pub use engine::Engine;
pub use error::{EngineError, WriteError};
pub use task::{Task, TaskStatus};
pub use transport::TlsConfig;
