//! pollwire boundary types.
//!
//! Plain-data types crossing the host boundary: request descriptors with
//! synchronous validation, an ordered duplicate-friendly header map, and the
//! structured HTTP response shape.
//!
//! # Design
//!
//! Descriptors ([`HttpRequest`], [`WsRequest`], [`StreamRequest`]) are what
//! the host hands over — unvalidated strings and byte buffers. Validation
//! happens exactly once, at `validate()`, producing the `Validated*` forms
//! the engines consume. A malformed descriptor therefore fails synchronously
//! at the boundary call and never becomes a background task.
//!
//! All fields use owned types (`String`, `Bytes`, `Vec`) so values can cross
//! the boundary without lifetime concerns.

mod error;
mod header;
mod request;
mod response;

pub use error::DescriptorError;
pub use header::{Header, HeaderMap};
pub use request::{
    HttpRequest, StreamRequest, ValidatedHttpRequest, ValidatedStreamRequest, ValidatedWsRequest,
    WsFrameKind, WsRequest,
};
pub use response::HttpResponse;
