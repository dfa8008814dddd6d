//! WebSocket engine — RFC 6455 client handshake plus framed connections.
//!
//! The background work for a WebSocket task: connect the transport (TLS for
//! wss), run the client handshake via tungstenite over that transport, then
//! split the stream into a reader task and a writer task feeding the generic
//! connection buffers.
//!
//! Units on the resulting connection are whole messages: `write` emits one
//! frame per unit, `read` returns the complete messages assembled since the
//! last call. Control frames never surface as units — pings are answered
//! inside tungstenite during stream polling, and a close frame becomes the
//! connection's close cause.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::Message;

use pollwire_types::{ValidatedWsRequest, WsFrameKind};

use crate::buffer::OutboundCmd;
use crate::conn::{self, Connection, DropPolicy, UnitCheck};
use crate::error::EngineError;
use crate::transport::{self, TlsConfig};

/// Perform the upgrade handshake and wire up a framed connection.
pub(crate) async fn connect(
    req: ValidatedWsRequest,
    tls: TlsConfig,
    policy: DropPolicy,
) -> Result<Connection, EngineError> {
    let transport = transport::connect(&req.host, req.port, req.tls.then_some(&tls)).await?;

    let mut builder = http::Request::builder().uri(req.url.clone());
    if let Some(origin) = &req.origin {
        builder = builder.header(http::header::ORIGIN, origin.as_str());
    }
    for header in &req.headers {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }
    let request = builder
        .body(())
        .map_err(|e| EngineError::WsHandshake(e.to_string()))?;

    let (stream, response) = client_async(request, transport)
        .await
        .map_err(|e| EngineError::WsHandshake(e.to_string()))?;

    tracing::debug!(
        url = %req.url,
        status = response.status().as_u16(),
        "websocket handshake accepted"
    );

    let check = match req.frames {
        WsFrameKind::Binary => UnitCheck::None,
        WsFrameKind::Text => UnitCheck::Utf8,
    };
    let (conn, parts) = conn::connection(policy, check);
    let (sink, source) = stream.split();

    spawn_writer(sink, parts.rx, parts.status, req.frames);
    spawn_reader(source, parts.inbound);

    Ok(conn)
}

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<transport::Transport>,
    Message,
>;
type WsSource =
    futures_util::stream::SplitStream<tokio_tungstenite::WebSocketStream<transport::Transport>>;

/// Writer task: one frame per queued unit, drain-then-close on channel end.
fn spawn_writer(
    mut sink: WsSink,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<OutboundCmd>,
    status: std::sync::Arc<crate::buffer::OutboundStatus>,
    frames: WsFrameKind,
) {
    tokio::spawn(async move {
        let cause = loop {
            match rx.recv().await {
                Some(OutboundCmd::Unit(unit)) => {
                    let message = match frames {
                        WsFrameKind::Binary => Message::binary(unit),
                        // Write-time validation guarantees UTF-8; a unit that
                        // somehow is not gets refused here rather than sent.
                        WsFrameKind::Text => match String::from_utf8(unit.to_vec()) {
                            Ok(text) => Message::text(text),
                            Err(_) => continue,
                        },
                    };
                    if let Err(e) = sink.send(message).await {
                        break format!("websocket send failed: {e}");
                    }
                }
                Some(OutboundCmd::Abort) => break "connection closed".to_string(),
                // Last handle dropped and the queue is drained.
                None => break "connection closed".to_string(),
            }
        };
        status.close(cause);
        // Sends the close frame and flushes; errors are moot by now.
        let _ = sink.close().await;
        tracing::debug!("websocket writer finished");
    });
}

/// Reader task: assemble whole messages into the inbound queue until the
/// stream ends, the peer closes, or the caller abandons the connection.
fn spawn_reader(mut source: WsSource, inbound: std::sync::Weak<crate::buffer::Inbound>) {
    tokio::spawn(async move {
        loop {
            let item = source.next().await;
            let Some(inbound) = inbound.upgrade() else {
                // Abandoned; unread data is discarded with the queue.
                break;
            };
            match item {
                Some(Ok(Message::Binary(data))) => {
                    inbound.push(data);
                }
                Some(Ok(Message::Text(text))) => {
                    inbound.push(Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let cause = match frame {
                        Some(f) if !f.reason.is_empty() => {
                            format!("connection closed by peer: {}", f.reason)
                        }
                        _ => "connection closed by peer".to_string(),
                    };
                    inbound.close(cause);
                    break;
                }
                // Pings are answered inside tungstenite; pongs and raw
                // frames carry nothing for the caller.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    inbound.close(format!("websocket receive failed: {e}"));
                    break;
                }
                None => {
                    inbound.close("connection closed by peer");
                    break;
                }
            }
        }
        tracing::debug!("websocket reader finished");
    });
}
