//! WebSocket transport on tokio-tungstenite.
//!
//! `open` validates the URL and spawns one task per connection on the current
//! tokio runtime. The task connects, pumps queued frames out and inbound frames
//! into the shared event channel, and always finishes with a `Closed` event.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TransportError;
use crate::transport::{
    ConnectionId, ReadyState, Transport, TransportEvent, TransportEventKind, TransportFactory,
};

/// Close code used when the socket dies without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
const NORMAL_CLOSURE: u16 = 1000;

/// Receiving side of every event produced by a `WsTransportFactory`.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

enum Outbound {
    Frame(String),
    Close,
}

/// Opens WebSocket transports and funnels their events into one channel.
pub struct WsTransportFactory {
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WsTransportFactory {
    pub fn new() -> (Self, TransportEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }
}

impl TransportFactory for WsTransportFactory {
    fn open(&mut self, url: &str, connection: ConnectionId) -> Result<Box<dyn Transport>, TransportError> {
        let request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::NoRuntime(e.to_string()))?;

        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_socket(
            request,
            connection,
            state.clone(),
            outbound_rx,
            self.events.clone(),
        ));

        Ok(Box::new(WsTransport {
            state,
            outbound: outbound_tx,
        }))
    }
}

/// Handle held by the client; the socket itself lives in the spawned task.
pub struct WsTransport {
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        if self.ready_state() == ReadyState::Closed {
            return;
        }
        self.state.store(ReadyState::Closing as u8, Ordering::SeqCst);
        // The task may already be gone; it has emitted `Closed` in that case.
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn run_socket(
    request: Request,
    connection: ConnectionId,
    state: Arc<AtomicU8>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent::new(connection, kind));
    };

    let ws_stream = match connect_async(request).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::error!(%connection, "WebSocket connect failed: {}", e);
            state.store(ReadyState::Closed as u8, Ordering::SeqCst);
            emit(TransportEventKind::Error(e.to_string()));
            emit(TransportEventKind::Closed {
                code: ABNORMAL_CLOSURE,
                reason: e.to_string(),
            });
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    // close() may have been called while the handshake was in flight.
    if ReadyState::from_u8(state.load(Ordering::SeqCst)) == ReadyState::Connecting {
        state.store(ReadyState::Open as u8, Ordering::SeqCst);
        emit(TransportEventKind::Open);
    }

    let (code, reason) = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        tracing::error!(%connection, "WebSocket send failed: {}", e);
                        emit(TransportEventKind::Error(e.to_string()));
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    state.store(ReadyState::Closing as u8, Ordering::SeqCst);
                    let _ = write.send(WsMessage::Close(None)).await;
                    break (NORMAL_CLOSURE, "closed by client".to_string());
                }
            },

            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(TransportEventKind::Frame(text)),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => emit(TransportEventKind::Frame(text)),
                    Err(_) => tracing::debug!(%connection, "Dropping non UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NORMAL_CLOSURE, String::new()));
                }
                Some(Ok(_)) => {} // ping/pong are answered by tungstenite
                Some(Err(e)) => {
                    tracing::error!(%connection, "WebSocket error: {}", e);
                    emit(TransportEventKind::Error(e.to_string()));
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
            },
        }
    };

    state.store(ReadyState::Closed as u8, Ordering::SeqCst);
    tracing::debug!(%connection, code, %reason, "WebSocket closed");
    emit(TransportEventKind::Closed { code, reason });
}
