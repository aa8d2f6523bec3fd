//! Transport seam between `GatewayClient` and the socket.
//!
//! A `TransportFactory` opens one `Transport` per `connect()`. The transport
//! reports what happens on the wire as `TransportEvent`s, which the owner of the
//! client feeds back through `GatewayClient::handle_transport_event`.

use crate::error::TransportError;

/// Identifies one transport connection opened by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Socket readiness, mirroring the WebSocket `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// What happened on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Open,
    Frame(String),
    Error(String),
    Closed { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(connection: ConnectionId, kind: TransportEventKind) -> Self {
        Self { connection, kind }
    }
}

/// Handle to an open (or opening) connection.
pub trait Transport: Send {
    fn ready_state(&self) -> ReadyState;

    /// Queue one text frame. Callers check `ready_state` first.
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Start closing. A `Closed` event follows once the socket is down.
    fn close(&mut self);
}

/// Opens transports. Injected into the client so tests can avoid the network.
pub trait TransportFactory: Send {
    fn open(&mut self, url: &str, connection: ConnectionId) -> Result<Box<dyn Transport>, TransportError>;
}
