//! Gateway chat client library (handshake, request/event protocol, observers).
//! Used by the `gateway-chat` terminal front-end.

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
mod observers;
pub mod transport;
pub mod websocket;

pub use client::{ClientConfig, ClientState, ConnectionStatus, GatewayClient};
pub use config::{default_config_path, ChatSection, ClientSection, Config, GatewaySection};
pub use error::{ConfigError, FrameError, TransportError};
pub use messages::{Message, Role};
pub use transport::{
    ConnectionId, ReadyState, Transport, TransportEvent, TransportEventKind, TransportFactory,
};
pub use websocket::{TransportEvents, WsTransportFactory};
