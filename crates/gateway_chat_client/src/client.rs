//! Gateway chat client: handshake, request ids, event dispatch to observers.
//!
//! The client is driven from one place. Its owner calls the public operations
//! and feeds every `TransportEvent` into `handle_transport_event`; observers
//! run inline on that call.

use serde::{Deserialize, Serialize};

use crate::messages::{
    method, AuthParams, ChatAbortParams, ChatEntry, ChatHistoryParams, ChatSendParams,
    ClientInfo, ConnectParams, InboundFrame, Message, RequestFrame, OPERATOR_SCOPES,
    PROTOCOL_VERSION,
};
use crate::observers::Observers;
use crate::transport::{
    ConnectionId, ReadyState, Transport, TransportEvent, TransportEventKind, TransportFactory,
};

pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:18789";
pub const DEFAULT_SESSION_KEY: &str = "jarvis-ui";
pub const DEFAULT_CLIENT_ID: &str = "jarvis-ui";
pub const DEFAULT_PLATFORM: &str = "web";
pub const DEFAULT_MODE: &str = "operator";
pub const DEFAULT_LOCALE: &str = "en-US";
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

const OPERATOR_ROLE: &str = "operator";

/// Connection status broadcast to status observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        })
    }
}

/// Handshake progress of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    AwaitingChallenge,
    AwaitingHello,
    Connected,
    Disconnected,
}

/// Everything the client needs to reach and identify itself to a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub token: Option<String>,
    pub session_key: String,
    pub client: ClientInfo,
    pub locale: String,
    pub user_agent: String,
    pub history_limit: u32,
}

impl ClientConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        Self {
            gateway_url: gateway_url.into(),
            token: None,
            session_key: DEFAULT_SESSION_KEY.to_string(),
            user_agent: format!("{DEFAULT_CLIENT_ID}/{version}"),
            client: ClientInfo {
                id: DEFAULT_CLIENT_ID.to_string(),
                version,
                platform: DEFAULT_PLATFORM.to_string(),
                mode: DEFAULT_MODE.to_string(),
            },
            locale: DEFAULT_LOCALE.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

/// Client for one gateway chat session.
pub struct GatewayClient {
    config: ClientConfig,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    /// Connection whose close has not been seen yet. Outlives `transport`
    /// after `disconnect()` so the close event still reaches observers.
    live: Option<ConnectionId>,
    connections_opened: u64,
    request_id: u64,
    state: ClientState,
    status: ConnectionStatus,
    message_observers: Observers<Message>,
    stream_observers: Observers<str>,
    status_observers: Observers<ConnectionStatus>,
}

impl GatewayClient {
    pub fn new(config: ClientConfig, factory: Box<dyn TransportFactory>) -> Self {
        Self {
            config,
            factory,
            transport: None,
            live: None,
            connections_opened: 0,
            request_id: 0,
            state: ClientState::Idle,
            status: ConnectionStatus::Disconnected,
            message_observers: Observers::new("message"),
            stream_observers: Observers::new("stream"),
            status_observers: Observers::new("status"),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Open a transport to the gateway. Does nothing while a transport is held.
    /// Construction failures end in a `disconnected` broadcast, never an error.
    pub fn connect(&mut self) {
        if self.transport.is_some() {
            tracing::debug!("connect() ignored, transport already present");
            return;
        }

        self.state = ClientState::Connecting;
        self.set_status(ConnectionStatus::Connecting);

        self.connections_opened += 1;
        let connection = ConnectionId(self.connections_opened);
        tracing::info!(url = %self.config.gateway_url, %connection, "Connecting to gateway");

        match self.factory.open(&self.config.gateway_url, connection) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.live = Some(connection);
            }
            Err(e) => {
                tracing::error!(url = %self.config.gateway_url, "Transport construction failed: {}", e);
                self.live = None;
                self.state = ClientState::Disconnected;
                self.set_status(ConnectionStatus::Disconnected);
            }
        }
    }

    /// Close the transport if there is one. The `disconnected` broadcast comes
    /// from the transport's close event.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            tracing::info!("Disconnecting from gateway");
            transport.close();
        }
    }

    /// Send a chat message. Dropped without notice unless the transport is open.
    pub fn send_message(&mut self, content: &str, model: Option<&str>) {
        let id = self.next_request_id();
        let frame = encode_request(
            id,
            method::CHAT_SEND,
            ChatSendParams {
                message: content,
                session_key: &self.config.session_key,
                idempotency_key: idempotency_key(),
                model,
            },
        );
        self.send_frame(method::CHAT_SEND, id, frame);
    }

    /// Ask the gateway to stop generating. Same drop policy as `send_message`.
    pub fn abort_message(&mut self) {
        let id = self.next_request_id();
        let frame = encode_request(
            id,
            method::CHAT_ABORT,
            ChatAbortParams {
                session_key: &self.config.session_key,
            },
        );
        self.send_frame(method::CHAT_ABORT, id, frame);
    }

    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.message_observers.push(Box::new(handler));
        tracing::debug!(count = self.message_observers.len(), "Registered message observer");
    }

    pub fn on_stream<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.stream_observers.push(Box::new(handler));
        tracing::debug!(count = self.stream_observers.len(), "Registered stream observer");
    }

    pub fn on_status<F>(&mut self, handler: F)
    where
        F: FnMut(&ConnectionStatus) + Send + 'static,
    {
        self.status_observers.push(Box::new(handler));
        tracing::debug!(count = self.status_observers.len(), "Registered status observer");
    }

    /// Apply one transport event. Events from connections other than the
    /// current one are ignored.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let connection = event.connection;
        let current = self.transport.is_some() && self.live == Some(connection);

        match event.kind {
            TransportEventKind::Open if current => {
                tracing::info!(%connection, "Transport open, awaiting challenge");
                self.state = ClientState::AwaitingChallenge;
            }
            TransportEventKind::Frame(text) if current => self.handle_frame(&text),
            TransportEventKind::Error(reason) if self.live == Some(connection) => {
                tracing::error!(%connection, "Gateway transport error: {}", reason);
                self.connection_lost();
            }
            TransportEventKind::Closed { code, reason } if self.live == Some(connection) => {
                tracing::info!(%connection, code, %reason, "Disconnected from gateway");
                self.connection_lost();
            }
            kind => {
                tracing::debug!(%connection, ?kind, "Ignoring event from stale connection");
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Discarding inbound frame: {}", e);
                return;
            }
        };

        match frame {
            InboundFrame::Challenge => {
                tracing::info!("Received challenge, sending connect request");
                self.send_connect();
                self.state = ClientState::AwaitingHello;
            }
            InboundFrame::HelloOk => {
                tracing::info!("Gateway handshake complete");
                self.state = ClientState::Connected;
                self.set_status(ConnectionStatus::Connected);
                self.request_history();
            }
            InboundFrame::History(entries) => {
                tracing::debug!(count = entries.len(), "Replaying chat history");
                for entry in entries {
                    if let Some(message) = into_message(entry) {
                        self.message_observers.notify(&message);
                    }
                }
            }
            InboundFrame::Chat {
                message,
                streaming: true,
            } => {
                self.stream_observers.notify(&message.content);
            }
            InboundFrame::Chat {
                message,
                streaming: false,
            } => {
                if let Some(message) = into_message(message) {
                    self.message_observers.notify(&message);
                }
            }
            InboundFrame::Ignored => tracing::trace!("Ignoring unmatched frame"),
        }
    }

    fn send_connect(&mut self) {
        let id = self.next_request_id();
        let frame = encode_request(
            id,
            method::CONNECT,
            ConnectParams {
                min_protocol: PROTOCOL_VERSION,
                max_protocol: PROTOCOL_VERSION,
                client: &self.config.client,
                role: OPERATOR_ROLE,
                scopes: OPERATOR_SCOPES,
                auth: AuthParams {
                    token: self.config.token.as_deref(),
                },
                locale: &self.config.locale,
                user_agent: &self.config.user_agent,
            },
        );
        self.send_frame(method::CONNECT, id, frame);
    }

    fn request_history(&mut self) {
        let id = self.next_request_id();
        let frame = encode_request(
            id,
            method::CHAT_HISTORY,
            ChatHistoryParams {
                session_key: &self.config.session_key,
                limit: self.config.history_limit,
            },
        );
        self.send_frame(method::CHAT_HISTORY, id, frame);
    }

    fn next_request_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }

    fn send_frame(&mut self, method: &str, id: u64, frame: Option<String>) {
        let Some(frame) = frame else {
            return;
        };
        let Some(transport) = self
            .transport
            .as_mut()
            .filter(|t| t.ready_state() == ReadyState::Open)
        else {
            tracing::debug!(method, id, "Transport not open, dropping request");
            return;
        };
        match transport.send(frame) {
            Ok(()) => tracing::debug!(method, id, "Sent request"),
            Err(e) => tracing::warn!(method, id, "Dropping request: {}", e),
        }
    }

    fn connection_lost(&mut self) {
        self.live = None;
        self.transport = None;
        self.state = ClientState::Disconnected;
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.status_observers.notify(&status);
    }
}

fn encode_request<P: Serialize>(id: u64, method: &str, params: P) -> Option<String> {
    match serde_json::to_string(&RequestFrame::new(id, method, params)) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(method, id, "Failed to encode request: {}", e);
            None
        }
    }
}

/// Time plus random component, unique per call.
fn idempotency_key() -> String {
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4()
    )
}

fn into_message(entry: ChatEntry) -> Option<Message> {
    match entry.role {
        Some(role) => Some(Message::new(role, entry.content)),
        None => {
            tracing::debug!("Skipping chat entry with unknown role");
            None
        }
    }
}
