//! Gateway wire types. Client → gateway requests and gateway → client frames.
//!
//! Every frame is one JSON object. Outbound frames are always `{"type":"req",...}`;
//! inbound frames are either `res` or `event` and are matched by shape, not by id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FrameError;

/// Protocol version spoken by this client (sent as both min and max).
pub const PROTOCOL_VERSION: u32 = 3;

/// Scopes requested during the handshake.
pub const OPERATOR_SCOPES: &[&str] = &["operator.read", "operator.write"];

/// Request method names.
pub mod method {
    pub const CONNECT: &str = "connect";
    pub const CHAT_HISTORY: &str = "chat.history";
    pub const CHAT_SEND: &str = "chat.send";
    pub const CHAT_ABORT: &str = "chat.abort";
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Parse the wire name; unknown roles yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete chat message as delivered to message observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Client receive time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    /// Build a finished message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            is_streaming: false,
        }
    }
}

/// Client → gateway: request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame<'a, P> {
    #[serde(rename = "type")]
    pub typ: &'static str,
    pub id: String,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> RequestFrame<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            typ: "req",
            id: id.to_string(),
            method,
            params,
        }
    }
}

/// Identity the client announces in the `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'a str>,
}

/// `connect` params, sent in answer to `connect.challenge`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams<'a> {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: &'a ClientInfo,
    pub role: &'static str,
    pub scopes: &'static [&'static str],
    pub auth: AuthParams<'a>,
    pub locale: &'a str,
    pub user_agent: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryParams<'a> {
    pub session_key: &'a str,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams<'a> {
    pub message: &'a str,
    pub session_key: &'a str,
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAbortParams<'a> {
    pub session_key: &'a str,
}

/// One chat entry as it appears on the wire (`{role, content}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    /// `None` when the gateway sent a role this client does not know.
    pub role: Option<Role>,
    pub content: String,
}

impl ChatEntry {
    fn from_json(value: &Value) -> Self {
        Self {
            role: value.get("role").and_then(Value::as_str).and_then(Role::parse),
            content: value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// One gateway frame, classified in dispatch priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// `event: connect.challenge`.
    Challenge,
    /// `res` whose payload type is `hello-ok`.
    HelloOk,
    /// `res` carrying a `messages` array.
    History(Vec<ChatEntry>),
    /// `event: chat` carrying a message.
    Chat { message: ChatEntry, streaming: bool },
    /// Any other shape.
    Ignored,
}

impl InboundFrame {
    /// Decode a text frame. Only invalid JSON is an error; unknown shapes are `Ignored`.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_json(&value))
    }

    pub fn from_json(value: &Value) -> Self {
        let typ = value.get("type").and_then(Value::as_str);
        let event = value.get("event").and_then(Value::as_str);
        let payload = value.get("payload");

        match (typ, event) {
            (Some("event"), Some("connect.challenge")) => InboundFrame::Challenge,
            (Some("res"), _) => {
                let Some(payload) = payload else {
                    return InboundFrame::Ignored;
                };
                if payload.get("type").and_then(Value::as_str) == Some("hello-ok") {
                    return InboundFrame::HelloOk;
                }
                match payload.get("messages").and_then(Value::as_array) {
                    Some(entries) => {
                        InboundFrame::History(entries.iter().map(ChatEntry::from_json).collect())
                    }
                    None => InboundFrame::Ignored,
                }
            }
            (Some("event"), Some("chat")) => {
                let Some(payload) = payload else {
                    return InboundFrame::Ignored;
                };
                match payload.get("message") {
                    Some(message) if !message.is_null() => InboundFrame::Chat {
                        message: ChatEntry::from_json(message),
                        streaming: payload.get("streaming").and_then(Value::as_bool) == Some(true),
                    },
                    _ => InboundFrame::Ignored,
                }
            }
            _ => InboundFrame::Ignored,
        }
    }
}
