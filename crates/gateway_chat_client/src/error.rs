//! Error types for transport, config and frame decoding.

/// Failure to construct or use a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    #[error("transport is not open")]
    NotOpen,

    #[error("transport channel closed")]
    ChannelClosed,
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("gateway URL is empty")]
    MissingUrl,
}

/// Inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}
