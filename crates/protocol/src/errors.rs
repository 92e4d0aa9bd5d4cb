use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed control message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Failed to encode control message: {0}")]
    Encode(serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel {0} is closed")]
    ChannelClosed(String),
}
