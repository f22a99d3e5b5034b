use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
    #[error("Publish failed: {0}")]
    Publish(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        ChannelError::Serialization(e.to_string())
    }
}
