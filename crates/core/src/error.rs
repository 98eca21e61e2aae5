/// Result alias that carries the custom [`LightDeckError`] type.
pub type Result<T> = std::result::Result<T, LightDeckError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LightDeckError {
    /// Free-form failure raised by the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed or serialized.
    #[error("configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The sampler picture could not be decoded.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    /// The configuration parsed but describes an impossible fixture.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Raw pixel data does not match its declared dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// A frame could not be handed to the fixture.
    #[error("transport send failed: {0}")]
    TransportSend(String),
    /// The drain side of the fixture channel reported an error.
    #[error("transport receive failed: {0}")]
    TransportReceive(String),
    /// The peer closed the channel.
    #[error("transport closed")]
    TransportClosed,
    /// Another thread panicked while holding shared state.
    #[error("{0} has been poisoned")]
    StatePoisoned(&'static str),
}

impl LightDeckError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for LightDeckError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LightDeckError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
