use thiserror::Error;

/// Top-level error type for Disparo.
#[derive(Debug, Error)]
pub enum DisparoError {
    /// Phone number with no usable digits.
    #[error("invalid phone: {0}")]
    InvalidPhone(String),

    /// Error from the delivery gateway.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Error recording an outcome to a result sink.
    #[error("sink error: {0}")]
    Sink(String),

    /// Batch/record storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
