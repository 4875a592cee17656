use thiserror::Error;

/// Errors that can occur anywhere in the capture-to-probe pipeline.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("broker connection to {0} failed: {1}")]
    BrokerConnect(String, std::io::Error),

    #[error("malformed broker directive, could not resynchronize on newline")]
    BrokerFraming,

    #[error("no shards configured")]
    NoShards,

    #[error("socket setup failed: {0}")]
    Socket(String),

    #[error("deserializing a packet from JSON is unsupported")]
    JsonDeserializeUnsupported,
}

pub type Result<T> = std::result::Result<T, EngineError>;
