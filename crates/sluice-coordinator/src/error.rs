use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed coordinator record: {0}")]
    MalformedRecord(String),

    #[error("No metadata for coordinator stream: {0}")]
    MissingMetadata(String),

    #[error("Reader is not registered; call register() first")]
    NotRegistered,

    #[error("Reader is not bootstrapped; call bootstrap() first")]
    NotBootstrapped,

    #[error("Coordinator log drained before reaching the captured head offset {0}")]
    IncompleteReplay(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Stream(#[from] sluice_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
