use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid selector configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    #[error("No metadata for stream: {0}")]
    MissingMetadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;
