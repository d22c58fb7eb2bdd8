use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("failed to bind listener: {0}")]
    Bind(std::io::Error),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}
