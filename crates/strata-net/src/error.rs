use thiserror::Error;

use crate::protocol::ErrorReason;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handshake refused: {0:?}")]
    Rejected(ErrorReason),

    #[error("connection closed")]
    Closed,

    #[error("tls error: {0}")]
    Tls(String),
}
