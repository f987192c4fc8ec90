use thiserror::Error;

use crate::backend::{BackendError, Collection};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Crypto error: {0}")]
    Crypto(#[from] jotter_crypto::CryptoError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("No active session")]
    NoSession,

    #[error("Session has ended or was replaced by a newer login")]
    StaleSession,

    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Invalid options: {0}")]
    Options(String),
}
