use crate::models::ValidationError;
use thiserror::Error;

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("poll not found: {0}")]
    NotFound(String),

    #[error("invalid option '{option}' for poll {poll_id}")]
    InvalidOption { poll_id: String, option: String },

    #[error("could not allocate a free poll id after {0} attempts")]
    AlreadyExists(u32),

    #[error("vote on poll {poll_id} still conflicting after {attempts} attempts")]
    Conflict { poll_id: String, attempts: u32 },

    #[error("stored count for option '{option}' is not a vote count: {value}")]
    CorruptCount { option: String, value: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("failed to encode poll data: {0}")]
    Encoding(#[from] serde_json::Error),
}
