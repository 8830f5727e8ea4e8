use thiserror::Error;

/// Error taxonomy surfaced by the messaging core. The HTTP layer maps these
/// onto status codes; `Store` and `Unavailable` are the transient bucket a
/// caller may retry.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Reserved for duplicate-creation races that survive the internal
    /// retry. Should not surface in normal operation.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
