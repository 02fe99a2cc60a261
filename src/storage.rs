//! Storage errors shared by every repository.

use std::error::Error;

use thiserror::Error;

/// Errors returned by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    AlreadyExists,

    /// A conditional write lost against a concurrent change.
    #[error("conflicting concurrent update")]
    Conflict,

    /// The record was removed or deactivated after it was read.
    #[error("record no longer available")]
    Unavailable,

    #[error("storage error")]
    Storage(#[source] Box<dyn Error + Send + Sync>),
}
