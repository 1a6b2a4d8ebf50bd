//! Application services: load, compute with the pure domain crates, persist.

use thiserror::Error;

use shopfront_core::DomainError;

use crate::repository::RepositoryError;

pub mod catalog;
pub mod price_adjustment;
pub mod protection;

pub use catalog::CatalogService;
pub use price_adjustment::{AdjustmentOutcome, PriceAdjustmentService};
pub use protection::ProtectionService;

/// Default number of times a bulk adjustment is re-run after a version conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(format!("{what} not found")),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) | RepositoryError::Duplicate(msg) => ServiceError::Conflict(msg),
            RepositoryError::NotFound(what) => ServiceError::NotFound(format!("{what} not found")),
            RepositoryError::Persistence(msg) => ServiceError::Persistence(msg),
        }
    }
}
