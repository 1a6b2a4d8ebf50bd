//! Infrastructure layer: storage backends and the application services that
//! drive the pure pricing, protection and catalog crates.

pub mod repository;
pub mod services;

pub use repository::{
    AdjustmentHistoryRepository, InMemoryStore, PostgresStore, ProductRepository,
    ProtectionPlanRepository, RepoResult, RepositoryError,
};
pub use services::{
    AdjustmentOutcome, CatalogService, PriceAdjustmentService, ProtectionService, ServiceError,
    ServiceResult,
};
