//! `shopfront-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API layer turns bearer tokens into a
//! [`Principal`] and checks permissions here before calling a service.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
