//! `vialyzer-core`: shared building blocks for the dashboard client.
//!
//! Strongly-typed identifiers, the domain error model, and the response
//! envelope shared by every REST endpoint. No IO lives here.

pub mod envelope;
pub mod error;
pub mod id;

pub use envelope::Envelope;
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, ModuleId, PermissionId, RoleId, UserId};
