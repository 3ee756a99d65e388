//! `vialyzer-auth`: pure authorization boundary for the dashboard client.
//!
//! User/role records as served by the API, the typed capability set, the
//! permission evaluator, and session token types. No IO and no framework.

pub mod authorize;
pub mod capability;
pub mod model;
pub mod session;

pub use authorize::{
    AuthorizationExplanation, AuthzError, Requirement, authorize, explain, has_module,
    has_multiple_permissions, has_permission, has_role,
};
pub use capability::{Action, Capability, ModuleKey, UnknownCapability};
pub use model::{Company, Module, Permission, Role, User};
pub use session::{AuthStatus, Credentials, Session, SessionValidationError, TokenGrant, TokenPair};
