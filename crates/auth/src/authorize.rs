use serde::Serialize;
use thiserror::Error;

use crate::capability::{Capability, ModuleKey};
use crate::model::{User, same_name};

// ─────────────────────────────────────────────────────────────────────────────
// Evaluator
// ─────────────────────────────────────────────────────────────────────────────
//
// All four checks are total: an absent user or an empty name is a plain
// `false`, never an error.

/// Case-insensitive equality between the user's role name and `role_name`.
pub fn has_role(role_name: &str, user: Option<&User>) -> bool {
    match user {
        Some(user) if !role_name.is_empty() => same_name(&user.role.name, role_name),
        _ => false,
    }
}

/// Case-insensitive membership of `module_name` in the role's modules.
pub fn has_module(module_name: &str, user: Option<&User>) -> bool {
    match user {
        Some(user) if !module_name.is_empty() => user
            .role
            .module_names()
            .any(|name| same_name(name, module_name)),
        _ => false,
    }
}

/// Case-insensitive membership of `permission_name` in the role's
/// permissions, by bare action or by `"<module>.<action>"`.
pub fn has_permission(permission_name: &str, user: Option<&User>) -> bool {
    match user {
        Some(user) if !permission_name.is_empty() => user
            .role
            .permissions
            .iter()
            .any(|p| p.answers_to(permission_name)),
        _ => false,
    }
}

/// `true` only if every name is granted. An empty list is `false`.
pub fn has_multiple_permissions<S: AsRef<str>>(permission_names: &[S], user: Option<&User>) -> bool {
    !permission_names.is_empty()
        && permission_names
            .iter()
            .all(|name| has_permission(name.as_ref(), user))
}

// ─────────────────────────────────────────────────────────────────────────────
// Requirement
// ─────────────────────────────────────────────────────────────────────────────

/// What a guard needs from the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    /// Any signed-in user.
    Authenticated,
    Role(String),
    Module(String),
    Permission(String),
    /// Every listed permission (AND). Empty is never satisfied.
    AllPermissions(Vec<String>),
}

impl Requirement {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role(name.into())
    }

    pub fn module(module: ModuleKey) -> Self {
        Self::Module(module.as_str().to_string())
    }

    pub fn capability(capability: Capability) -> Self {
        Self::Permission(capability.qualified_name())
    }

    pub fn all(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self::AllPermissions(
            capabilities
                .into_iter()
                .map(|c| c.qualified_name())
                .collect(),
        )
    }

    pub fn is_satisfied_by(&self, user: Option<&User>) -> bool {
        match self {
            Requirement::Authenticated => user.is_some(),
            Requirement::Role(name) => has_role(name, user),
            Requirement::Module(name) => has_module(name, user),
            Requirement::Permission(name) => has_permission(name, user),
            Requirement::AllPermissions(names) => has_multiple_permissions(names, user),
        }
    }
}

impl From<Capability> for Requirement {
    fn from(value: Capability) -> Self {
        Self::capability(value)
    }
}

impl From<ModuleKey> for Requirement {
    fn from(value: ModuleKey) -> Self {
        Self::module(value)
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Requirement::Authenticated => f.write_str("authenticated"),
            Requirement::Role(name) => write!(f, "role '{name}'"),
            Requirement::Module(name) => write!(f, "module '{name}'"),
            Requirement::Permission(name) => write!(f, "permission '{name}'"),
            Requirement::AllPermissions(names) => write!(f, "permissions [{}]", names.join(", ")),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("forbidden: missing role '{0}'")]
    MissingRole(String),

    #[error("forbidden: missing module '{0}'")]
    MissingModule(String),

    #[error("forbidden: missing permissions {0:?}")]
    MissingPermissions(Vec<String>),
}

/// Check a requirement against the current user.
///
/// - No IO
/// - No panics
pub fn authorize(user: Option<&User>, required: &Requirement) -> Result<(), AuthzError> {
    if required.is_satisfied_by(user) {
        return Ok(());
    }
    if user.is_none() {
        return Err(AuthzError::NotAuthenticated);
    }

    Err(match required {
        Requirement::Authenticated => AuthzError::NotAuthenticated,
        Requirement::Role(name) => AuthzError::MissingRole(name.clone()),
        Requirement::Module(name) => AuthzError::MissingModule(name.clone()),
        Requirement::Permission(name) => AuthzError::MissingPermissions(vec![name.clone()]),
        Requirement::AllPermissions(names) => AuthzError::MissingPermissions(missing(names, user)),
    })
}

fn missing(names: &[String], user: Option<&User>) -> Vec<String> {
    names
        .iter()
        .filter(|name| !has_permission(name, user))
        .cloned()
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Serializable account of a decision, for debug logs.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub requirement: Requirement,
    pub granted: bool,
    pub reason: String,
    /// `None` when no user was available.
    pub viewer: Option<ViewerState>,
    /// Names the user lacks. Empty when granted.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewerState {
    pub email: String,
    pub role: String,
    pub modules: Vec<String>,
    pub permissions: Vec<String>,
}

/// Explain why a requirement is (or would be) granted or denied.
pub fn explain(required: &Requirement, user: Option<&User>) -> AuthorizationExplanation {
    let viewer = user.map(|u| {
        let mut permissions = u.role.permission_names();
        permissions.sort();
        ViewerState {
            email: u.email.clone(),
            role: u.role.name.clone(),
            modules: u.role.module_names().map(str::to_string).collect(),
            permissions,
        }
    });

    let outcome = authorize(user, required);
    let granted = outcome.is_ok();

    let (reason, missing) = match outcome {
        Ok(()) => (format!("{required} satisfied"), Vec::new()),
        Err(AuthzError::NotAuthenticated) => ("no signed-in user".to_string(), Vec::new()),
        Err(AuthzError::MissingRole(name)) => {
            let held = user.map(|u| u.role.name.as_str()).unwrap_or_default();
            (format!("role is '{held}', required '{name}'"), vec![name])
        }
        Err(AuthzError::MissingModule(name)) => {
            (format!("role has no module '{name}'"), vec![name])
        }
        Err(AuthzError::MissingPermissions(names)) if names.is_empty() => (
            "empty permission list is never satisfied".to_string(),
            Vec::new(),
        ),
        Err(AuthzError::MissingPermissions(names)) => {
            (format!("missing permissions: {}", names.join(", ")), names)
        }
    };

    AuthorizationExplanation {
        requirement: required.clone(),
        granted,
        reason,
        viewer,
        missing,
    }
}
