//! User, role, module and permission records as materialized by the API.
//!
//! The client only ever reads these. A user's authorization is whatever its
//! single role carries; there are no per-user grants.

use serde::{Deserialize, Serialize};

use vialyzer_core::{CompanyId, ModuleId, PermissionId, RoleId, UserId};

fn active_by_default() -> bool {
    true
}

/// Case-insensitive name comparison used by every authorization check.
pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission
// ─────────────────────────────────────────────────────────────────────────────

/// An action granted to a role, scoped to a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub action: String,
    /// Owning module name. Some endpoints omit it.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl Permission {
    pub fn new(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: PermissionId::new(),
            action: action.into(),
            module: Some(module.into()),
            active: true,
        }
    }

    /// `"<module>.<action>"`, when the owning module is known.
    pub fn qualified_name(&self) -> Option<String> {
        self.module
            .as_deref()
            .map(|module| format!("{}.{}", module, self.action))
    }

    /// Whether `name` designates this permission, either by bare action or by
    /// qualified name.
    pub fn answers_to(&self, name: &str) -> bool {
        if same_name(&self.action, name) {
            return true;
        }
        match self.module.as_deref() {
            Some(module) => name
                .split_once('.')
                .is_some_and(|(m, a)| same_name(m, module) && same_name(a, &self.action)),
            None => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module
// ─────────────────────────────────────────────────────────────────────────────

/// A named functional area of the dashboard (e.g. "roles", "agents").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(),
            name: name.into(),
            permissions: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// The sole holder of a user's modules and permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            description: None,
            active: true,
            modules: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.modules.push(Module::new(name));
        self
    }

    pub fn with_permission(mut self, module: impl Into<String>, action: impl Into<String>) -> Self {
        self.permissions.push(Permission::new(module, action));
        self
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    /// Display names of the granted permissions (qualified where possible).
    pub fn permission_names(&self) -> Vec<String> {
        self.permissions
            .iter()
            .map(|p| p.qualified_name().unwrap_or_else(|| p.action.clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Company / User
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Tax identifier.
    #[serde(default)]
    pub nit: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CompanyId::new(),
            name: name.into(),
            nit: None,
            active: true,
        }
    }
}

/// The signed-in user, as returned by the current-user endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub company: Company,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role, company: Company) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            phone: None,
            role,
            company,
        }
    }
}
