//! Typed capability set.
//!
//! Modules and actions known to the dashboard, so route tables and render
//! guards can name what they require without free-form strings.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownCapability {
    pub kind: &'static str,
    pub value: String,
}

/// Functional areas of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKey {
    Dashboard,
    Cameras,
    Vehicles,
    Kpis,
    Agents,
    Users,
    Companies,
    Roles,
    Modules,
    Scenarios,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 10] = [
        ModuleKey::Dashboard,
        ModuleKey::Cameras,
        ModuleKey::Vehicles,
        ModuleKey::Kpis,
        ModuleKey::Agents,
        ModuleKey::Users,
        ModuleKey::Companies,
        ModuleKey::Roles,
        ModuleKey::Modules,
        ModuleKey::Scenarios,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Dashboard => "dashboard",
            ModuleKey::Cameras => "cameras",
            ModuleKey::Vehicles => "vehicles",
            ModuleKey::Kpis => "kpis",
            ModuleKey::Agents => "agents",
            ModuleKey::Users => "users",
            ModuleKey::Companies => "companies",
            ModuleKey::Roles => "roles",
            ModuleKey::Modules => "modules",
            ModuleKey::Scenarios => "scenarios",
        }
    }

    pub fn can(self, action: Action) -> Capability {
        Capability::new(self, action)
    }
}

impl core::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKey {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKey::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCapability {
                kind: "module",
                value: s.to_string(),
            })
    }
}

/// Actions a role may be granted within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
    Export,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::List,
        Action::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::List => "list",
            Action::Export => "export",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCapability {
                kind: "action",
                value: s.to_string(),
            })
    }
}

/// An action within a module; its string form is the qualified permission
/// name `"<module>.<action>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub module: ModuleKey,
    pub action: Action,
}

impl Capability {
    pub const fn new(module: ModuleKey, action: Action) -> Self {
        Self { module, action }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.action)
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.module, self.action)
    }
}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, action) = s.split_once('.').ok_or_else(|| UnknownCapability {
            kind: "capability",
            value: s.to_string(),
        })?;
        Ok(Self::new(module.parse()?, action.parse()?))
    }
}
