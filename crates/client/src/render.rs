//! Conditional-render guards.
//!
//! A [`Gate`] decides whether a sub-tree is shown for a [`Viewer`]. Both are
//! plain values, so the decision is the same in Leptos components and tests.
//! Nothing here fetches: the viewer carries whatever user is already cached.

use std::sync::Arc;

use vialyzer_auth::{Requirement, User};

/// The user a page is rendered for, if one has been fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewer {
    user: Option<Arc<User>>,
}

impl Viewer {
    pub fn new(user: Option<Arc<User>>) -> Self {
        Self { user }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    pub fn can(&self, requirement: &Requirement) -> bool {
        requirement.is_satisfied_by(self.user())
    }
}

impl From<User> for Viewer {
    fn from(user: User) -> Self {
        Self::new(Some(Arc::new(user)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Role(String),
    Module(String),
    /// `<module_base>.<permission>`
    Permission {
        module_base: String,
        permission: String,
    },
    /// Every `<module_base>.<permission>`. Empty never passes.
    MultiplePermissions {
        module_base: String,
        permissions: Vec<String>,
    },
}

fn qualify(module_base: &str, permission: &str) -> String {
    if module_base.is_empty() {
        permission.to_string()
    } else {
        format!("{module_base}.{permission}")
    }
}

impl Gate {
    pub fn role(name: impl Into<String>) -> Self {
        Gate::Role(name.into())
    }

    pub fn module(name: impl Into<String>) -> Self {
        Gate::Module(name.into())
    }

    pub fn permission(module_base: impl Into<String>, permission: impl Into<String>) -> Self {
        Gate::Permission {
            module_base: module_base.into(),
            permission: permission.into(),
        }
    }

    pub fn permissions<I, S>(module_base: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Gate::MultiplePermissions {
            module_base: module_base.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Gate::Role(name) => Requirement::Role(name.clone()),
            Gate::Module(name) => Requirement::Module(name.clone()),
            Gate::Permission {
                module_base,
                permission,
            } => Requirement::Permission(qualify(module_base, permission)),
            Gate::MultiplePermissions {
                module_base,
                permissions,
            } => Requirement::AllPermissions(
                permissions
                    .iter()
                    .map(|p| qualify(module_base, p))
                    .collect(),
            ),
        }
    }

    pub fn allows(&self, viewer: &Viewer) -> bool {
        let requirement = self.requirement();
        let allowed = viewer.can(&requirement);
        tracing::trace!(requirement = %requirement, allowed, "render gate");
        allowed
    }

    /// `children()` when allowed, otherwise nothing.
    pub fn render<V>(&self, viewer: &Viewer, children: impl FnOnce() -> V) -> Option<V> {
        self.allows(viewer).then(children)
    }

    pub fn render_or<V>(
        &self,
        viewer: &Viewer,
        children: impl FnOnce() -> V,
        fallback: impl FnOnce() -> V,
    ) -> V {
        if self.allows(viewer) {
            children()
        } else {
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, operator};

    #[test]
    fn create_button_hidden_without_grant() {
        let viewer = Viewer::from(operator());
        let gate = Gate::permission("companies", "create");

        assert_eq!(gate.render(&viewer, || "create company"), None);
        assert_eq!(gate.render_or(&viewer, || "create company", || "read only"), "read only");

        let viewer = Viewer::from(admin());
        assert_eq!(gate.render(&viewer, || "create company"), Some("create company"));
    }

    #[test]
    fn multiple_permissions_need_every_grant() {
        let viewer = Viewer::from(operator());

        assert!(Gate::permissions("cameras", ["read", "update"]).allows(&viewer));
        assert!(!Gate::permissions("cameras", ["read", "delete"]).allows(&viewer));
        assert!(!Gate::permissions("cameras", Vec::<String>::new()).allows(&viewer));
    }

    #[test]
    fn anonymous_viewer_sees_nothing_gated() {
        let viewer = Viewer::anonymous();
        for gate in [
            Gate::role("operator"),
            Gate::module("cameras"),
            Gate::permission("cameras", "read"),
        ] {
            assert!(!gate.allows(&viewer), "{gate:?}");
        }
    }

    #[test]
    fn role_and_module_gates_ignore_case() {
        let viewer = Viewer::from(operator());
        assert!(Gate::role("OPERATOR").allows(&viewer));
        assert!(Gate::module("Vehicles").allows(&viewer));
        assert!(!Gate::module("kpis").allows(&viewer));
    }

    #[test]
    fn empty_module_base_uses_bare_permission() {
        assert_eq!(
            Gate::permission("", "list").requirement(),
            Requirement::Permission("list".to_string())
        );
    }
}
