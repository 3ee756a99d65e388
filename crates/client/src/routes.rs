//! Dashboard route table.

use vialyzer_auth::{Action, ModuleKey, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppRoute {
    SignIn,
    Home,
    Cameras,
    Vehicles,
    Kpis,
    Agents,
    Users,
    UserCreate,
    Companies,
    CompanyCreate,
    Roles,
    RoleCreate,
    Modules,
    Scenarios,
}

impl AppRoute {
    pub const ALL: [AppRoute; 14] = [
        AppRoute::SignIn,
        AppRoute::Home,
        AppRoute::Cameras,
        AppRoute::Vehicles,
        AppRoute::Kpis,
        AppRoute::Agents,
        AppRoute::Users,
        AppRoute::UserCreate,
        AppRoute::Companies,
        AppRoute::CompanyCreate,
        AppRoute::Roles,
        AppRoute::RoleCreate,
        AppRoute::Modules,
        AppRoute::Scenarios,
    ];

    /// Where unauthenticated navigations land.
    pub const SIGN_IN: AppRoute = AppRoute::SignIn;
    /// Where unauthorized navigations land.
    pub const FALLBACK: AppRoute = AppRoute::Home;

    pub fn path(&self) -> &'static str {
        match self {
            AppRoute::SignIn => "/auth/sign-in",
            AppRoute::Home => "/",
            AppRoute::Cameras => "/cameras",
            AppRoute::Vehicles => "/vehicles",
            AppRoute::Kpis => "/kpis",
            AppRoute::Agents => "/agents",
            AppRoute::Users => "/users",
            AppRoute::UserCreate => "/users/new",
            AppRoute::Companies => "/companies",
            AppRoute::CompanyCreate => "/companies/new",
            AppRoute::Roles => "/roles",
            AppRoute::RoleCreate => "/roles/new",
            AppRoute::Modules => "/modules",
            AppRoute::Scenarios => "/scenarios",
        }
    }

    /// What the guard checks before entering. `None` for public routes.
    pub fn requirement(&self) -> Option<Requirement> {
        let module = |key: ModuleKey| Some(Requirement::module(key));
        let create = |key: ModuleKey| Some(Requirement::capability(key.can(Action::Create)));

        match self {
            AppRoute::SignIn => None,
            AppRoute::Home => Some(Requirement::Authenticated),
            AppRoute::Cameras => module(ModuleKey::Cameras),
            AppRoute::Vehicles => module(ModuleKey::Vehicles),
            AppRoute::Kpis => module(ModuleKey::Kpis),
            AppRoute::Agents => module(ModuleKey::Agents),
            AppRoute::Users => module(ModuleKey::Users),
            AppRoute::UserCreate => create(ModuleKey::Users),
            AppRoute::Companies => module(ModuleKey::Companies),
            AppRoute::CompanyCreate => create(ModuleKey::Companies),
            AppRoute::Roles => module(ModuleKey::Roles),
            AppRoute::RoleCreate => create(ModuleKey::Roles),
            AppRoute::Modules => module(ModuleKey::Modules),
            AppRoute::Scenarios => module(ModuleKey::Scenarios),
        }
    }

    pub fn is_public(&self) -> bool {
        self.requirement().is_none()
    }

    /// Exact match on the path, ignoring a trailing slash.
    pub fn from_path(path: &str) -> Option<AppRoute> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        AppRoute::ALL.into_iter().find(|route| route.path() == path)
    }
}

impl core::fmt::Display for AppRoute {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}
