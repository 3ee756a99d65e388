//! REST resources the dashboard pages read through the query cache.

use crate::query_cache::QueryKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Cameras,
    Users,
    Roles,
    Modules,
    Companies,
    Scenarios,
    Vehicles,
    Kpis,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Cameras => "/cameras",
            Resource::Users => "/users",
            Resource::Roles => "/roles",
            Resource::Modules => "/modules",
            Resource::Companies => "/companies",
            Resource::Scenarios => "/scenarios",
            Resource::Vehicles => "/vehicles",
            Resource::Kpis => "/kpis",
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::from_static(self.path())
    }
}
