//! Backend service configuration

use serde::{Deserialize, Serialize};

use portico_policy::{PolicyError, ServiceEndpoint};

/// Which backend relative requests are routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceSelection {
    /// Primary REST service
    #[default]
    Primary,
    /// Alternate data service
    Alternate,
}

impl ServiceSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceSelection::Primary => "primary",
            ServiceSelection::Alternate => "alternate",
        }
    }
}

impl std::str::FromStr for ServiceSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(ServiceSelection::Primary),
            "alternate" => Ok(ServiceSelection::Alternate),
            _ => Err(format!("Unknown service selection: {}", s)),
        }
    }
}

/// Rename one query key for requests whose literal path matches `route`.
///
/// `route` is either an exact path (`files/list`) or a prefix ending in `*`
/// (`files/*`). Leading slashes are ignored on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRename {
    pub route: String,
    pub from: String,
    pub to: String,
}

impl QueryRename {
    pub fn new(route: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        let route = self.route.trim_start_matches('/');

        match route.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == route,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL; its origin and path bound what receives credentials
    pub base_url: String,
    #[serde(default)]
    pub query_renames: Vec<QueryRename>,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            query_renames: Vec::new(),
        }
    }

    pub fn with_rename(mut self, rename: QueryRename) -> Self {
        self.query_renames.push(rename);
        self
    }

    pub fn endpoint(&self) -> Result<ServiceEndpoint, PolicyError> {
        ServiceEndpoint::parse(&self.base_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub primary: ServiceConfig,
    #[serde(default)]
    pub alternate: Option<ServiceConfig>,
    #[serde(default)]
    pub selected: ServiceSelection,
}

impl BackendConfig {
    pub fn new(primary: ServiceConfig) -> Self {
        Self {
            primary,
            alternate: None,
            selected: ServiceSelection::Primary,
        }
    }

    pub fn with_alternate(mut self, alternate: ServiceConfig) -> Self {
        self.alternate = Some(alternate);
        self
    }

    /// The currently selected service.
    ///
    /// Selecting the alternate service without configuring one yields `None`.
    pub fn selected_service(&self) -> Option<&ServiceConfig> {
        match self.selected {
            ServiceSelection::Primary => Some(&self.primary),
            ServiceSelection::Alternate => self.alternate.as_ref(),
        }
    }
}
