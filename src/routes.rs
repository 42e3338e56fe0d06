//! Route table
//!
//! Static description of the client's pages and their access requirements.
//! Patterns support literal segments, `:name` parameters and a final `*`
//! fallback.

use crate::guards::RouteRequirement;
use crate::models::Role;
use crate::settings::RouteSettings;
use serde::Serialize;
use std::collections::HashMap;

pub const NOT_FOUND_PAGE: &str = "not-found";

/// One entry of the route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDefinition {
    pub path: String,
    pub page: String,
    pub requirement: RouteRequirement,
    /// Login/register: only meaningful for anonymous sessions
    pub guest_only: bool,
    /// Index routes that immediately forward elsewhere
    pub redirect_to: Option<String>,
}

impl RouteDefinition {
    #[must_use]
    pub fn new(path: &str, page: &str, requirement: RouteRequirement) -> Self {
        Self {
            path: path.to_string(),
            page: page.to_string(),
            requirement,
            guest_only: false,
            redirect_to: None,
        }
    }

    #[must_use]
    pub fn guest_only(mut self) -> Self {
        self.guest_only = true;
        self
    }

    #[must_use]
    pub fn redirecting_to(mut self, target: &str) -> Self {
        self.redirect_to = Some(target.to_string());
        self
    }

    /// Match a concrete path, returning captured `:params`
    fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        if self.path == "*" {
            return Some(HashMap::new());
        }

        let pattern: Vec<&str> = segments(&self.path).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (expected, got) in pattern.iter().zip(&actual) {
            if let Some(name) = expected.strip_prefix(':') {
                params.insert(name.to_string(), (*got).to_string());
            } else if expected != got {
                return None;
            }
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl From<&RouteSettings> for RouteDefinition {
    fn from(settings: &RouteSettings) -> Self {
        Self {
            path: settings.path.clone(),
            page: settings.page.clone(),
            requirement: RouteRequirement {
                requires_auth: settings.requires_auth || !settings.allowed_roles.is_empty(),
                allowed_roles: settings.allowed_roles.iter().copied().collect(),
            },
            guest_only: settings.guest_only,
            redirect_to: settings.redirect_to.clone(),
        }
    }
}

/// A route resolved for a concrete path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDefinition,
    pub params: HashMap<String, String>,
}

/// Ordered route table; the first matching definition wins
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self { routes }
    }

    /// The news client's page layout
    #[must_use]
    pub fn news_client() -> Self {
        let auth = RouteRequirement::authenticated;
        let public = RouteRequirement::public;
        let admin = || RouteRequirement::roles(&[Role::Admin]);

        Self::new(vec![
            RouteDefinition::new("/", "home", public()),
            RouteDefinition::new("/all-articles", "all-articles", public()),
            RouteDefinition::new("/article/:id", "article-details", auth()),
            RouteDefinition::new("/add-article", "add-article", auth()),
            RouteDefinition::new("/subscription", "subscription", auth()),
            RouteDefinition::new(
                "/premium-articles",
                "premium-articles",
                RouteRequirement::roles(&[Role::Premium, Role::Admin]),
            ),
            RouteDefinition::new("/my-profile", "my-profile", auth()),
            RouteDefinition::new("/update-profile", "update-profile", auth()),
            RouteDefinition::new("/my-articles", "my-articles", auth()),
            RouteDefinition::new("/admin", "admin", admin()).redirecting_to("/admin/dashboard"),
            RouteDefinition::new("/admin/dashboard", "admin-dashboard", admin()),
            RouteDefinition::new("/admin/manage-users", "manage-users", admin()),
            RouteDefinition::new("/admin/manage-articles", "manage-articles", admin()),
            RouteDefinition::new("/admin/publisher", "publisher", admin()),
            RouteDefinition::new("/login", "login", public()).guest_only(),
            RouteDefinition::new("/register", "register", public()).guest_only(),
            RouteDefinition::new("/unauthorized", "unauthorized", public()),
            RouteDefinition::new("*", NOT_FOUND_PAGE, public()),
        ])
    }

    /// Build from configuration, falling back to [`RouteTable::news_client`]
    /// when no routes are configured
    #[must_use]
    pub fn from_settings(routes: &[RouteSettings]) -> Self {
        if routes.is_empty() {
            return Self::news_client();
        }
        let mut table: Vec<RouteDefinition> = routes.iter().map(RouteDefinition::from).collect();
        if !table.iter().any(|route| route.path == "*") {
            table.push(RouteDefinition::new("*", NOT_FOUND_PAGE, RouteRequirement::public()));
        }
        Self::new(table)
    }

    /// Resolve a request path (query string ignored)
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.routes.iter().find_map(|route| {
            route
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.iter()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::news_client()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_literal_and_param_routes() {
        let table = RouteTable::news_client();

        let home = table.resolve("/").unwrap();
        assert_eq!(home.route.page, "home");

        let article = table.resolve("/article/abc123").unwrap();
        assert_eq!(article.route.page, "article-details");
        assert_eq!(article.params.get("id").map(String::as_str), Some("abc123"));
        assert!(article.route.requirement.requires_auth);
    }

    #[test]
    fn test_query_string_is_ignored() {
        let table = RouteTable::news_client();
        let route = table.resolve("/premium-articles?page=3").unwrap();
        assert_eq!(route.route.page, "premium-articles");
    }

    #[test]
    fn test_unknown_paths_fall_through_to_not_found() {
        let table = RouteTable::news_client();
        let route = table.resolve("/no/such/page").unwrap();
        assert_eq!(route.route.page, NOT_FOUND_PAGE);
        assert!(!route.route.requirement.requires_auth);
    }

    #[test]
    fn test_admin_index_redirects_to_dashboard() {
        let table = RouteTable::news_client();
        let route = table.resolve("/admin/").unwrap();
        assert_eq!(route.route.redirect_to.as_deref(), Some("/admin/dashboard"));
        assert!(route.route.requirement.permits(Role::Admin));
        assert!(!route.route.requirement.permits(Role::Premium));
    }

    #[test]
    fn test_from_settings_adds_fallback() {
        let settings = vec![RouteSettings {
            path: "/vault".to_string(),
            page: "vault".to_string(),
            requires_auth: false,
            allowed_roles: vec![Role::Admin],
            guest_only: false,
            redirect_to: None,
        }];
        let table = RouteTable::from_settings(&settings);
        assert_eq!(table.len(), 2);

        let vault = table.resolve("/vault").unwrap();
        assert!(vault.route.requirement.requires_auth);
        assert_eq!(table.resolve("/").unwrap().route.page, NOT_FOUND_PAGE);
    }
}
