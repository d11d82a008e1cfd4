//! Application routes and the identity gate in front of them

use std::fmt;
use std::str::FromStr;

use surveyor_types::Session;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Signup,
    Help,
    About,
    Dashboard,
    NewScan,
    ScanDetail(String),
}

impl Route {
    /// Match a path. Query strings, fragments and a trailing slash are
    /// ignored; unknown paths are `None`.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);

        let route = match path {
            "" | "/" => Route::Landing,
            "/login" => Route::Login,
            "/signup" => Route::Signup,
            "/help" => Route::Help,
            "/about" => Route::About,
            "/dashboard" => Route::Dashboard,
            "/scan/new" => Route::NewScan,
            other => {
                let id = other.strip_prefix("/scan/")?;
                if id.is_empty() || id.contains('/') {
                    return None;
                }
                Route::ScanDetail(id.to_string())
            }
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
            Route::Help => "/help".to_string(),
            Route::About => "/about".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::NewScan => "/scan/new".to_string(),
            Route::ScanDetail(id) => format!("/scan/{id}"),
        }
    }

    /// Routes that need a signed-in user
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Route::Dashboard | Route::NewScan | Route::ScanDetail(_)
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::parse(s).ok_or_else(|| format!("Unknown route: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
}

/// Gated routes without a live session go to `/login`
pub fn guard(route: &Route, session: Option<&Session>) -> RouteDecision {
    let signed_in = session.is_some_and(|s| !s.is_expired());
    if route.is_gated() && !signed_in {
        RouteDecision::Redirect(Route::Login)
    } else {
        RouteDecision::Render(route.clone())
    }
}
