//! Route table and the sign-in gate in front of it

use std::fmt;

use url::form_urlencoded;

use crate::auth::is_signed_in;
use crate::model::SectionKey;

/// Section a bare `/dashboard` opens
pub const DEFAULT_SECTION: SectionKey = SectionKey::Profile;

const DASHBOARD_PREFIX: &str = "/dashboard";

/// A page of the site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login { error: Option<String> },
    Signup,
    Callback,
    Dashboard(SectionKey),
    /// Public portfolio at `/{domain}`
    Portfolio(String),
    NotFound,
}

impl Route {
    /// Parse a request path (query string ignored)
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["auth", "login"] => Route::Login { error: None },
            ["auth", "signup"] => Route::Signup,
            ["auth", "callback"] => Route::Callback,
            ["dashboard"] => Route::Dashboard(DEFAULT_SECTION),
            ["dashboard", segment] => match section_from_segment(segment) {
                Some(section) => Route::Dashboard(section),
                None => Route::NotFound,
            },
            [domain] => Route::Portfolio(domain.to_string()),
            _ => Route::NotFound,
        }
    }

    /// Whether the page needs a signed-in user
    pub fn requires_session(&self) -> bool {
        matches!(self, Route::Dashboard(_))
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login { error: None } => "/auth/login".to_string(),
            Route::Login { error: Some(error) } => {
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("error", error)
                    .finish();
                format!("/auth/login?{}", query)
            }
            Route::Signup => "/auth/signup".to_string(),
            Route::Callback => "/auth/callback".to_string(),
            Route::Dashboard(section) => format!("{}/{}", DASHBOARD_PREFIX, section.as_str()),
            Route::Portfolio(domain) => format!("/{}", domain),
            Route::NotFound => "/404".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Dashboard URL segment to section; unknown segments have no section
pub fn section_from_segment(segment: &str) -> Option<SectionKey> {
    segment.parse().ok()
}

/// Where to land after signing in.
///
/// Only dashboard paths are honored so the `next` parameter cannot send
/// the user off-site.
pub fn post_login_route(next: Option<&str>) -> Route {
    match next.map(Route::parse) {
        Some(route @ Route::Dashboard(_)) => route,
        _ => Route::Dashboard(DEFAULT_SECTION),
    }
}

/// Redirect to apply before serving `path`, judged from the token alone.
///
/// This is an optimistic gate; pages still fetch the user before trusting
/// the session.
pub fn redirect_for(path: &str, token: Option<&str>, now: i64) -> Option<Route> {
    let signed_in = is_signed_in(token, now);
    let route = Route::parse(path);

    match route {
        ref r if r.requires_session() && !signed_in => Some(Route::Login { error: None }),
        Route::Login { .. } | Route::Signup if signed_in => Some(Route::Dashboard(DEFAULT_SECTION)),
        Route::Dashboard(section) if path.trim_end_matches('/') == DASHBOARD_PREFIX => {
            Some(Route::Dashboard(section))
        }
        _ => None,
    }
}
