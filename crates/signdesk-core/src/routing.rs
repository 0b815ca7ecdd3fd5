//! Path routing over guarded views.
//!
//! Routes are registered as `(pattern, GuardedView)` pairs; patterns use
//! `:name` segments for parameters (`/dashboard/tickets/:id`). Static segments
//! beat parameters, so `/dashboard/tickets/assigned` is not captured as an id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::auth::SessionStore;
use crate::guard::{AuthorizedSession, GuardPolicy, GuardState, GuardedView, Rendered, RouteRequest};

/// Maximum redirects followed in one navigation.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

struct Route {
    pattern: String,
    segments: Vec<Segment>,
    target: GuardedView,
}

impl Route {
    fn new(pattern: &str, target: GuardedView) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            segments,
            target,
        }
    }

    /// Captured parameters and the number of static segments matched.
    fn matches(&self, path: &str) -> Option<(HashMap<String, String>, usize)> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        let mut statics = 0;
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(s) if s == part => statics += 1,
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part).ok()?.into_owned();
                    params.insert(name.clone(), value);
                }
            }
        }
        Some((params, statics))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The page at `path` rendered.
    Page { path: String, title: String, body: String },
    /// The session must log in; `redirect` is the login destination.
    LoginRequired { redirect: String },
    NotFound { path: String },
    /// A redirect led outside the routing table, e.g. `/unauthorized`.
    External { path: String },
}

/// Routing table plus the session and policy every guarded mount is checked
/// against.
pub struct Router {
    routes: Vec<Route>,
    session: SessionStore,
    policy: GuardPolicy,
    clock: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl Router {
    pub fn new(session: SessionStore, policy: GuardPolicy) -> Self {
        Self {
            routes: Vec::new(),
            session,
            policy,
            clock: Arc::new(|| Utc::now().timestamp()),
        }
    }

    /// Replace the clock used for expiry checks (Unix seconds).
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Register a guarded view under `pattern`.
    pub fn route(mut self, pattern: &str, target: GuardedView) -> Self {
        self.routes.push(Route::new(pattern, target));
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    fn resolve(&self, location: &str) -> Option<(&Route, RouteRequest)> {
        let (path, query) = location.split_once('?').unwrap_or((location, ""));
        let (route, params) = self
            .routes
            .iter()
            .filter_map(|route| route.matches(path).map(|(params, statics)| (route, params, statics)))
            .max_by_key(|(_, _, statics)| *statics)
            .map(|(route, params, _)| (route, params))?;

        Some((
            route,
            RouteRequest {
                path: location.to_string(),
                params,
                query: parse_query(query),
            },
        ))
    }

    /// Run the guard for `location` without rendering. Used by actions that
    /// belong to a page (replying to a ticket, editing a user) so they get
    /// the same access rule as the page itself.
    pub fn authorize(&self, location: &str) -> Result<AuthorizedSession, Navigation> {
        let Some((route, request)) = self.resolve(location) else {
            return Err(Navigation::NotFound {
                path: location.to_string(),
            });
        };
        let mut mount = route.target.mount(request);
        match mount.evaluate(&self.session, &self.policy, (self.clock)()) {
            GuardState::Authorized(session) => Ok(session.clone()),
            GuardState::Unauthenticated { redirect } => Err(Navigation::LoginRequired {
                redirect: redirect.clone(),
            }),
            GuardState::Forbidden { redirect } => Err(self.redirect_target(redirect)),
            GuardState::Checking => Err(Navigation::LoginRequired {
                redirect: self.policy.login_redirect(location),
            }),
        }
    }

    fn redirect_target(&self, redirect: &str) -> Navigation {
        let path = redirect.split('?').next().unwrap_or_default();
        if path == self.policy.login_path {
            Navigation::LoginRequired {
                redirect: redirect.to_string(),
            }
        } else {
            Navigation::External {
                path: redirect.to_string(),
            }
        }
    }

    /// Mount the view at `location`, following guard redirects between
    /// routed pages.
    pub async fn navigate(&self, location: &str) -> Navigation {
        let mut current = location.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let Some((route, request)) = self.resolve(&current) else {
                debug!(path = %current, "No route");
                return Navigation::NotFound { path: current };
            };

            let mut mount = route.target.mount(request);
            mount.evaluate(&self.session, &self.policy, (self.clock)());

            match mount.render().await {
                Rendered::Page(body) => {
                    info!(path = %current, view = route.target.title(), "Rendered view");
                    return Navigation::Page {
                        path: current,
                        title: route.target.title().to_string(),
                        body,
                    };
                }
                Rendered::Redirect(to) => {
                    debug!(from = %current, to = %to, "Guard redirect");
                    match self.redirect_target(&to) {
                        Navigation::External { path } if self.resolve(&path).is_some() => {
                            current = path;
                        }
                        other => return other,
                    }
                }
                Rendered::Loading => {
                    // evaluate() always leaves Checking
                    return Navigation::LoginRequired {
                        redirect: self.policy.login_redirect(&current),
                    };
                }
            }
        }

        Navigation::External { path: current }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_tokens::make;
    use crate::guard::{Guard, View};
    use crate::models::{Role, UserProfile};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    const NOW: i64 = 1_750_000_000;

    struct Echo(&'static str);

    #[async_trait]
    impl View for Echo {
        fn title(&self) -> &str {
            self.0
        }

        async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String> {
            let mut params: Vec<_> = request.params.iter().collect();
            params.sort();
            Ok(format!("{} {} {:?}", self.0, session.user.username, params))
        }
    }

    fn router(store: SessionStore) -> Router {
        Router::new(store, GuardPolicy::default())
            .with_clock(|| NOW)
            .route("/dashboard", Guard::protect(Echo("dashboard"), &[]))
            .route("/dashboard/tickets/:id", Guard::protect(Echo("ticket"), &[Role::Admin, Role::User]))
            .route("/dashboard/tickets/assigned", Guard::protect(Echo("assigned"), &[Role::Admin]))
            .route("/dashboard/users", Guard::protect(Echo("users"), &[Role::Admin]))
    }

    fn signed_in(role: &str) -> SessionStore {
        let store = SessionStore::in_memory();
        store.save_token(&make(&json!({"exp": NOW + 3600}))).unwrap();
        let user: UserProfile =
            serde_json::from_value(json!({"username": "kim", "role": role})).unwrap();
        store.save_user(&user).unwrap();
        store
    }

    #[test]
    fn test_static_segment_beats_param() {
        let router = router(SessionStore::in_memory());
        let (route, _) = router.resolve("/dashboard/tickets/assigned").unwrap();
        assert_eq!(route.pattern, "/dashboard/tickets/assigned");

        let (route, request) = router.resolve("/dashboard/tickets/68277aa7").unwrap();
        assert_eq!(route.pattern, "/dashboard/tickets/:id");
        assert_eq!(request.param("id"), Some("68277aa7"));
    }

    #[test]
    fn test_query_is_parsed() {
        let router = router(SessionStore::in_memory());
        let (_, request) = router
            .resolve("/dashboard/users?search=jane+doe&status=open")
            .unwrap();
        assert_eq!(request.query("search"), Some("jane doe"));
        assert_eq!(request.query("status"), Some("open"));
        assert_eq!(request.path, "/dashboard/users?search=jane+doe&status=open");
    }

    #[tokio::test]
    async fn test_forbidden_follows_redirect_to_dashboard() {
        let router = router(signed_in("user"));
        match router.navigate("/dashboard/users").await {
            Navigation::Page { path, title, .. } => {
                assert_eq!(path, "/dashboard");
                assert_eq!(title, "dashboard");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_param_reaches_view() {
        let router = router(signed_in("admin"));
        match router.navigate("/dashboard/tickets/t-9").await {
            Navigation::Page { body, .. } => assert!(body.contains(r#"("id", "t-9")"#)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signed_out_gets_login_redirect() {
        let router = router(SessionStore::in_memory());
        assert_eq!(
            router.navigate("/dashboard/users").await,
            Navigation::LoginRequired {
                redirect: "/auth/login?redirect=%2Fdashboard%2Fusers".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let router = router(signed_in("admin"));
        assert_eq!(
            router.navigate("/nowhere").await,
            Navigation::NotFound { path: "/nowhere".to_string() }
        );
    }

    #[test]
    fn test_authorize() {
        let router = router(signed_in("user"));
        assert!(router.authorize("/dashboard/tickets/t-1").is_ok());
        assert_eq!(
            router.authorize("/dashboard/users").unwrap_err(),
            Navigation::External { path: "/dashboard".to_string() }
        );
    }
}
