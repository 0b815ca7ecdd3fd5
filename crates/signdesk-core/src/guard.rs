//! Role-gated access to views.
//!
//! A view is never registered on its own: it is wrapped with
//! [`Guard::protect`], and the resulting [`GuardedView`] decides on every
//! mount whether the stored session may see it. The decision is made once per
//! mount (navigation), never on a timer.
//!
//! Mount lifecycle:
//!
//! ```text
//! Checking ──evaluate──► Unauthenticated  (session cleared, redirect to login)
//!                    ├─► Forbidden        (redirect to dashboard/unauthorized)
//!                    └─► Authorized       (wrapped view renders with the user)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::auth::token::{RoleClaim, TokenClaims};
use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{Role, UserProfile};

/// Text shown while a mount has not been evaluated yet.
pub const LOADING_PLACEHOLDER: &str = "Loading...";

/// Query parameter carrying the page to return to after login.
pub const REDIRECT_PARAM: &str = "redirect";

/// A page that needs a signed-in user.
#[async_trait]
pub trait View: Send + Sync {
    fn title(&self) -> &str;

    async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String>;
}

/// The location being mounted: path, captured route parameters and query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequest {
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

impl RouteRequest {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// What an authorized view receives.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedSession {
    pub user: UserProfile,
    pub token: String,
    /// Role used for the authorization decision, see [`effective_role`].
    pub role: Option<Role>,
}

impl AuthorizedSession {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Destinations used by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPolicy {
    pub login_path: String,
    pub forbidden_path: String,
}

impl GuardPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login_path: config.login_path().to_string(),
            forbidden_path: config.forbidden_path().to_string(),
        }
    }

    /// Login destination, remembering `from` unless it is the login page.
    pub fn login_redirect(&self, from: &str) -> String {
        let from_path = from.split('?').next().unwrap_or_default();
        if from.is_empty() || from_path == self.login_path {
            self.login_path.clone()
        } else {
            format!(
                "{}?{}={}",
                self.login_path,
                REDIRECT_PARAM,
                urlencoding::encode(from)
            )
        }
    }
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Extract a safe return path from a login URL's query. Only site-relative
/// paths are accepted.
pub fn return_path(login_url: &str) -> Option<String> {
    let (_, query) = login_url.split_once('?')?;
    let encoded = query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == REDIRECT_PARAM).then_some(value)
    })?;
    let decoded = urlencoding::decode(encoded).ok()?.into_owned();
    is_local_path(&decoded).then_some(decoded)
}

pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    Checking,
    Unauthenticated { redirect: String },
    Forbidden { redirect: String },
    Authorized(AuthorizedSession),
}

impl GuardState {
    pub fn redirect(&self) -> Option<&str> {
        match self {
            GuardState::Unauthenticated { redirect } | GuardState::Forbidden { redirect } => {
                Some(redirect.as_str())
            }
            _ => None,
        }
    }
}

/// The role an authorization decision is based on.
///
/// A role claim in the token wins over the stored profile, since the profile
/// may predate a role change. A claim that is present but unknown yields no
/// role at all. Without a claim the profile's role is used.
pub fn effective_role(user: &UserProfile, claims: &TokenClaims) -> Option<Role> {
    match claims.role {
        RoleClaim::Valid(role) => {
            if role != user.role {
                warn!(
                    token_role = %role,
                    profile_role = %user.role,
                    "Token and stored profile disagree on role, using token"
                );
            }
            Some(role)
        }
        RoleClaim::Invalid(ref raw) => {
            warn!(claim = %raw, "Token carries an unknown role claim");
            None
        }
        RoleClaim::Absent => Some(user.role),
    }
}

/// Per-view access rule: the roles allowed in, empty meaning any signed-in
/// user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guard {
    allowed_roles: Vec<Role>,
}

impl Guard {
    pub fn new(allowed_roles: &[Role]) -> Self {
        Self {
            allowed_roles: allowed_roles.to_vec(),
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    /// Wrap `view` so it only renders for sessions this guard admits.
    pub fn protect<V: View + 'static>(view: V, allowed_roles: &[Role]) -> GuardedView {
        GuardedView {
            view: Arc::new(view),
            guard: Self::new(allowed_roles),
        }
    }

    fn admits(&self, role: Option<Role>) -> bool {
        if self.allowed_roles.is_empty() {
            return true;
        }
        role.is_some_and(|r| self.allowed_roles.contains(&r))
    }

    /// Decide what a mount of `path` leads to at time `now` (Unix seconds).
    pub fn evaluate(
        &self,
        session: &SessionStore,
        policy: &GuardPolicy,
        path: &str,
        now: i64,
    ) -> GuardState {
        let user = session.load_user();
        let token = session.load_token();
        let claims = token
            .as_deref()
            .and_then(TokenClaims::from_token)
            .filter(|claims| !claims.is_expired_at(now));

        let (user, token, claims) = match (user, token, claims) {
            (Some(user), Some(token), Some(claims)) => (user, token, claims),
            (user, token, _) => {
                debug!(
                    path = path,
                    has_user = user.is_some(),
                    has_token = token.is_some(),
                    "No valid session, redirecting to login"
                );
                session.clear();
                return GuardState::Unauthenticated {
                    redirect: policy.login_redirect(path),
                };
            }
        };

        let role = effective_role(&user, &claims);
        if !self.admits(role) {
            warn!(
                path = path,
                role = ?role,
                allowed = ?self.allowed_roles,
                "Role not permitted, redirecting"
            );
            return GuardState::Forbidden {
                redirect: policy.forbidden_path.clone(),
            };
        }

        GuardState::Authorized(AuthorizedSession { user, token, role })
    }
}

/// Outcome of rendering a mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Loading,
    Redirect(String),
    Page(String),
}

impl Rendered {
    /// Text to show for this outcome. Redirects show nothing.
    pub fn body(&self) -> Option<&str> {
        match self {
            Rendered::Loading => Some(LOADING_PLACEHOLDER),
            Rendered::Page(page) => Some(page.as_str()),
            Rendered::Redirect(_) => None,
        }
    }
}

/// A view composed with its guard.
#[derive(Clone)]
pub struct GuardedView {
    view: Arc<dyn View>,
    guard: Guard,
}

impl GuardedView {
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn title(&self) -> &str {
        self.view.title()
    }

    pub fn mount(&self, request: RouteRequest) -> Mount<'_> {
        Mount {
            target: self,
            request,
            state: GuardState::Checking,
        }
    }
}

/// One mount of a guarded view.
pub struct Mount<'a> {
    target: &'a GuardedView,
    request: RouteRequest,
    state: GuardState,
}

impl Mount<'_> {
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn evaluate(&mut self, session: &SessionStore, policy: &GuardPolicy, now: i64) -> &GuardState {
        self.state = self
            .target
            .guard
            .evaluate(session, policy, &self.request.path, now);
        &self.state
    }

    /// Render according to the current state. The wrapped view only runs
    /// once the mount is authorized; its own failures become inline text.
    pub async fn render(&self) -> Rendered {
        match self.state {
            GuardState::Checking => Rendered::Loading,
            GuardState::Unauthenticated { ref redirect } | GuardState::Forbidden { ref redirect } => {
                Rendered::Redirect(redirect.clone())
            }
            GuardState::Authorized(ref session) => {
                match self.target.view.render(session, &self.request).await {
                    Ok(page) => Rendered::Page(page),
                    Err(e) => {
                        warn!(view = self.target.title(), error = %e, "View failed to load");
                        Rendered::Page(format!("Error: {:#}", e))
                    }
                }
            }
        }
    }
}
