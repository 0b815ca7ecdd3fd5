use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use signdesk_core::auth::token;
use signdesk_core::{AuthorizedSession, RouteRequest, View};

/// Landing page after login: who is signed in and where they can go.
pub struct DashboardPage;

#[async_trait]
impl View for DashboardPage {
    fn title(&self) -> &str {
        "Dashboard"
    }

    async fn render(&self, session: &AuthorizedSession, _request: &RouteRequest) -> Result<String> {
        Ok(render_dashboard(session, Utc::now().timestamp()))
    }
}

/// Links shown on the dashboard for a session.
pub fn menu(session: &AuthorizedSession) -> Vec<(&'static str, &'static str)> {
    let mut links = vec![
        ("/dashboard/tickets", "Support tickets"),
        ("/dashboard/purchases", "Purchases"),
    ];
    if session.is_admin() {
        links.push(("/dashboard/tickets/assigned", "Tickets assigned to me"));
        links.push(("/dashboard/users", "Users"));
    }
    links.push(("/profile", "Profile"));
    links
}

pub fn render_dashboard(session: &AuthorizedSession, now: i64) -> String {
    let mut out = vec![format!("Welcome, {}", session.user.full_name())];
    out.push(format!(
        "Role: {}",
        session.role.map(|r| r.as_str()).unwrap_or("none")
    ));
    if let Some(secs) = token::seconds_until_expiry(&session.token, now) {
        out.push(format!("Session expires in {} min", secs / 60));
    }
    out.push(String::new());
    for (path, label) in menu(session) {
        out.push(format!("  {:<30} {}", path, label));
    }
    out.join("\n")
}
