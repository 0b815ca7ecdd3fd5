use anyhow::Result;
use async_trait::async_trait;

use signdesk_core::api::ApiClient;
use signdesk_core::models::Person;
use signdesk_core::{AuthorizedSession, RouteRequest, View};

use crate::utils::{contains_ignore_case, table};

/// `/dashboard/users`: all accounts, filtered by `?search=`.
pub struct UsersPage {
    api: ApiClient,
}

impl UsersPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for UsersPage {
    fn title(&self) -> &str {
        "Users"
    }

    async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String> {
        let users = self
            .api
            .with_token(session.token.clone())
            .fetch_users()
            .await?;
        let search = request.query("search").unwrap_or_default();
        let shown: Vec<&Person> = users.iter().filter(|u| user_matches(u, search)).collect();
        Ok(render_users(&shown))
    }
}

/// `/dashboard/users/:username`
pub struct UserDetailPage {
    api: ApiClient,
}

impl UserDetailPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for UserDetailPage {
    fn title(&self) -> &str {
        "User"
    }

    async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String> {
        let username = request.param("username").unwrap_or_default();
        let user = self
            .api
            .with_token(session.token.clone())
            .fetch_user(username)
            .await?;
        Ok(render_user(&user))
    }
}

pub fn user_matches(user: &Person, search: &str) -> bool {
    let search = search.trim();
    if search.is_empty() {
        return true;
    }
    [&user.username, &user.email, &user.first_name, &user.last_name]
        .into_iter()
        .flatten()
        .any(|field| contains_ignore_case(field, search))
}

fn or_dash(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

pub fn render_users(users: &[&Person]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                or_dash(&u.username),
                u.display_name(),
                or_dash(&u.email),
                or_dash(&u.role),
            ]
        })
        .collect();
    table(&["Username", "Name", "Email", "Role"], &rows)
}

pub fn render_user(user: &Person) -> String {
    [
        format!("Username: {}", or_dash(&user.username)),
        format!("Name:     {}", user.display_name()),
        format!("Email:    {}", or_dash(&user.email)),
        format!("Role:     {}", or_dash(&user.role)),
        format!("ID:       {}", or_dash(&user.id)),
    ]
    .join("\n")
}
