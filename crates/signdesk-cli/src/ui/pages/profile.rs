use anyhow::Result;
use async_trait::async_trait;

use signdesk_core::api::ApiClient;
use signdesk_core::models::UserProfile;
use signdesk_core::{AuthorizedSession, RouteRequest, View};

/// `/profile`: the account as the backend currently has it.
pub struct ProfilePage {
    api: ApiClient,
}

impl ProfilePage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for ProfilePage {
    fn title(&self) -> &str {
        "Profile"
    }

    async fn render(&self, session: &AuthorizedSession, _request: &RouteRequest) -> Result<String> {
        let profile = self
            .api
            .with_token(session.token.clone())
            .fetch_profile()
            .await?;
        Ok(render_profile(&profile))
    }
}

pub fn render_profile(profile: &UserProfile) -> String {
    [
        format!("Username:   {}", profile.username),
        format!("Email:      {}", profile.email),
        format!("First name: {}", profile.first_name),
        format!("Last name:  {}", profile.last_name),
        format!("Role:       {}", profile.role),
        String::new(),
        "Edit with `signdesk profile update`, delete with `signdesk profile delete`.".to_string(),
    ]
    .join("\n")
}
