use anyhow::{bail, Result};
use tracing::{info, warn};

use super::{token, SessionStore};
use crate::api::{ApiClient, MessageResponse};
use crate::guard::AuthorizedSession;
use crate::models::{ProfileUpdate, SignupRequest, UserProfile, ValidationError};

/// The flows that write the session: login, profile edits, logout and
/// account deletion.
pub struct Account {
    api: ApiClient,
    session: SessionStore,
}

impl Account {
    pub fn new(api: ApiClient, session: SessionStore) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Signup and login are skipped when this is true.
    pub fn has_valid_session(&self) -> bool {
        self.session.is_valid()
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse> {
        let response = self.api.signup(request).await?;
        info!(username = %request.username, "Signup accepted, awaiting email verification");
        Ok(response)
    }

    pub async fn verify_email(&self, email: &str, otp: &str) -> Result<MessageResponse> {
        if otp.trim().is_empty() {
            return Err(ValidationError::Empty("Verification code").into());
        }
        self.api.verify_email(email, otp.trim()).await
    }

    /// Authenticate and persist the token and profile.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<UserProfile> {
        let response = self.api.login(identifier, password).await?;

        if token::is_expired(Some(&response.token)) {
            warn!("Login succeeded but the issued token is unusable");
            bail!("The server issued a session token that is malformed or already expired");
        }

        self.store_login(&response.token, &response.user)?;
        info!(username = %response.user.username, role = %response.user.role, "Logged in");
        Ok(response.user)
    }

    /// Write both session slots or neither.
    fn store_login(&self, token: &str, user: &UserProfile) -> Result<()> {
        let saved = self
            .session
            .save_user(user)
            .and_then(|()| self.session.save_token(token));
        if let Err(e) = saved {
            warn!(error = %e, "Failed to persist login, clearing partial session");
            self.session.clear();
            return Err(e);
        }
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("Logged out");
    }

    /// Re-read the profile from the backend and store it.
    pub async fn refresh_profile(&self, session: &AuthorizedSession) -> Result<UserProfile> {
        let profile = self
            .api
            .with_token(session.token.clone())
            .fetch_profile()
            .await?;
        self.session.save_user(&profile)?;
        Ok(profile)
    }

    /// Send a profile edit and merge the accepted fields into the stored
    /// profile.
    pub async fn update_profile(
        &self,
        session: &AuthorizedSession,
        update: &ProfileUpdate,
    ) -> Result<(UserProfile, MessageResponse)> {
        if update.is_empty() {
            return Err(ValidationError::Empty("Profile update").into());
        }
        let response = self
            .api
            .with_token(session.token.clone())
            .update_profile(update)
            .await?;

        let mut user = session.user.clone();
        user.apply_update(update);
        self.session.save_user(&user)?;
        Ok((user, response))
    }

    /// Delete the signed-in account. `confirm_username` must repeat the
    /// account's username.
    pub async fn delete_account(&self, session: &AuthorizedSession, confirm_username: &str) -> Result<()> {
        if confirm_username != session.user.username {
            return Err(ValidationError::ConfirmationMismatch.into());
        }
        self.api
            .with_token(session.token.clone())
            .delete_profile()
            .await?;
        self.logout();
        Ok(())
    }
}
