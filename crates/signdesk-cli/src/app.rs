//! Command handling for the SignDesk CLI.
//!
//! `App` owns the configuration, the API client, the account flows and the
//! router. Every page is reached through the router, and every action that
//! changes backend state is first authorized against the page that hosts it
//! in the portal, so a command never bypasses the guard.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use signdesk_core::api::{ApiClient, ApiError};
use signdesk_core::guard::{is_local_path, return_path};
use signdesk_core::models::{
    AdminUserUpdate, NewPurchase, NewTicket, ProfileUpdate, PurchaseStatus, Reply, Role,
    SignupRequest, TicketStatus, ValidationError,
};
use signdesk_core::{Account, AuthorizedSession, Config, GuardPolicy, Navigation, Router};

use crate::ui::pages::purchases::render_catalog;
use crate::ui::routes::{self, build_router, ticket_path, user_path};

pub struct App {
    config: Config,
    api: ApiClient,
    account: Account,
    router: Router,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = config.session_store()?;
        let api = ApiClient::from_config(&config)?;
        let router = build_router(session.clone(), GuardPolicy::from_config(&config), &api);
        let account = Account::new(api.clone(), session);
        Ok(Self {
            config,
            api,
            account,
            router,
        })
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Mount the page at `path` and print the outcome.
    pub async fn open(&self, path: &str) -> Result<()> {
        let navigation = self.router.navigate(path).await;
        println!("{}", describe(&navigation, self.config.unauthorized_path()));
        Ok(())
    }

    pub fn catalog(&self) {
        println!("{}", render_catalog());
        println!("\nOrder with `signdesk purchase create --item <#>[:<qty>]`.");
    }

    /// Called with a failed command's error. A token the backend rejects
    /// ends the local session too.
    pub fn on_error(&self, error: &anyhow::Error) {
        let rejected = error
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_auth_failure);
        if rejected {
            warn!(error = %error, "Backend rejected the session, signing out");
            self.account.logout();
            eprintln!("Your session is no longer valid. Run `signdesk login` to sign in again.");
        }
    }

    fn authorize(&self, path: &str) -> Result<AuthorizedSession> {
        self.router.authorize(path).map_err(|navigation| match navigation {
            Navigation::LoginRequired { .. } => {
                anyhow!(describe(&navigation, self.config.unauthorized_path()))
            }
            Navigation::NotFound { path } => anyhow!("No page at {}", path),
            _ => anyhow!("Your role does not permit this action"),
        })
    }

    fn authorize_admin(&self, path: &str) -> Result<AuthorizedSession> {
        let session = self.authorize(path)?;
        if !session.is_admin() {
            warn!(path = path, "Admin action refused");
            bail!("Only admins can do this");
        }
        Ok(session)
    }

    fn client(&self, session: &AuthorizedSession) -> ApiClient {
        self.api.with_token(session.token.clone())
    }

    // ========================================================================
    // Account
    // ========================================================================

    pub async fn signup(
        &self,
        username: String,
        email: String,
        first_name: String,
        last_name: String,
    ) -> Result<()> {
        if self.account.has_valid_session() {
            println!("Already signed in.");
            return self.open(self.config.dashboard_path()).await;
        }

        let password = prompt_password("Password: ")?;
        if prompt_password("Confirm password: ")? != password {
            bail!("Passwords do not match");
        }

        let request = SignupRequest {
            username,
            email: email.clone(),
            password,
            first_name,
            last_name,
        };
        let response = self.account.signup(&request).await?;
        println!(
            "{}",
            response
                .message
                .unwrap_or_else(|| "Account created.".to_string())
        );
        println!("Enter the code sent to your email with `signdesk verify {} <code>`.", email);
        Ok(())
    }

    pub async fn verify(&self, email: &str, otp: &str) -> Result<()> {
        let response = self.account.verify_email(email, otp).await?;
        println!(
            "{}",
            response
                .message
                .unwrap_or_else(|| "Email verified, you can now log in.".to_string())
        );
        Ok(())
    }

    pub async fn login(&mut self, identifier: Option<String>, redirect: Option<String>) -> Result<()> {
        let target = login_target(redirect.as_deref())
            .unwrap_or_else(|| self.config.dashboard_path().to_string());

        if self.account.has_valid_session() {
            println!("Already signed in.");
            return self.open(&target).await;
        }

        let identifier = match identifier {
            Some(identifier) => identifier,
            None => prompt("Username or email", self.config.last_username.as_deref())?,
        };
        if identifier.is_empty() {
            return Err(ValidationError::Empty("Username").into());
        }
        let password = prompt_password("Password: ")?;

        println!("Signing in...");
        let user = self.account.login(&identifier, &password).await?;

        self.config.last_username = Some(identifier);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Signed in as {} ({}).\n", user.full_name(), user.role);
        self.open(&target).await
    }

    pub fn logout(&self) {
        self.account.logout();
        println!("Signed out.");
    }

    pub async fn whoami(&self, refresh: bool) -> Result<()> {
        let session = self.router.session();
        let user = match session.load_user() {
            Some(user) if session.is_valid() => user,
            _ => {
                println!("Not signed in.");
                return Ok(());
            }
        };

        let user = if refresh {
            let authorized = self.authorize(routes::PROFILE)?;
            self.account.refresh_profile(&authorized).await?
        } else {
            user
        };

        println!("{} <{}>", user.full_name(), user.email);
        println!("Username: {}", user.username);
        println!("Role:     {}", user.role);
        if let Some(minutes) = session.minutes_until_expiry() {
            println!("Session expires in {} min", minutes);
        }
        Ok(())
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let session = self.authorize(routes::PROFILE)?;
        let (user, response) = self.account.update_profile(&session, &update).await?;
        println!(
            "{}",
            response
                .message
                .unwrap_or_else(|| "Profile updated.".to_string())
        );
        info!(username = %user.username, "Profile updated");
        Ok(())
    }

    pub async fn delete_profile(&self) -> Result<()> {
        let session = self.authorize(routes::PROFILE)?;
        println!("This permanently deletes your account.");
        let confirm = prompt("Type your username to confirm", None)?;
        self.account.delete_account(&session, &confirm).await?;
        println!("Account deleted.");
        Ok(())
    }

    // ========================================================================
    // Tickets
    // ========================================================================

    pub async fn create_ticket(
        &self,
        title: String,
        purchase_id: String,
        message: String,
        attachments: Vec<PathBuf>,
    ) -> Result<()> {
        let session = self.authorize(routes::TICKETS)?;
        let ticket = NewTicket {
            title,
            purchase_id,
            initial_message: message,
            attachments,
        };
        ticket.validate()?;

        let created = self.client(&session).create_ticket(&ticket).await?;
        info!(ticket = %created.id, "Ticket created");
        println!("Created ticket {}.\n", created.id);
        self.open(&ticket_path(&created.id)).await
    }

    pub async fn reply(&self, ticket_id: &str, message: String, attachments: Vec<PathBuf>) -> Result<()> {
        let path = ticket_path(ticket_id);
        let session = self.authorize(&path)?;
        let reply = Reply {
            content: message,
            attachments,
        };
        reply.validate()?;

        self.client(&session).reply_to_ticket(ticket_id, &reply).await?;
        self.open(&path).await
    }

    /// Assign a ticket to an admin given by id or username.
    pub async fn assign_ticket(&self, ticket_id: &str, admin: &str) -> Result<()> {
        let session = self.authorize_admin(&ticket_path(ticket_id))?;
        let api = self.client(&session);

        let admins = api.fetch_admins().await?;
        let chosen = admins
            .iter()
            .find(|a| {
                a.id.as_deref() == Some(admin)
                    || a.username
                        .as_deref()
                        .is_some_and(|u| u.eq_ignore_ascii_case(admin))
            })
            .ok_or_else(|| {
                let names: Vec<&str> = admins.iter().filter_map(|a| a.username.as_deref()).collect();
                anyhow!("No admin named {:?} (admins: {})", admin, names.join(", "))
            })?;
        let admin_id = chosen
            .id
            .as_deref()
            .context("Admin record has no id")?;

        api.assign_ticket(ticket_id, admin_id).await?;
        println!("Ticket {} assigned to {}.", ticket_id, chosen.display_name());
        Ok(())
    }

    pub async fn set_ticket_status(&self, ticket_id: &str, status: &str) -> Result<()> {
        let session = self.authorize_admin(&ticket_path(ticket_id))?;
        let status: TicketStatus = status.parse()?;
        self.client(&session)
            .update_ticket_status(ticket_id, &status)
            .await?;
        println!("Ticket {} is now {}.", ticket_id, status.label());
        Ok(())
    }

    // ========================================================================
    // Purchases
    // ========================================================================

    pub async fn create_purchase(&self, items: &[String]) -> Result<()> {
        let session = self.authorize(routes::PURCHASES)?;
        let lines = items
            .iter()
            .map(|spec| parse_item_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        let order = NewPurchase::from_catalog(&lines)?;

        let purchase = self.client(&session).create_purchase(&order).await?;
        println!(
            "Order {} placed: {} ({}).",
            purchase.reference(),
            purchase.items_display(),
            crate::utils::format_price(purchase.total())
        );
        Ok(())
    }

    pub async fn set_purchase_status(&self, purchase_id: &str, status: &str) -> Result<()> {
        let session = self.authorize_admin(routes::PURCHASES)?;
        let status: PurchaseStatus = status.parse()?;
        self.client(&session)
            .update_purchase_status(purchase_id, &status)
            .await?;
        println!("Purchase {} is now {}.", purchase_id, status);
        Ok(())
    }

    // ========================================================================
    // Users (admin)
    // ========================================================================

    pub async fn update_user(
        &self,
        username: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        role: Option<String>,
    ) -> Result<()> {
        let session = self.authorize(&user_path(username))?;
        let update = AdminUserUpdate {
            first_name,
            last_name,
            role: role.map(|r| r.parse::<Role>()).transpose()?,
        };
        if update == AdminUserUpdate::default() {
            return Err(ValidationError::Empty("User update").into());
        }

        let api = self.client(&session);
        let user = api.fetch_user(username).await?;
        let id = user.id.as_deref().context("User record has no id")?;
        api.update_user(id, &update).await?;
        println!("Updated {}.", username);
        Ok(())
    }

    pub async fn delete_user(&self, username: &str) -> Result<()> {
        let session = self.authorize(&user_path(username))?;
        let confirm = prompt(&format!("Type {} to confirm deletion", username), None)?;
        if confirm != username {
            return Err(ValidationError::ConfirmationMismatch.into());
        }

        let api = self.client(&session);
        let user = api.fetch_user(username).await?;
        let id = user.id.as_deref().context("User record has no id")?;
        api.delete_user(id).await?;
        info!(username = username, "User deleted");
        println!("Deleted {}.", username);
        Ok(())
    }
}

/// Text for a navigation outcome.
pub fn describe(navigation: &Navigation, unauthorized_path: &str) -> String {
    match navigation {
        Navigation::Page { title, body, .. } => format!("== {} ==\n\n{}", title, body),
        Navigation::LoginRequired { redirect } => match return_path(redirect) {
            Some(path) => format!("Not signed in. Run `signdesk login --redirect '{}'`.", path),
            None => "Not signed in. Run `signdesk login`.".to_string(),
        },
        Navigation::NotFound { path } => format!("No page at {}", path),
        Navigation::External { path } if path == unauthorized_path => {
            "You are not authorized to view this page.".to_string()
        }
        Navigation::External { path } => format!("Redirected to {}", path),
    }
}

/// Where to go after login. Accepts a local path or a full login URL
/// carrying a `redirect` parameter.
pub fn login_target(redirect: Option<&str>) -> Option<String> {
    let redirect = redirect?.trim();
    if redirect.contains("?redirect=") || redirect.contains("&redirect=") {
        return return_path(redirect);
    }
    is_local_path(redirect).then(|| redirect.to_string())
}

/// Parse `<catalog #>[:<qty>]`, e.g. `3` or `3:2`.
pub fn parse_item_spec(spec: &str) -> Result<(u32, u32)> {
    let (id, quantity) = spec.split_once([':', 'x']).unwrap_or((spec, "1"));
    let id: u32 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid catalog number in {:?}", spec))?;
    let quantity: u32 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in {:?}", spec))?;
    if quantity == 0 {
        bail!("Quantity must be at least 1 in {:?}", spec);
    }
    Ok((id, quantity))
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(match default {
        Some(default) if input.is_empty() => default.to_string(),
        _ => input.to_string(),
    })
}

fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_spec() {
        assert_eq!(parse_item_spec("3").unwrap(), (3, 1));
        assert_eq!(parse_item_spec("3:2").unwrap(), (3, 2));
        assert_eq!(parse_item_spec("4x10").unwrap(), (4, 10));
        assert!(parse_item_spec("3:0").is_err());
        assert!(parse_item_spec("exit").is_err());
    }

    #[test]
    fn test_login_target() {
        assert_eq!(login_target(None), None);
        assert_eq!(
            login_target(Some("/dashboard/users")),
            Some("/dashboard/users".to_string())
        );
        assert_eq!(
            login_target(Some("/auth/login?redirect=%2Fdashboard%2Ftickets%2F7")),
            Some("/dashboard/tickets/7".to_string())
        );
        assert_eq!(login_target(Some("https://evil.example.com")), None);
        assert_eq!(login_target(Some("//evil.example.com")), None);
    }

    #[test]
    fn test_describe_navigation() {
        let login = Navigation::LoginRequired {
            redirect: "/auth/login?redirect=%2Fprofile".to_string(),
        };
        assert_eq!(
            describe(&login, "/unauthorized"),
            "Not signed in. Run `signdesk login --redirect '/profile'`."
        );

        let forbidden = Navigation::External {
            path: "/unauthorized".to_string(),
        };
        assert_eq!(
            describe(&forbidden, "/unauthorized"),
            "You are not authorized to view this page."
        );

        let page = Navigation::Page {
            path: "/dashboard".to_string(),
            title: "Dashboard".to_string(),
            body: "Welcome".to_string(),
        };
        assert_eq!(describe(&page, "/unauthorized"), "== Dashboard ==\n\nWelcome");
    }
}
