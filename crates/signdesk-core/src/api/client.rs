//! API client for communicating with the SignDesk REST backend.
//!
//! This module provides the `ApiClient` struct for the unauthenticated account
//! endpoints (signup, email verification, login) and the bearer-authenticated
//! profile, ticket, purchase and admin endpoints.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    AdminUserUpdate, NewPurchase, NewTicket, Person, ProfileUpdate, Purchase, PurchaseStatus,
    Reply, SignupRequest, Ticket, TicketStatus, UserProfile,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Attachment uploads share this limit, so it errs on the generous side.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

// ============================================================================
// Response shapes
// ============================================================================

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(alias = "details")]
    pub user: UserProfile,
}

/// Acknowledgement returned by signup, verification and update routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// List endpoints answer either with a bare array or with the array under a
/// resource-named key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "tickets", alias = "purchases", alias = "users", alias = "admins")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

/// Single-resource endpoints answer either with the bare record or with it
/// under the resource's own key. Only that key is unwrapped: a bare ticket
/// embeds a populated `purchase`, and a bare purchase a populated `user`.
fn unwrap_resource<T: DeserializeOwned>(value: Value, key: &str) -> Result<T> {
    let value = match value {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => {
            map.remove(key).unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(value).with_context(|| format!("Unexpected shape for {} response", key))
}

/// API client for the support backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
    auth_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(api_url: &str, auth_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url(), &config.auth_url())
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            api_url: self.api_url.clone(),
            auth_url: self.auth_url.clone(),
            token: Some(token),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn auth(&self, path: &str) -> String {
        format!("{}/{}", self.auth_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let token = self.token.as_ref().ok_or(ApiError::MissingToken)?;
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should
    /// retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send an authenticated request, backing off on 429.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(self.auth_headers()?);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get_list<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        Ok(self.get::<Listing<T>>(url).await?.into_vec())
    }

    async fn get_one<T: DeserializeOwned>(&self, url: &str, key: &str) -> Result<T> {
        unwrap_resource(self.get::<Value>(url).await?, key)
    }

    /// Send a mutation whose response body is not needed.
    async fn send_discard<B: Serialize>(&self, method: Method, url: &str, body: Option<&B>) -> Result<()> {
        self.send(method, url, body).await?;
        Ok(())
    }

    /// Unauthenticated POST against the account endpoints.
    async fn post_public<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send POST request to {}", url))?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post_multipart<T: DeserializeOwned>(&self, url: &str, form: Form, key: &str) -> Result<T> {
        let response = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send upload to {}", url))?;
        let response = Self::check_response(response).await?;
        let value = response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;
        unwrap_resource(value, key)
    }

    async fn attach_files(mut form: Form, paths: &[std::path::PathBuf]) -> Result<Form> {
        for path in paths {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let file_name = file_name_of(path);
            debug!(file = %file_name, size = bytes.len(), "Attaching file");
            form = form.part("attachments", Part::bytes(bytes).file_name(file_name));
        }
        Ok(form)
    }

    // ===== Account =====

    pub async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse> {
        self.post_public(&self.auth("signup"), request).await
    }

    pub async fn verify_email(&self, email: &str, otp: &str) -> Result<MessageResponse> {
        let body = serde_json::json!({ "email": email, "otp": otp });
        self.post_public(&self.auth("verify-email"), &body).await
    }

    /// Log in with either an email address or a username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        self.post_public(&self.auth("login"), &login_body(identifier, password))
            .await
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        self.get_one(&self.api("auth/profile"), "user").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<MessageResponse> {
        let response = self
            .send(Method::PUT, &self.api("auth/profile"), Some(update))
            .await?;
        Ok(response.json().await.unwrap_or_default())
    }

    pub async fn delete_profile(&self) -> Result<()> {
        self.send_discard::<()>(Method::DELETE, &self.api("auth/profile"), None)
            .await
    }

    // ===== Tickets =====

    pub async fn fetch_my_tickets(&self) -> Result<Vec<Ticket>> {
        self.get_list(&self.api("tickets/my-tickets")).await
    }

    pub async fn fetch_all_tickets(&self) -> Result<Vec<Ticket>> {
        self.get_list(&self.api("admin/tickets")).await
    }

    pub async fn fetch_assigned_tickets(&self) -> Result<Vec<Ticket>> {
        self.get_list(&self.api("admin/tickets/assigned")).await
    }

    pub async fn fetch_ticket(&self, ticket_id: &str) -> Result<Ticket> {
        self.get_one(&self.api(&format!("tickets/{}", segment(ticket_id))), "ticket")
            .await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        let form = Form::new()
            .text("title", ticket.title.clone())
            .text("purchaseId", ticket.purchase_id.clone())
            .text("initialMessage", ticket.initial_message.clone());
        let form = Self::attach_files(form, &ticket.attachments).await?;
        self.post_multipart(&self.api("tickets"), form, "ticket").await
    }

    /// Post a message to a ticket thread. The backend answers with the
    /// updated ticket.
    pub async fn reply_to_ticket(&self, ticket_id: &str, reply: &Reply) -> Result<Ticket> {
        let form = Form::new().text("content", reply.content.clone());
        let form = Self::attach_files(form, &reply.attachments).await?;
        let url = self.api(&format!("tickets/{}/messages", segment(ticket_id)));
        self.post_multipart(&url, form, "ticket").await
    }

    pub async fn assign_ticket(&self, ticket_id: &str, admin_id: &str) -> Result<()> {
        let url = self.api(&format!("tickets/{}/assign", segment(ticket_id)));
        let body = serde_json::json!({ "adminId": admin_id });
        self.send_discard(Method::PATCH, &url, Some(&body)).await
    }

    pub async fn update_ticket_status(&self, ticket_id: &str, status: &TicketStatus) -> Result<()> {
        let url = self.api(&format!("tickets/{}/status", segment(ticket_id)));
        let body = serde_json::json!({ "status": status.as_str() });
        self.send_discard(Method::PATCH, &url, Some(&body)).await
    }

    pub async fn fetch_admins(&self) -> Result<Vec<Person>> {
        self.get_list(&self.api("admin/admins")).await
    }

    // ===== Purchases =====

    pub async fn fetch_my_purchases(&self) -> Result<Vec<Purchase>> {
        self.get_list(&self.api("purchases/user")).await
    }

    pub async fn fetch_all_purchases(&self) -> Result<Vec<Purchase>> {
        self.get_list(&self.api("admin/purchases")).await
    }

    pub async fn create_purchase(&self, order: &NewPurchase) -> Result<Purchase> {
        let response = self
            .send(Method::POST, &self.api("purchases"), Some(order))
            .await?;
        let value = response
            .json::<Value>()
            .await
            .context("Failed to parse created purchase")?;
        unwrap_resource(value, "purchase")
    }

    pub async fn update_purchase_status(&self, purchase_id: &str, status: &PurchaseStatus) -> Result<()> {
        let url = self.api(&format!("purchases/{}/status", segment(purchase_id)));
        let body = serde_json::json!({ "status": status.as_str() });
        self.send_discard(Method::PATCH, &url, Some(&body)).await
    }

    // ===== Admin: users =====

    pub async fn fetch_users(&self) -> Result<Vec<Person>> {
        self.get_list(&self.api("admin/users")).await
    }

    pub async fn fetch_user(&self, username: &str) -> Result<Person> {
        self.get_one(&self.api(&format!("admin/users/{}", segment(username))), "user")
            .await
    }

    pub async fn update_user(&self, user_id: &str, update: &AdminUserUpdate) -> Result<()> {
        let url = self.api(&format!("admin/users/{}", segment(user_id)));
        self.send_discard(Method::PUT, &url, Some(update)).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let url = self.api(&format!("admin/users/{}", segment(user_id)));
        self.send_discard::<()>(Method::DELETE, &url, None).await
    }
}

/// Percent-encode a value used as a single path segment.
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

fn login_body(identifier: &str, password: &str) -> serde_json::Value {
    if identifier.contains('@') {
        serde_json::json!({ "email": identifier, "password": password })
    } else {
        serde_json::json!({ "username": identifier, "password": password })
    }
}
