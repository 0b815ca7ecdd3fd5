//! Ticket list, assigned-ticket list and ticket detail pages.

use anyhow::Result;
use async_trait::async_trait;

use signdesk_core::api::ApiClient;
use signdesk_core::models::{Person, Ticket, TicketStatus};
use signdesk_core::{AuthorizedSession, RouteRequest, View};

use crate::utils::{format_optional_date, table, truncate_string};

/// Column width for ticket titles in lists
const TITLE_WIDTH: usize = 40;

/// `/dashboard/tickets`: admins see every ticket, users their own.
///
/// Query parameters: `status` (a status or `all`) and `search` (title text).
pub struct TicketsPage {
    api: ApiClient,
}

impl TicketsPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for TicketsPage {
    fn title(&self) -> &str {
        "Support Tickets"
    }

    async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String> {
        let api = self.api.with_token(session.token.clone());
        let tickets = if session.is_admin() {
            api.fetch_all_tickets().await?
        } else {
            api.fetch_my_tickets().await?
        };

        let status = request.query("status").and_then(status_filter);
        let search = request.query("search").unwrap_or_default();
        let shown = filter_tickets(&tickets, status.as_ref(), search);
        Ok(render_ticket_list(&shown, tickets.len()))
    }
}

/// `/dashboard/tickets/assigned`: tickets assigned to the signed-in admin.
pub struct AssignedTicketsPage {
    api: ApiClient,
}

impl AssignedTicketsPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for AssignedTicketsPage {
    fn title(&self) -> &str {
        "Assigned Tickets"
    }

    async fn render(&self, session: &AuthorizedSession, _request: &RouteRequest) -> Result<String> {
        let tickets = self
            .api
            .with_token(session.token.clone())
            .fetch_assigned_tickets()
            .await?;
        let shown: Vec<&Ticket> = tickets.iter().collect();
        Ok(render_ticket_list(&shown, tickets.len()))
    }
}

/// `/dashboard/tickets/:id`: the conversation thread. Admins also get the
/// admin roster for assignment.
pub struct TicketDetailPage {
    api: ApiClient,
}

impl TicketDetailPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for TicketDetailPage {
    fn title(&self) -> &str {
        "Ticket"
    }

    async fn render(&self, session: &AuthorizedSession, request: &RouteRequest) -> Result<String> {
        let id = request.param("id").unwrap_or_default();
        let api = self.api.with_token(session.token.clone());

        if !session.is_admin() {
            let ticket = api.fetch_ticket(id).await?;
            return Ok(render_ticket_detail(&ticket, None));
        }

        let (ticket, admins) = tokio::join!(api.fetch_ticket(id), api.fetch_admins());
        let ticket = ticket?;
        // The thread is still useful without the roster
        let admins = match admins {
            Ok(admins) => Some(admins),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load admin list");
                None
            }
        };
        Ok(render_ticket_detail(&ticket, admins.as_deref()))
    }
}

/// Parse the `status` query value. `all` and unknown values disable the
/// filter; `completed` selects legacy finished tickets.
pub fn status_filter(raw: &str) -> Option<TicketStatus> {
    let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "" | "all" => None,
        "completed" => Some(TicketStatus::Finished),
        _ => match TicketStatus::from(normalized) {
            TicketStatus::Other(_) => None,
            status => Some(status),
        },
    }
}

pub fn filter_tickets<'a>(
    tickets: &'a [Ticket],
    status: Option<&TicketStatus>,
    search: &str,
) -> Vec<&'a Ticket> {
    tickets
        .iter()
        .filter(|t| status.map_or(true, |s| &t.status == s))
        .filter(|t| t.matches_search(search.trim()))
        .collect()
}

pub fn render_ticket_list(tickets: &[&Ticket], total: usize) -> String {
    if tickets.is_empty() {
        return if total == 0 {
            "No tickets yet.".to_string()
        } else {
            format!("No tickets match the current filter ({} hidden).", total)
        };
    }

    let rows: Vec<Vec<String>> = tickets
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                truncate_string(&t.title, TITLE_WIDTH),
                t.status.label().to_string(),
                t.purchase
                    .as_ref()
                    .map(|p| p.reference().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                t.assigned_display(),
                format_optional_date(t.updated_at.as_deref().or(t.created_at.as_deref())),
            ]
        })
        .collect();

    format!(
        "{}\n\n{} of {} tickets",
        table(&["ID", "Title", "Status", "Purchase", "Assigned", "Updated"], &rows),
        tickets.len(),
        total
    )
}

pub fn render_ticket_detail(ticket: &Ticket, admins: Option<&[Person]>) -> String {
    let mut out = vec![
        ticket.title.clone(),
        format!("Status:   {}", ticket.status.label()),
        format!("Assigned: {}", ticket.assigned_display()),
    ];
    if let Some(creator) = &ticket.creator {
        out.push(format!("Opened by {}", creator.display_name()));
    }
    if let Some(purchase) = &ticket.purchase {
        out.push(format!("Purchase: {}", purchase.reference()));
    }
    out.push(format!("Created:  {}", format_optional_date(ticket.created_at.as_deref())));

    out.push(String::new());
    if ticket.messages.is_empty() {
        out.push("No messages.".to_string());
    }
    for message in &ticket.messages {
        let sender = message
            .sender
            .as_ref()
            .map(|s| s.display_name())
            .unwrap_or_else(|| "Unknown".to_string());
        out.push(format!(
            "[{}] {}",
            format_optional_date(message.created_at.as_deref()),
            sender
        ));
        for line in message.content.lines() {
            out.push(format!("    {}", line));
        }
        for attachment in &message.attachments {
            out.push(format!("    attachment: {} <{}>", attachment.filename, attachment.url));
        }
    }

    if let Some(admins) = admins {
        out.push(String::new());
        let names: Vec<String> = admins
            .iter()
            .filter_map(|a| a.username.clone())
            .collect();
        out.push(format!("Admins: {}", names.join(", ")));
        let statuses: Vec<&str> = TicketStatus::SETTABLE.iter().map(|s| s.as_str()).collect();
        out.push(format!("Statuses: {}", statuses.join(", ")));
    }

    out.join("\n")
}
