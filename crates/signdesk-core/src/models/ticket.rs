use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Purchase, ValidationError};

/// Maximum number of files accepted on a new ticket or a reply.
pub const MAX_ATTACHMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    /// Legacy status still present on older tickets.
    Finished,
    Other(String),
}

impl TicketStatus {
    /// Statuses an admin may set from the ticket detail page.
    pub const SETTABLE: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Finished => "finished",
            TicketStatus::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
            TicketStatus::Finished => "Completed",
            TicketStatus::Other(s) => s,
        }
    }
}

impl From<String> for TicketStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "open" => TicketStatus::Open,
            "in_progress" => TicketStatus::InProgress,
            "resolved" => TicketStatus::Resolved,
            "closed" => TicketStatus::Closed,
            "finished" => TicketStatus::Finished,
            _ => TicketStatus::Other(value),
        }
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Parses only the statuses an admin is allowed to set.
impl FromStr for TicketStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let status = TicketStatus::from(normalized);
        if TicketStatus::SETTABLE.contains(&status) {
            Ok(status)
        } else {
            Err(ValidationError::UnknownTicketStatus(s.to_string()))
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user as embedded in ticket and purchase records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Person {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self
                .username
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Reference to a user that the backend may or may not have populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonRef {
    Populated(Person),
    Id(String),
}

impl PersonRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            PersonRef::Populated(p) => p.id.as_deref(),
            PersonRef::Id(id) => Some(id),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            PersonRef::Populated(p) => p.display_name(),
            PersonRef::Id(id) => id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PurchaseRef {
    Populated(Box<Purchase>),
    Id(String),
}

impl PurchaseRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            PurchaseRef::Populated(p) => p.id.as_deref(),
            PurchaseRef::Id(id) => Some(id),
        }
    }

    /// Order number when the purchase is populated, otherwise its id.
    pub fn reference(&self) -> &str {
        match self {
            PurchaseRef::Populated(p) => p.reference(),
            PurchaseRef::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    #[serde(default)]
    pub sender: Option<PersonRef>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub purchase: Option<PurchaseRef>,
    #[serde(default)]
    pub creator: Option<PersonRef>,
    #[serde(rename = "assignedAdmin", default)]
    pub assigned_admin: Option<PersonRef>,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

impl Ticket {
    pub fn assigned_display(&self) -> String {
        self.assigned_admin
            .as_ref()
            .map(|a| a.display_name())
            .unwrap_or_else(|| "Unassigned".to_string())
    }

    /// Case-insensitive title match used by the ticket list search.
    pub fn matches_search(&self, query: &str) -> bool {
        query.is_empty() || self.title.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Files staged for upload with a ticket or a reply.
fn check_attachments(attachments: &[PathBuf]) -> Result<(), ValidationError> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(ValidationError::TooManyAttachments {
            limit: MAX_ATTACHMENTS,
            count: attachments.len(),
        });
    }
    for path in attachments {
        if !path.is_file() {
            return Err(ValidationError::MissingAttachment(path.display().to_string()));
        }
    }
    Ok(())
}

/// A ticket opened against one of the customer's purchases.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub purchase_id: String,
    pub initial_message: String,
    pub attachments: Vec<PathBuf>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("Ticket title"));
        }
        if self.purchase_id.trim().is_empty() {
            return Err(ValidationError::Empty("Purchase"));
        }
        if self.initial_message.trim().is_empty() {
            return Err(ValidationError::Empty("Initial message"));
        }
        check_attachments(&self.attachments)
    }
}

/// A message added to an existing ticket thread.
#[derive(Debug, Clone)]
pub struct Reply {
    pub content: String,
    pub attachments: Vec<PathBuf>,
}

impl Reply {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::Empty("Reply content"));
        }
        check_attachments(&self.attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_populated_ticket() {
        let value = json!({
            "_id": "68277aa7d6331f3f05324bcf",
            "title": "Installation Request for Business Sign",
            "purchase": "68277aa7d6331f3f05324bc7",
            "creator": {"_id": "u1", "username": "bob", "firstName": "Bob", "lastName": "Lee"},
            "assignedAdmin": {"_id": "a1", "username": "root", "firstName": "Ann", "lastName": "Admin"},
            "status": "in_progress",
            "messages": [{
                "sender": "u1",
                "content": "When can you install my business sign?",
                "attachments": [{"filename": "location.jpg", "url": "https://example.com/location.jpg", "_id": "f1"}]
            }],
            "__v": 0
        });

        let ticket: Ticket = serde_json::from_value(value).unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert_eq!(ticket.assigned_display(), "Ann Admin");
        assert_eq!(
            ticket.purchase.as_ref().and_then(|p| p.id()),
            Some("68277aa7d6331f3f05324bc7")
        );
        assert_eq!(ticket.messages[0].sender.as_ref().and_then(|s| s.id()), Some("u1"));
        assert_eq!(ticket.messages[0].attachments[0].filename, "location.jpg");
    }

    #[test]
    fn test_populated_purchase_reference() {
        let ticket: Ticket = serde_json::from_value(json!({
            "_id": "t-77",
            "title": "Faded lettering",
            "status": "open",
            "purchase": {"_id": "p-1", "orderNumber": "ORD-9", "status": "pending", "items": []}
        }))
        .unwrap();
        let purchase = ticket.purchase.as_ref().unwrap();
        assert_eq!(purchase.id(), Some("p-1"));
        assert_eq!(purchase.reference(), "ORD-9");
    }

    #[test]
    fn test_unassigned_ticket() {
        let ticket: Ticket =
            serde_json::from_value(json!({"_id": "t1", "title": "x", "status": "open"})).unwrap();
        assert_eq!(ticket.assigned_display(), "Unassigned");
        assert!(ticket.messages.is_empty());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(TicketStatus::from("finished".to_string()).label(), "Completed");
        assert_eq!(TicketStatus::from("escalated".to_string()).label(), "escalated");
        assert_eq!(TicketStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_status_from_str_only_settable() {
        assert_eq!("in-progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
        assert_eq!("Resolved".parse::<TicketStatus>().unwrap(), TicketStatus::Resolved);
        assert!("finished".parse::<TicketStatus>().is_err());
        assert!("bogus".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let ticket: Ticket = serde_json::from_value(
            json!({"_id": "t1", "title": "LED Sign Design Approval", "status": "open"}),
        )
        .unwrap();
        assert!(ticket.matches_search("led sign"));
        assert!(ticket.matches_search(""));
        assert!(!ticket.matches_search("neon"));
    }

    #[test]
    fn test_reply_validation() {
        let empty = Reply { content: "   ".to_string(), attachments: vec![] };
        assert_eq!(empty.validate(), Err(ValidationError::Empty("Reply content")));

        let too_many = Reply {
            content: "see files".to_string(),
            attachments: (0..6).map(|i| PathBuf::from(format!("f{}.png", i))).collect(),
        };
        assert_eq!(
            too_many.validate(),
            Err(ValidationError::TooManyAttachments { limit: 5, count: 6 })
        );

        let missing = Reply {
            content: "see file".to_string(),
            attachments: vec![PathBuf::from("/definitely/not/here.pdf")],
        };
        assert!(matches!(missing.validate(), Err(ValidationError::MissingAttachment(_))));
    }

    #[test]
    fn test_new_ticket_requires_purchase() {
        let ticket = NewTicket {
            title: "Broken bracket".to_string(),
            purchase_id: String::new(),
            initial_message: "The mounting bracket arrived bent.".to_string(),
            attachments: vec![],
        };
        assert_eq!(ticket.validate(), Err(ValidationError::Empty("Purchase")));
    }
}
