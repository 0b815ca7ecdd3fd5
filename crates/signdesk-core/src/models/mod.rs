//! Data models for SignDesk entities.
//!
//! This module contains the data structures exchanged with the support
//! backend:
//!
//! - `UserProfile`, `Role`: the signed-in account and its privilege level
//! - `Ticket`, `TicketMessage`, `Attachment`: support tickets and their threads
//! - `Purchase`, `PurchaseItem`: purchase records tied to tickets
//! - `CatalogItem`: the fixed sign catalog offered for purchase
//!
//! Backend records are parsed leniently: unknown fields are ignored and most
//! fields are optional, so a view keeps rendering when the backend adds data.

pub mod catalog;
pub mod purchase;
pub mod ticket;
pub mod user;

use thiserror::Error;

pub use catalog::{CatalogItem, CATALOG};
pub use purchase::{NewPurchase, NewPurchaseItem, Purchase, PurchaseItem, PurchaseStatus};
pub use ticket::{
    Attachment, NewTicket, Person, PersonRef, PurchaseRef, Reply, Ticket, TicketMessage,
    TicketStatus, MAX_ATTACHMENTS,
};
pub use user::{AdminUserUpdate, ProfileUpdate, Role, SignupRequest, UserProfile};

/// Client-side input problems caught before a request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown role: {0:?}")]
    UnknownRole(String),

    #[error("Unknown ticket status: {0:?}")]
    UnknownTicketStatus(String),

    #[error("Unknown purchase status: {0:?}")]
    UnknownPurchaseStatus(String),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("Attachment limit is {limit} items, got {count}")]
    TooManyAttachments { limit: usize, count: usize },

    #[error("Attachment not found: {0}")]
    MissingAttachment(String),

    #[error("Unknown catalog item: {0}")]
    UnknownCatalogItem(u32),

    #[error("Username does not match, deletion cancelled")]
    ConfirmationMismatch,
}
