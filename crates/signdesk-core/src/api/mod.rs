//! REST API client module for the SignDesk support backend.
//!
//! This module provides the `ApiClient` for the signup, login, profile,
//! ticket, purchase and admin endpoints. Every call after login carries the
//! session token as a bearer credential.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginResponse, MessageResponse};
pub use error::ApiError;
