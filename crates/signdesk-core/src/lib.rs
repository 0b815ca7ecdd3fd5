//! Core library for the SignDesk support frontend.
//!
//! Holds everything that does not depend on the terminal: the backend API
//! client, the session store and token codec, the role-gated access guard
//! and the router that mounts guarded views.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod routing;

pub use auth::{Account, SessionStore};
pub use config::Config;
pub use guard::{AuthorizedSession, Guard, GuardPolicy, GuardState, GuardedView, RouteRequest, View};
pub use routing::{Navigation, Router};
