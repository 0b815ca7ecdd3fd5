use signdesk_core::api::ApiClient;
use signdesk_core::models::Role;
use signdesk_core::{Guard, GuardPolicy, Router, SessionStore};

use super::pages::{
    AssignedTicketsPage, DashboardPage, ProfilePage, PurchasesPage, TicketDetailPage, TicketsPage,
    UserDetailPage, UsersPage,
};

pub const DASHBOARD: &str = "/dashboard";
pub const TICKETS: &str = "/dashboard/tickets";
pub const PURCHASES: &str = "/dashboard/purchases";
pub const USERS: &str = "/dashboard/users";
pub const PROFILE: &str = "/profile";

const BOTH: &[Role] = &[Role::Admin, Role::User];
const ADMIN: &[Role] = &[Role::Admin];

/// Every protected page and the roles allowed to open it.
pub fn build_router(session: SessionStore, policy: GuardPolicy, api: &ApiClient) -> Router {
    Router::new(session, policy)
        .route(DASHBOARD, Guard::protect(DashboardPage, &[]))
        .route(TICKETS, Guard::protect(TicketsPage::new(api.clone()), BOTH))
        .route(
            "/dashboard/tickets/assigned",
            Guard::protect(AssignedTicketsPage::new(api.clone()), ADMIN),
        )
        .route(
            "/dashboard/tickets/:id",
            Guard::protect(TicketDetailPage::new(api.clone()), BOTH),
        )
        .route(PURCHASES, Guard::protect(PurchasesPage::new(api.clone()), BOTH))
        .route(USERS, Guard::protect(UsersPage::new(api.clone()), ADMIN))
        .route(
            "/dashboard/users/:username",
            Guard::protect(UserDetailPage::new(api.clone()), ADMIN),
        )
        .route(PROFILE, Guard::protect(ProfilePage::new(api.clone()), &[]))
}

pub fn ticket_path(id: &str) -> String {
    format!("{}/{}", TICKETS, urlencoding::encode(id))
}

pub fn user_path(username: &str) -> String {
    format!("{}/{}", USERS, urlencoding::encode(username))
}
