pub mod dashboard;
pub mod profile;
pub mod purchases;
pub mod tickets;
pub mod users;

pub use dashboard::DashboardPage;
pub use profile::ProfilePage;
pub use purchases::PurchasesPage;
pub use tickets::{AssignedTicketsPage, TicketDetailPage, TicketsPage};
pub use users::{UserDetailPage, UsersPage};
