//! SignDesk - command-line frontend for the sign shop's support portal.
//!
//! Customers browse the sign catalog, place orders and open support tickets;
//! admins work the ticket queue and manage orders and accounts. Pages are
//! rendered as text and every one of them sits behind the role guard.

mod app;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signdesk_core::models::ProfileUpdate;
use signdesk_core::Config;

use app::App;

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "signdesk.log";

#[derive(Parser)]
#[command(name = "signdesk", version, about = "Support and ordering portal for SignDesk customers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account (password is prompted)
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Confirm an email address with the emailed code
    Verify { email: String, code: String },
    /// Sign in and open the dashboard or the given page
    Login {
        /// Username or email
        identifier: Option<String>,
        /// Page to open after signing in
        #[arg(long)]
        redirect: Option<String>,
    },
    Logout,
    /// Show the signed-in account
    Whoami {
        /// Re-read the profile from the server
        #[arg(long)]
        refresh: bool,
    },
    /// Open a page, e.g. /dashboard/tickets?status=open
    Open {
        #[arg(default_value = "/dashboard")]
        path: String,
    },
    /// List the signs available to order
    Catalog,
    #[command(subcommand)]
    Ticket(TicketCommand),
    #[command(subcommand)]
    Purchase(PurchaseCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum TicketCommand {
    /// Open a ticket about a purchase
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        purchase: String,
        #[arg(long, short)]
        message: String,
        /// File to attach (repeatable, at most 5)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Add a message to a ticket
    Reply {
        id: String,
        #[arg(long, short)]
        message: String,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Assign a ticket to an admin (admin only)
    Assign { id: String, admin: String },
    /// Set a ticket's status: open, in_progress, resolved, closed (admin only)
    Status { id: String, status: String },
}

#[derive(Subcommand)]
enum PurchaseCommand {
    /// Order signs from the catalog
    Create {
        /// Catalog number with optional quantity, e.g. 3 or 3:2 (repeatable)
        #[arg(long = "item", required = true)]
        items: Vec<String>,
    },
    /// Set an order's status: pending, completed, cancelled (admin only)
    Status { id: String, status: String },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Edit another account (admin only)
    Update {
        username: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Delete another account (admin only)
    Delete { username: String },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Delete your own account
    Delete,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let _log_guard = init_tracing(config.log_dir.as_ref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(api = %config.api_url(), "SignDesk starting");

    let mut app = App::new(config)?;
    let result = run(&mut app, cli.command).await;
    if let Err(ref e) = result {
        app.on_error(e);
    }
    result
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Signup {
            username,
            email,
            first_name,
            last_name,
        } => app.signup(username, email, first_name, last_name).await,
        Command::Verify { email, code } => app.verify(&email, &code).await,
        Command::Login {
            identifier,
            redirect,
        } => app.login(identifier, redirect).await,
        Command::Logout => {
            app.logout();
            Ok(())
        }
        Command::Whoami { refresh } => app.whoami(refresh).await,
        Command::Open { path } => app.open(&path).await,
        Command::Catalog => {
            app.catalog();
            Ok(())
        }
        Command::Ticket(command) => match command {
            TicketCommand::Create {
                title,
                purchase,
                message,
                attachments,
            } => app.create_ticket(title, purchase, message, attachments).await,
            TicketCommand::Reply {
                id,
                message,
                attachments,
            } => app.reply(&id, message, attachments).await,
            TicketCommand::Assign { id, admin } => app.assign_ticket(&id, &admin).await,
            TicketCommand::Status { id, status } => app.set_ticket_status(&id, &status).await,
        },
        Command::Purchase(command) => match command {
            PurchaseCommand::Create { items } => app.create_purchase(&items).await,
            PurchaseCommand::Status { id, status } => app.set_purchase_status(&id, &status).await,
        },
        Command::User(command) => match command {
            UserCommand::Update {
                username,
                first_name,
                last_name,
                role,
            } => app.update_user(&username, first_name, last_name, role).await,
            UserCommand::Delete { username } => app.delete_user(&username).await,
        },
        Command::Profile(command) => match command {
            ProfileCommand::Update {
                first_name,
                last_name,
                username,
            } => {
                app.update_profile(ProfileUpdate {
                    first_name,
                    last_name,
                    username,
                })
                .await
            }
            ProfileCommand::Delete => app.delete_profile().await,
        },
    }
}
