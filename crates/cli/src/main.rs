//! Devgad Hapus CLI - role and order management tools.
//!
//! # Usage
//!
//! ```bash
//! # Show a user's role record and profile
//! hapus-cli roles show <uid>
//!
//! # Grant admin to the first operator (no allow-list needed)
//! hapus-cli roles promote <uid>
//!
//! # List the most recent pending orders
//! hapus-cli orders list --status pending --limit 20
//!
//! # Show one order with its messages
//! hapus-cli orders show <order-id>
//! ```
//!
//! # Commands
//!
//! - `roles` - Inspect and change `userRoles/{uid}` records
//! - `orders` - Inspect orders
//!
//! All commands talk to the Firebase database named by
//! `FIREBASE_DATABASE_URL` using `FIREBASE_DATABASE_SECRET`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use hapus_core::{OrderStatus, RoleAction};

mod commands;

#[derive(Parser)]
#[command(name = "hapus-cli")]
#[command(author, version, about = "Devgad Hapus CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage user roles
    Roles {
        #[command(subcommand)]
        action: RoleCommand,
    },
    /// Inspect orders
    Orders {
        #[command(subcommand)]
        action: OrderCommand,
    },
}

#[derive(Subcommand)]
enum RoleCommand {
    /// Show a user's role record and profile
    Show { uid: String },
    /// Grant admin access (also clears suspension)
    Promote { uid: String },
    /// Remove admin access
    Demote { uid: String },
    /// Suspend a user (also removes admin access)
    Suspend { uid: String },
    /// Lift a suspension
    Unsuspend { uid: String },
}

#[derive(Subcommand)]
enum OrderCommand {
    /// List the most recent orders, newest first
    List {
        /// Only orders with this status (`pending`, `confirmed`, `rejected`)
        #[arg(short, long)]
        status: Option<OrderStatus>,

        /// How many recent orders to look at
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one order with its messages
    Show { id: String },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = commands::connect()?;

    match cli.command {
        Commands::Roles { action } => match action {
            RoleCommand::Show { uid } => commands::roles::show(&store, &uid).await?,
            RoleCommand::Promote { uid } => {
                commands::roles::apply(&store, &uid, RoleAction::Promote).await?;
            }
            RoleCommand::Demote { uid } => {
                commands::roles::apply(&store, &uid, RoleAction::Demote).await?;
            }
            RoleCommand::Suspend { uid } => {
                commands::roles::apply(&store, &uid, RoleAction::Suspend).await?;
            }
            RoleCommand::Unsuspend { uid } => {
                commands::roles::apply(&store, &uid, RoleAction::Unsuspend).await?;
            }
        },
        Commands::Orders { action } => match action {
            OrderCommand::List { status, limit } => {
                commands::orders::list(&store, status, limit).await?;
            }
            OrderCommand::Show { id } => commands::orders::show(&store, &id).await?,
        },
    }
    Ok(())
}
