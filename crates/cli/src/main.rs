//! Tradedesk CLI - login and account tools.
//!
//! # Usage
//!
//! ```bash
//! # Log in against the default ERP tenant
//! td-cli login -e buyer@acme.example --password "$TRADEDESK_PASSWORD"
//!
//! # Log in against a specific company tenant
//! td-cli login -e buyer@acme.example --url https://acme.erp.example
//!
//! # Show the stored session
//! td-cli whoami
//!
//! # List recent quotations
//! td-cli quotations --page 1
//!
//! # Show the account statement
//! td-cli statement
//!
//! # End the session
//! td-cli logout
//! ```
//!
//! The session is written to `TRADEDESK_STATE_DIR`, the same directory the
//! storefront server reads.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use url::Url;

mod commands;

#[derive(Parser)]
#[command(name = "td-cli")]
#[command(author, version, about = "Tradedesk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the ERP and store the session
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(long, env = "TRADEDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Company tenant URL (overrides `ERP_BASE_URL`)
        #[arg(short, long)]
        url: Option<Url>,
    },
    /// Forget the stored session and active cart
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List the user's quotations
    Quotations {
        /// Page number (starts at 1)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Show the account statement
    Statement {
        /// Page number (starts at 1)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
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
    match cli.command {
        Commands::Login {
            email,
            password,
            url,
        } => commands::session::login(&email, password, url).await?,
        Commands::Logout => commands::session::logout()?,
        Commands::Whoami => commands::session::whoami()?,
        Commands::Quotations { page } => commands::account::quotations(page).await?,
        Commands::Statement { page } => commands::account::statement(page).await?,
    }
    Ok(())
}
