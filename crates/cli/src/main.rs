//! ZenRo CLI - Database migrations and cart inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! zenro-cli migrate
//!
//! # Inspect or empty a customer's saved cart
//! zenro-cli cart show 8f14e45f
//! zenro-cli cart clear 8f14e45f
//!
//! # List a customer's orders
//! zenro-cli orders list 8f14e45f
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "zenro-cli")]
#[command(author, version, about = "ZenRo Wears CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect saved carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Inspect placed orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print a customer's saved cart
    Show {
        /// Customer id as issued by the identity provider
        user_id: String,
    },
    /// Empty a customer's saved cart
    Clear {
        /// Customer id as issued by the identity provider
        user_id: String,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List a customer's orders, newest first
    List {
        /// Customer id as issued by the identity provider
        user_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Cart { action } => match action {
            CartAction::Show { user_id } => commands::cart::show(&user_id).await?,
            CartAction::Clear { user_id } => commands::cart::clear(&user_id).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { user_id } => commands::orders::list(&user_id).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
