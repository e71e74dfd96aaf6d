//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! zenro-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (or `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/`. The
//! session table is created by `tower-sessions-sqlx-store`.

use super::{CliError, connect};

/// Run storefront database migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    zenro_storefront::db::migrate(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
