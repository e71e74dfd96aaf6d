//! Remote cart inspection.
//!
//! # Usage
//!
//! ```bash
//! # Print a customer's saved cart as JSON
//! zenro-cli cart show <user-id>
//!
//! # Empty a customer's saved cart
//! zenro-cli cart clear <user-id>
//! ```

use zenro_core::UserId;
use zenro_storefront::stores::{PgCartStore, RemoteCartStore};

use super::{CliError, connect};

/// Print the saved cart document for `user_id`.
pub async fn show(user_id: &str) -> Result<(), CliError> {
    let store = PgCartStore::new(connect().await?);
    let user_id = UserId::new(user_id);

    let document = store.read_once(&user_id).await?;

    #[allow(clippy::print_stdout)]
    {
        match document {
            Some(document) => println!("{}", serde_json::to_string_pretty(&document)?),
            None => println!("No saved cart for {user_id}"),
        }
    }
    Ok(())
}

/// Overwrite the saved cart for `user_id` with an empty one.
///
/// Open storefront sessions for the user receive the change through their
/// subscription.
pub async fn clear(user_id: &str) -> Result<(), CliError> {
    let store = PgCartStore::new(connect().await?);
    let user_id = UserId::new(user_id);

    store.merge_write(&user_id, &[]).await?;
    tracing::info!(%user_id, "Cart cleared");
    Ok(())
}
