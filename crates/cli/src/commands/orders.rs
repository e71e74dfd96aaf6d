//! Order history listing.
//!
//! # Usage
//!
//! ```bash
//! zenro-cli orders list <user-id>
//! ```

use zenro_core::{OrderOwner, UserId};
use zenro_storefront::stores::{OrderStore, PgOrderStore};

use super::{CliError, connect};

/// Print a customer's orders, newest first.
pub async fn list(user_id: &str) -> Result<(), CliError> {
    let store = PgOrderStore::new(connect().await?);
    let owner = OrderOwner::User(UserId::new(user_id));
    let orders = store.list_for(&owner).await?;

    #[allow(clippy::print_stdout)]
    {
        if orders.is_empty() {
            println!("No orders for {user_id}");
        }
        for order in &orders {
            println!(
                "{}  {}  {:<10}  {:>3} line(s)  {}",
                order.id,
                order.placed_at.format("%Y-%m-%d %H:%M"),
                order.status.as_str(),
                order.lines.len(),
                order.totals.total.display(zenro_core::CurrencyCode::NGN),
            );
        }
    }
    Ok(())
}
