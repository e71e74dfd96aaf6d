//! Placed orders and their lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::CartLine;
use super::checkout::{CheckoutTotals, PaymentMethod};
use super::email::Email;
use super::id::{OrderId, UserId, VisitorId};

/// Order fulfillment status as tracked by the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Who an order belongs to.
///
/// Signed-in customers see their orders from any browser; guest orders are
/// tied to the visitor that placed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum OrderOwner {
    User(UserId),
    Visitor(VisitorId),
}

/// A placed order with its frozen lines and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub owner: OrderOwner,
    pub placed_at: DateTime<Utc>,
    pub full_name: String,
    pub email: Email,
    pub lines: Vec<CartLine>,
    pub totals: CheckoutTotals,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
}
