//! Core types for the ZenRo storefront.
//!
//! This module provides type-safe wrappers for the storefront's domain concepts.

pub mod cart;
pub mod checkout;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod session;

pub use cart::{Cart, CartLine, LineKey, ProductImages, ProductSnapshot, normalize_requested};
pub use checkout::{CheckoutForm, CheckoutTotals, FieldError, FieldProblem, PaymentMethod};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{OrderOwner, OrderRecord, OrderStatus};
pub use price::{CurrencyCode, Money};
pub use session::{Identity, Session, SlotKey};
