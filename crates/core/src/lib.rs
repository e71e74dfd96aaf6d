//! ZenRo Core - Shared domain types for the storefront.
//!
//! This crate provides the types used across all ZenRo components:
//! - `storefront` - Cart synchronization engine and JSON API
//! - `cli` - Command-line tools for migrations and cart inspection
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows the cart
//! rules to be tested without any runtime.
//!
//! # Modules
//!
//! - [`types`] - Ids, money, email, cart lines, sessions, checkout and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
