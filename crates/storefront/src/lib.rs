//! ZenRo storefront library.
//!
//! Hosts the cart synchronization engine and the JSON API that drives it.
//! The binary in `main.rs` only wires configuration, telemetry and the
//! server around what is defined here, so the integration tests and the CLI
//! use the same code paths.
//!
//! # Modules
//!
//! - [`cart`] - Cart engine: mutations, debounced persistence, hydration
//! - [`stores`] - Local mirror, remote cart store and order store backends
//! - [`identity`] - Identity provider contract
//! - [`registry`] - One engine per visitor
//! - [`checkout`] - Order placement
//! - [`routes`] / [`middleware`] - HTTP surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod state;
pub mod stores;
