//! Storefront Cart
//!
//! Cart, checkout and session core for a commemorative-coin storefront.
//!
//! ## Features
//! - Product catalog reads with server-authoritative prices
//! - Anonymous and signed-in carts, merged at sign-in
//! - Atomic cart-to-order checkout
//! - Client cart store with write-then-reread mutations

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod server;
pub mod service;
pub mod store;

pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use server::router;
pub use service::{ServiceError, Storefront};
pub use store::{MemoryStore, PgStore, StoreError, StorefrontStore};
