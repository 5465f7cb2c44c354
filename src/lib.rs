//! Storefront Orders
//!
//! Order lifecycle service for a self-hosted storefront.
//!
//! ## Features
//! - Checkout with idempotent order placement
//! - Hosted payment sessions and webhook reconciliation
//! - Order status machine with optimistic concurrency
//! - Catalog, categories and wishlist
//! - Admin back-office behind a single role guard

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod payment;
pub mod publisher;
pub mod services;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
