//! Application services: each operation loads aggregates through the
//! store, applies domain rules, persists and publishes resulting events.

pub mod accounts;
pub mod catalog;
pub mod orders;
pub mod wishlist;
