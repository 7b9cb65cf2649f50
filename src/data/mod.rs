//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite credential store
//! - Byte-value cache with TTL (vendor link bridge)

mod cache;
mod database;
mod models;

pub use cache::{Cacher, MemoryCache};
pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
