pub mod cache;
pub mod categories;
pub mod config;
pub mod error;
pub mod error_pages;
pub mod forms;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod serde_utils;
pub mod server;
pub mod services;
pub mod session;
pub mod state;
pub mod theme;

/// Application version from Cargo.toml (single source of truth)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
