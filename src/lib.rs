// src/lib.rs

pub mod broker;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stores;
pub mod utils;
pub mod wide_column;

// Re-export specific items for convenience if needed
pub use routes::create_router;
