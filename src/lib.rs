// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use api::{BybitClient, Exchange};
pub use config::BotConfig;
pub use models::*;

// Error handling
pub use error::{BotError, Result};
