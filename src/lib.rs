//! Golosbot - Telegram bot and REST backend for running voting campaigns
//!
//! # Module Structure
//!
//! - `core`: errors, logging, domain types
//! - `config`: environment-driven configuration
//! - `storage`: SQLite pool, migrations, and queries
//! - `voting`: winner selection and winner transfer
//! - `web`: axum REST API (`golosbot serve`)
//! - `telegram`: bot commands, dialogs, and callbacks (`golosbot bot`)

pub mod cli;
pub mod config;
pub mod core;
pub mod storage;
pub mod telegram;
pub mod voting;
pub mod web;

// Re-export commonly used types for convenience
pub use crate::core::{init_logger, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, setup_bot_commands, VotingApi};
