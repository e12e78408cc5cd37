//! Core infrastructure: errors, logging, shared domain types

pub mod error;
pub mod logging;
pub mod types;

pub use error::{AppError, AppResult};
pub use logging::init_logger;
