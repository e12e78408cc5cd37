//! Telegram bot integration and handlers

pub mod api_client;
pub mod bot;
pub mod callback;
pub mod dialog;
pub mod handlers;

// Re-exports for convenience
pub use api_client::VotingApi;
pub use bot::{create_bot, setup_bot_commands, Command};
pub use callback::CallbackAction;
pub use dialog::{DialogState, DialogStore};
