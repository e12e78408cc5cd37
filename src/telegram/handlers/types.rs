//! Handler types and dependencies

use std::sync::Arc;

use crate::telegram::api_client::VotingApi;
use crate::telegram::dialog::DialogStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub api: Arc<VotingApi>,
    pub dialogs: Arc<DialogStore>,
}

impl HandlerDeps {
    pub fn new(api: Arc<VotingApi>, dialogs: Arc<DialogStore>) -> Self {
        Self { api, dialogs }
    }
}
