use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot and the voting API server

/// Path to the SQLite database file
/// Read from DATABASE_PATH environment variable, defaults to "voting.sqlite"
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "voting.sqlite".to_string()));

/// Path to the log file
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "golosbot.log".to_string()));

/// Port the voting API server listens on
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000)
});

/// Base URL of the voting API, as seen from the bot process
pub static API_BASE_URL: Lazy<String> =
    Lazy::new(|| env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()));

/// Bearer token required by admin-mutating API endpoints.
/// Unset or empty disables the check (local development).
pub static API_AUTH_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| env::var("API_AUTH_TOKEN").ok().filter(|s| !s.is_empty()));

/// Administrator configuration
pub mod admin {
    use super::{env, Lazy};

    /// Telegram IDs allowed to run admin commands.
    /// Read from ADMIN_IDS as a comma-separated list.
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    });

    /// Проверяет, является ли пользователь администратором бота.
    pub fn is_admin(user_id: i64) -> bool {
        ADMIN_IDS.contains(&user_id)
    }
}

/// Network timeouts
pub mod network {
    use super::Duration;

    /// Timeout for GET requests to the voting API (in seconds)
    pub const GET_TIMEOUT_SECS: u64 = 8;

    /// Timeout for POST requests to the voting API (in seconds)
    pub const POST_TIMEOUT_SECS: u64 = 10;

    /// Timeout for Telegram Bot API requests (in seconds)
    pub const TELEGRAM_TIMEOUT_SECS: u64 = 30;

    pub fn get_timeout() -> Duration {
        Duration::from_secs(GET_TIMEOUT_SECS)
    }

    pub fn post_timeout() -> Duration {
        Duration::from_secs(POST_TIMEOUT_SECS)
    }

    pub fn telegram_timeout() -> Duration {
        Duration::from_secs(TELEGRAM_TIMEOUT_SECS)
    }
}

/// Dialog state configuration
pub mod dialog {
    use super::Duration;

    /// How long an abandoned dialog survives before it is dropped (in seconds)
    pub const TTL_SECS: u64 = 900;

    /// How often expired dialogs are swept (in seconds)
    pub const CLEANUP_INTERVAL_SECS: u64 = 60;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }

    pub fn cleanup_interval() -> Duration {
        Duration::from_secs(CLEANUP_INTERVAL_SECS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Base for exponential backoff between dispatcher retries
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_match_contract() {
        assert_eq!(network::get_timeout(), Duration::from_secs(8));
        assert_eq!(network::post_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_dialog_ttl_longer_than_cleanup_interval() {
        assert!(dialog::ttl() > dialog::cleanup_interval());
    }
}
