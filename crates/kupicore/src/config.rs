//! Process configuration, read from the environment once at startup.
//!
//! The whole configuration lives in one explicit [`Config`] struct that is
//! constructed in `main` and passed by `Arc` into handlers and the HTTP
//! server. Missing optional values disable the corresponding feature
//! instead of failing startup; only the bot token is checked by the caller.

use std::env;

/// Default HTTP port when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 7777;

/// Default percentage of users assigned to experiment variant A.
pub const DEFAULT_AB_SPLIT_A: f64 = 50.0;

/// Runtime configuration for the bot and its HTTP API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (`BOT_TOKEN`, falling back to `TELOXIDE_TOKEN`).
    /// Empty when unset; the bot cannot run without it.
    pub bot_token: String,

    /// Public URL of the Mini App opened from the /start keyboard
    /// (`WEB_APP_URL`). When unset the /start reply has no button.
    pub web_app_url: Option<String>,

    /// Path the Telegram webhook is mounted on (`TELEGRAM_WEBHOOK_PATH`,
    /// default `/telegram/webhook`).
    pub webhook_path: String,

    /// Shared secret Telegram echoes back in the
    /// `X-Telegram-Bot-Api-Secret-Token` header (`TELEGRAM_WEBHOOK_SECRET`).
    /// When unset the header check is skipped with a warning.
    pub webhook_secret: Option<String>,

    /// Public base URL this process is reachable at (`BOT_WEBHOOK_URL`).
    /// When unset the bot falls back to long polling.
    pub webhook_url: Option<String>,

    /// Whether to call `setWebhook` on startup (`AUTO_SET_WEBHOOK`,
    /// default false; manual setup instructions are logged instead).
    pub auto_set_webhook: bool,

    /// HTTP listen port (`PORT`, default 7777).
    pub port: u16,

    /// Base URL of the backend/collector (`API_BASE_URL`), trailing
    /// slashes stripped. Unset ⇒ analytics and payment relays are disabled.
    pub api_base_url: Option<String>,

    /// Shared secret for backend-facing endpoints and outgoing collector
    /// requests (`BOT_BACKEND_SECRET`). Unset ⇒ backend endpoints answer
    /// 503 and outgoing events are skipped.
    pub backend_secret: Option<String>,

    /// Percentage of users assigned to variant A (`AB_SPLIT_A`,
    /// default 50, clamped to [0, 100]).
    pub ab_split_a: f64,

    /// Path of the newline-delimited user id file (`USER_IDS_FILE`,
    /// default `user_ids.txt`).
    pub user_ids_file: String,

    /// Admin user ids allowed to run /broadcast (`ADMIN_IDS`,
    /// comma-separated).
    pub admin_ids: Vec<i64>,

    /// Single admin fallback when `ADMIN_IDS` is empty (`ADMIN_USER_ID`).
    pub admin_user_id: i64,

    /// Log file path (`LOG_FILE_PATH`, default `kupidon.log`).
    pub log_file_path: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Never fails: unparseable numeric values fall back to their defaults
    /// and empty strings count as unset.
    pub fn from_env() -> Self {
        let bot_token = env::var("BOT_TOKEN")
            .or_else(|_| env::var("TELOXIDE_TOKEN"))
            .unwrap_or_default()
            .trim()
            .to_string();

        let ab_split_a = env::var("AB_SPLIT_A")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_AB_SPLIT_A)
            .clamp(0.0, 100.0);

        let admin_ids = env::var("ADMIN_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect();

        Self {
            bot_token,
            web_app_url: non_empty_var("WEB_APP_URL"),
            webhook_path: non_empty_var("TELEGRAM_WEBHOOK_PATH")
                .unwrap_or_else(|| "/telegram/webhook".to_string()),
            webhook_secret: non_empty_var("TELEGRAM_WEBHOOK_SECRET"),
            webhook_url: non_empty_var("BOT_WEBHOOK_URL"),
            auto_set_webhook: env::var("AUTO_SET_WEBHOOK")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            api_base_url: non_empty_var("API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string()),
            backend_secret: non_empty_var("BOT_BACKEND_SECRET"),
            ab_split_a,
            user_ids_file: non_empty_var("USER_IDS_FILE").unwrap_or_else(|| "user_ids.txt".to_string()),
            admin_ids,
            admin_user_id: env::var("ADMIN_USER_ID")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(0),
            log_file_path: non_empty_var("LOG_FILE_PATH").unwrap_or_else(|| "kupidon.log".to_string()),
        }
    }

    /// True when the user may run admin-only commands.
    pub fn is_admin(&self, user_id: i64) -> bool {
        if !self.admin_ids.is_empty() {
            return self.admin_ids.contains(&user_id);
        }
        if self.admin_user_id != 0 {
            return self.admin_user_id == user_id;
        }
        false
    }

    /// Full public webhook URL, when webhook mode is configured.
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url
            .as_deref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.webhook_path))
    }
}

/// Reads an environment variable, treating empty/whitespace values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BOT_TOKEN",
            "TELOXIDE_TOKEN",
            "WEB_APP_URL",
            "TELEGRAM_WEBHOOK_PATH",
            "TELEGRAM_WEBHOOK_SECRET",
            "BOT_WEBHOOK_URL",
            "AUTO_SET_WEBHOOK",
            "PORT",
            "API_BASE_URL",
            "BOT_BACKEND_SECRET",
            "AB_SPLIT_A",
            "USER_IDS_FILE",
            "ADMIN_IDS",
            "ADMIN_USER_ID",
            "LOG_FILE_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_when_nothing_is_set() {
        clear_env();
        let config = Config::from_env();

        assert_eq!(config.bot_token, "");
        assert_eq!(config.webhook_path, "/telegram/webhook");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ab_split_a, DEFAULT_AB_SPLIT_A);
        assert_eq!(config.user_ids_file, "user_ids.txt");
        assert!(config.web_app_url.is_none());
        assert!(config.api_base_url.is_none());
        assert!(!config.auto_set_webhook);
    }

    #[test]
    #[serial]
    fn split_ratio_is_clamped() {
        clear_env();
        env::set_var("AB_SPLIT_A", "250");
        assert_eq!(Config::from_env().ab_split_a, 100.0);

        env::set_var("AB_SPLIT_A", "-3");
        assert_eq!(Config::from_env().ab_split_a, 0.0);

        env::set_var("AB_SPLIT_A", "not-a-number");
        assert_eq!(Config::from_env().ab_split_a, DEFAULT_AB_SPLIT_A);
        clear_env();
    }

    #[test]
    #[serial]
    fn api_base_url_loses_trailing_slashes() {
        clear_env();
        env::set_var("API_BASE_URL", "https://api.example.com///");
        let config = Config::from_env();
        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com"));
        clear_env();
    }

    #[test]
    #[serial]
    fn empty_values_count_as_unset() {
        clear_env();
        env::set_var("WEB_APP_URL", "   ");
        env::set_var("BOT_BACKEND_SECRET", "");
        let config = Config::from_env();
        assert!(config.web_app_url.is_none());
        assert!(config.backend_secret.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn admin_check_prefers_id_list() {
        clear_env();
        env::set_var("ADMIN_IDS", "100, 200");
        env::set_var("ADMIN_USER_ID", "300");
        let config = Config::from_env();

        assert!(config.is_admin(100));
        assert!(config.is_admin(200));
        assert!(!config.is_admin(300));
        clear_env();

        env::set_var("ADMIN_USER_ID", "300");
        let config = Config::from_env();
        assert!(config.is_admin(300));
        assert!(!config.is_admin(100));
        clear_env();

        let config = Config::from_env();
        assert!(!config.is_admin(300));
    }

    #[test]
    #[serial]
    fn webhook_endpoint_joins_base_and_path() {
        clear_env();
        env::set_var("BOT_WEBHOOK_URL", "https://bot.example.com/");
        let config = Config::from_env();
        assert_eq!(
            config.webhook_endpoint().as_deref(),
            Some("https://bot.example.com/telegram/webhook")
        );
        clear_env();
        assert!(Config::from_env().webhook_endpoint().is_none());
    }
}
