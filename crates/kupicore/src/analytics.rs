//! Collector client: fire-and-forget analytics events and payment relays.
//!
//! The backend is optional. Unless both `API_BASE_URL` and
//! `BOT_BACKEND_SECRET` are configured the client is disabled and every
//! send is silently skipped (keeps dev logs clean). Sends are spawned as
//! detached tasks: the triggering handler never waits for, or learns
//! about, the outcome.

use crate::config::Config;
use crate::delivery::{self, DeliveryOptions, DeliveryOutcome};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

/// Header carrying the shared backend secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Collector path for interaction events.
const EVENTS_PATH: &str = "/api/analytics/bot-event";

/// Collector path for successful Stars payments.
const STARS_SUCCESS_PATH: &str = "/api/monetization/stars/success";

/// One interaction event, serialized as `{name, telegramId, props}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>, telegram_id: Option<i64>, props: Option<Value>) -> Self {
        Self {
            name: name.into(),
            telegram_id,
            props,
        }
    }
}

/// Payload relayed to the backend after a successful Stars payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarsPaymentNotice {
    pub telegram_id: Option<i64>,
    pub item_key: Option<String>,
    pub star_count: Option<u32>,
    pub successful_payment: Value,
}

/// HTTP client for the analytics/backend collector.
///
/// Cheap to clone: the underlying `reqwest::Client` shares its pool.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Option<String>,
    secret: Option<String>,
    options: DeliveryOptions,
}

impl BackendClient {
    /// Builds the client from the process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            secret: config.backend_secret.clone(),
            options: DeliveryOptions::default(),
        }
    }

    /// True when both the base URL and the secret are configured.
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some() && self.secret.is_some()
    }

    /// Fires an event at the collector without waiting for the result.
    pub fn track(&self, event: AnalyticsEvent) {
        if !self.is_enabled() {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            client.send_event(&event).await;
        });
    }

    /// Relays a successful Stars payment without waiting for the result.
    pub fn notify_stars_payment(&self, notice: StarsPaymentNotice) {
        if !self.is_enabled() {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            client.send_stars_payment(&notice).await;
        });
    }

    /// Delivers an event and reports the outcome (used by `track` and tests).
    pub async fn send_event(&self, event: &AnalyticsEvent) -> DeliveryOutcome {
        self.post(EVENTS_PATH, event).await
    }

    /// Delivers a payment notice and reports the outcome.
    pub async fn send_stars_payment(&self, notice: &StarsPaymentNotice) -> DeliveryOutcome {
        self.post(STARS_SUCCESS_PATH, notice).await
    }

    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> DeliveryOutcome {
        let (Some(base), Some(secret)) = (self.base_url.as_deref(), self.secret.as_deref()) else {
            return DeliveryOutcome::Exhausted;
        };
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(secret) {
            Ok(value) => {
                headers.insert(API_KEY_HEADER, value);
            }
            Err(_) => {
                log::warn!("BOT_BACKEND_SECRET contains characters invalid in a header, skipping send");
                return DeliveryOutcome::Exhausted;
            }
        }
        let url = format!("{}{}", base, path);
        delivery::deliver(&self.http, &url, payload, headers, &self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_with(base: Option<&str>, secret: Option<&str>) -> Config {
        Config {
            bot_token: String::new(),
            web_app_url: None,
            webhook_path: "/telegram/webhook".to_string(),
            webhook_secret: None,
            webhook_url: None,
            auto_set_webhook: false,
            port: 7777,
            api_base_url: base.map(str::to_string),
            backend_secret: secret.map(str::to_string),
            ab_split_a: 50.0,
            user_ids_file: "user_ids.txt".to_string(),
            admin_ids: vec![],
            admin_user_id: 0,
            log_file_path: "kupidon.log".to_string(),
        }
    }

    #[test]
    fn disabled_without_base_url_or_secret() {
        assert!(!BackendClient::from_config(&config_with(None, None)).is_enabled());
        assert!(!BackendClient::from_config(&config_with(Some("https://api.test"), None)).is_enabled());
        assert!(!BackendClient::from_config(&config_with(None, Some("s"))).is_enabled());
        assert!(BackendClient::from_config(&config_with(Some("https://api.test"), Some("s"))).is_enabled());
    }

    #[test]
    fn event_serializes_with_backend_field_names() {
        let event = AnalyticsEvent::new(
            "bot_start_shown",
            Some(12345678),
            Some(serde_json::json!({"variant": "A"})),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "bot_start_shown",
                "telegramId": 12345678,
                "props": {"variant": "A"},
            })
        );
    }

    #[test]
    fn absent_fields_are_omitted() {
        let event = AnalyticsEvent::new("bot_start_shown", None, None);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, serde_json::json!({"name": "bot_start_shown"}));
    }
}
