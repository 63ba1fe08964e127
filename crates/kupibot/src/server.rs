//! Backend-facing HTTP API: health check, invoice creation, user listing.
//!
//! The Telegram webhook route is mounted separately (see `main.rs`); this
//! router only carries the endpoints the backend calls directly. All of
//! them except the health check require the shared `X-API-Key` secret,
//! compared byte-for-byte.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::LabeledPrice;

use kupicore::{Config, UserRegistry};

/// Shared state for all endpoints
#[derive(Clone)]
pub struct ApiState {
    pub bot: Bot,
    pub config: Arc<Config>,
    pub registry: Arc<UserRegistry>,
}

/// Invoice creation request from the backend
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub item_key: Option<String>,
    pub star_count: Option<Value>,
}

/// Invoice creation response
#[derive(Debug, Serialize)]
pub struct CreateInvoiceResponse {
    pub url: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotConfigured(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Checks the shared backend secret on an incoming request.
///
/// 503 when no secret is configured (the endpoint is effectively off),
/// 401 when the `X-API-Key` header is absent or differs.
fn require_backend_secret(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(secret) = config.backend_secret.as_deref() else {
        log::warn!("BOT_BACKEND_SECRET не задан — запрос отклонён");
        return Err(ApiError::NotConfigured("Not configured".to_string()));
    };

    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    match api_key {
        Some(key) if key.as_bytes() == secret.as_bytes() => Ok(()),
        _ => Err(ApiError::Unauthorized("Unauthorized".to_string())),
    }
}

/// Coerces the `starCount` body field into a positive integer, accepting
/// both JSON numbers and numeric strings.
fn coerce_star_count(value: Option<&Value>) -> Option<u32> {
    let stars = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(stars).ok().filter(|s| *s > 0)
}

/// Creates the backend-facing router
pub fn create_api_router(bot: Bot, config: Arc<Config>, registry: Arc<UserRegistry>) -> Router {
    let state = ApiState { bot, config, registry };

    Router::new()
        .route("/healthz", get(health_check))
        .route("/monetization/stars/invoice", post(handle_create_invoice))
        .route("/users", get(handle_list_users))
        .with_state(Arc::new(state))
}

/// GET /healthz - health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /monetization/stars/invoice - create a Telegram Stars invoice link
async fn handle_create_invoice(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<Json<CreateInvoiceResponse>, ApiError> {
    require_backend_secret(&state.config, &headers)?;

    if state.config.bot_token.is_empty() {
        return Err(ApiError::NotConfigured("BOT_TOKEN not configured".to_string()));
    }

    if request.item_key.as_deref() != Some("premium") {
        return Err(ApiError::BadRequest("Unsupported itemKey".to_string()));
    }
    let Some(stars) = coerce_star_count(request.star_count.as_ref()) else {
        return Err(ApiError::BadRequest("Invalid starCount".to_string()));
    };

    let payload = serde_json::json!({
        "t": "stars",
        "itemKey": "premium",
        "starCount": stars,
        "v": 1,
        "ts": chrono::Utc::now().timestamp_millis(),
    })
    .to_string();

    let prices = vec![LabeledPrice::new("Premium", stars)];
    let url = state
        .bot
        .create_invoice_link(
            "Premium подписка",
            "Доступ к Premium функциям.",
            payload,
            "XTR".to_string(),
            prices,
        )
        .await
        .map_err(|e| {
            log::error!("Ошибка создания инвойса: {}", e);
            ApiError::BadGateway("Failed to create invoice".to_string())
        })?;

    Ok(Json(CreateInvoiceResponse { url }))
}

/// GET /users - list recorded user ids
async fn handle_list_users(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_backend_secret(&state.config, &headers)?;

    let ids = state.registry.load().map_err(|e| {
        log::error!("Failed to read user registry: {}", e);
        ApiError::Internal("Failed to read user registry".to_string())
    })?;

    Ok(Json(serde_json::json!({
        "count": ids.len(),
        "userIds": ids,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_config(secret: Option<&str>) -> Config {
        Config {
            bot_token: "123456:TEST".to_string(),
            web_app_url: None,
            webhook_path: "/telegram/webhook".to_string(),
            webhook_secret: None,
            webhook_url: None,
            auto_set_webhook: false,
            port: 7777,
            api_base_url: None,
            backend_secret: secret.map(str::to_string),
            ab_split_a: 50.0,
            user_ids_file: "user_ids.txt".to_string(),
            admin_ids: vec![],
            admin_user_id: 0,
            log_file_path: "kupidon.log".to_string(),
        }
    }

    fn header_map(key: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = key {
            headers.insert("x-api-key", key.parse().unwrap());
        }
        headers
    }

    #[test]
    fn secret_check_rejects_when_not_configured() {
        let config = test_config(None);
        let result = require_backend_secret(&config, &header_map(Some("anything")));
        assert!(matches!(result, Err(ApiError::NotConfigured(_))));
    }

    #[test]
    fn secret_check_rejects_missing_or_wrong_key() {
        let config = test_config(Some("sekret"));
        assert!(matches!(
            require_backend_secret(&config, &header_map(None)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            require_backend_secret(&config, &header_map(Some("wrong"))),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn secret_check_accepts_exact_match() {
        let config = test_config(Some("sekret"));
        assert!(require_backend_secret(&config, &header_map(Some("sekret"))).is_ok());
    }

    #[test]
    fn star_count_accepts_numbers_and_numeric_strings() {
        assert_eq!(coerce_star_count(Some(&serde_json::json!(100))), Some(100));
        assert_eq!(coerce_star_count(Some(&serde_json::json!("25"))), Some(25));
        assert_eq!(coerce_star_count(Some(&serde_json::json!(0))), None);
        assert_eq!(coerce_star_count(Some(&serde_json::json!(-5))), None);
        assert_eq!(coerce_star_count(Some(&serde_json::json!("abc"))), None);
        assert_eq!(coerce_star_count(Some(&serde_json::json!(1.5))), None);
        assert_eq!(coerce_star_count(None), None);
    }

    fn test_router(secret: Option<&str>, registry: Arc<UserRegistry>) -> Router {
        let bot = Bot::new("123456:TEST");
        create_api_router(bot, Arc::new(test_config(secret)), registry)
    }

    #[tokio::test]
    async fn healthz_answers_ok_without_auth() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(UserRegistry::new(dir.path().join("user_ids.txt")));
        let router = test_router(Some("sekret"), registry);

        let response = router
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn users_endpoint_requires_the_secret() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(UserRegistry::new(dir.path().join("user_ids.txt")));
        registry.add("12345678").unwrap();

        let router = test_router(Some("sekret"), Arc::clone(&registry));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header("x-api-key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let router = test_router(Some("sekret"), Arc::clone(&registry));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header("x-api-key", "sekret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invoice_endpoint_is_off_without_secret() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(UserRegistry::new(dir.path().join("user_ids.txt")));
        let router = test_router(None, registry);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/monetization/stars/invoice")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"itemKey":"premium","starCount":100}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn invoice_endpoint_validates_the_item_key() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(UserRegistry::new(dir.path().join("user_ids.txt")));
        let router = test_router(Some("sekret"), registry);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/monetization/stars/invoice")
                    .header("x-api-key", "sekret")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"itemKey":"gold","starCount":100}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
