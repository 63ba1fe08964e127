//! Command and message handler implementations (/start, /help, text echo)

use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, ParseMode, WebAppInfo};
use url::Url;

use kupicore::analytics::AnalyticsEvent;
use kupicore::experiment::assign_variant;

use super::types::{HandlerDeps, HandlerError};

/// Referral code and campaign extracted from a /start deep-link payload.
///
/// The payload format is `<code>__<campaign>`; both parts are optional.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartPayload {
    pub referral_code: Option<String>,
    pub campaign: Option<String>,
}

/// Parses a /start deep-link payload of the form `code__campaign`.
pub fn parse_start_payload(payload: &str) -> StartPayload {
    if payload.is_empty() {
        return StartPayload::default();
    }
    let mut parts = payload.split("__");
    let referral_code = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let campaign = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    StartPayload {
        referral_code,
        campaign,
    }
}

/// Appends a percent-encoded query parameter to a URL string.
pub fn append_query_param(base_url: &str, key: &str, value: &str) -> String {
    if base_url.is_empty() {
        return base_url.to_string();
    }
    let joiner = if base_url.contains('?') { '&' } else { '?' };
    format!(
        "{base_url}{joiner}{}={}",
        urlencoding::encode(key),
        urlencoding::encode(value)
    )
}

/// Handle /start command: assign a variant, show the Mini App button,
/// record the user and fire the `bot_start_shown` event.
pub(super) async fn handle_start_command(
    bot: &Bot,
    msg: &Message,
    payload: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !payload.is_empty() {
        log::info!("/start payload: {}", payload);
    }

    let user_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok());
    let id_str = user_id.map(|id| id.to_string()).unwrap_or_default();
    let variant = assign_variant(&id_str, deps.config.ab_split_a);
    let parsed = parse_start_payload(payload);

    // Record the chat id so the broadcast utility can reach this user later.
    if let Err(e) = deps.registry.add(&msg.chat.id.0.to_string()) {
        log::error!("Failed to record user {} in registry: {}", msg.chat.id.0, e);
    }

    let text = format!(
        "Привет! Хочешь найти собеседника?\n{}",
        if deps.config.web_app_url.is_some() {
            " Открой мини-приложение по кнопке ниже."
        } else {
            " URL мини-приложения не настроен."
        }
    );

    match deps.config.web_app_url.as_deref() {
        Some(web_app_url) => {
            let url_with_exp = append_query_param(web_app_url, "exp", variant.as_str());
            let url_with_params = match &parsed.referral_code {
                Some(code) => append_query_param(&url_with_exp, "ref", code),
                None => url_with_exp,
            };

            match Url::parse(&url_with_params) {
                Ok(url) => {
                    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
                        "Открыть приложение",
                        WebAppInfo { url },
                    )]]);
                    bot.send_message(msg.chat.id, text)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(keyboard)
                        .await?;
                }
                Err(e) => {
                    log::warn!("WEB_APP_URL produced an invalid URL ({}), sending without button", e);
                    bot.send_message(msg.chat.id, text).await?;
                }
            }
        }
        None => {
            bot.send_message(msg.chat.id, text).await?;
        }
    }

    deps.backend.track(AnalyticsEvent::new(
        "bot_start_shown",
        user_id,
        Some(json!({
            "variant": variant.as_str(),
            "startPayload": if payload.is_empty() { Value::Null } else { json!(payload) },
            "referralCode": parsed.referral_code,
            "campaign": parsed.campaign,
        })),
    ));

    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(
        msg.chat.id,
        "Доступные команды:\n/start — приветствие и кнопка мини-приложения\n/help — эта справка",
    )
    .await?;
    Ok(())
}

/// Handle plain text messages (echo)
pub(super) async fn handle_text_message(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }
    bot.send_message(msg.chat.id, format!("Вы написали: {}", text)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_with_code_and_campaign() {
        let parsed = parse_start_payload("ref42__summer");
        assert_eq!(parsed.referral_code.as_deref(), Some("ref42"));
        assert_eq!(parsed.campaign.as_deref(), Some("summer"));
    }

    #[test]
    fn payload_with_code_only() {
        let parsed = parse_start_payload("ref42");
        assert_eq!(parsed.referral_code.as_deref(), Some("ref42"));
        assert_eq!(parsed.campaign, None);
    }

    #[test]
    fn empty_payload_yields_nothing() {
        assert_eq!(parse_start_payload(""), StartPayload::default());
    }

    #[test]
    fn blank_parts_are_dropped() {
        let parsed = parse_start_payload("__summer");
        assert_eq!(parsed.referral_code, None);
        assert_eq!(parsed.campaign.as_deref(), Some("summer"));

        let parsed = parse_start_payload("ref42__");
        assert_eq!(parsed.referral_code.as_deref(), Some("ref42"));
        assert_eq!(parsed.campaign, None);
    }

    #[test]
    fn extra_separators_keep_only_the_second_part() {
        let parsed = parse_start_payload("a__b__c");
        assert_eq!(parsed.referral_code.as_deref(), Some("a"));
        assert_eq!(parsed.campaign.as_deref(), Some("b"));
    }

    #[test]
    fn query_param_uses_question_mark_then_ampersand() {
        let url = append_query_param("https://app.example.com", "exp", "A");
        assert_eq!(url, "https://app.example.com?exp=A");

        let url = append_query_param(&url, "ref", "ref42");
        assert_eq!(url, "https://app.example.com?exp=A&ref=ref42");
    }

    #[test]
    fn query_param_values_are_percent_encoded() {
        let url = append_query_param("https://app.example.com", "ref", "a b&c");
        assert_eq!(url, "https://app.example.com?ref=a%20b%26c");
    }

    #[test]
    fn query_param_on_empty_base_is_a_no_op() {
        assert_eq!(append_query_param("", "exp", "A"), "");
    }
}
