//! Telegram Stars payment handling.
//!
//! Pre-checkout queries are always approved (the invoice itself is created
//! by the backend through the HTTP API); successful payments are logged,
//! relayed to the backend and acknowledged to the user.

use serde::Deserialize;
use serde_json::Value;
use teloxide::prelude::*;
use teloxide::types::{Message, PreCheckoutQuery};

use kupicore::analytics::StarsPaymentNotice;

use super::types::{HandlerDeps, HandlerError};

/// Structured part of the invoice payload created by the invoice endpoint:
/// `{"t":"stars","itemKey":...,"starCount":...,"v":1,"ts":...}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InvoicePayloadData {
    item_key: Option<String>,
    star_count: Option<u32>,
}

fn parse_invoice_payload(raw: &str) -> InvoicePayloadData {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Approves a pre-checkout query so the payment can proceed.
pub(super) async fn handle_pre_checkout(bot: &Bot, query: &PreCheckoutQuery) -> Result<(), HandlerError> {
    log::info!(
        "Received pre_checkout_query: id={}, payload={}",
        query.id,
        query.invoice_payload
    );
    bot.answer_pre_checkout_query(query.id.clone(), true).await?;
    Ok(())
}

/// Handles a successful payment message: log, relay to the backend, thank
/// the user.
pub(super) async fn handle_successful_payment(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };

    let payload = parse_invoice_payload(&payment.invoice_payload);
    let telegram_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok());

    log::info!("💳 Успешная оплата");
    log::info!("  • Telegram ID: {:?}", telegram_id);
    log::info!("  • Currency: {}", payment.currency);
    log::info!("  • Total amount: {}", payment.total_amount);
    log::info!("  • Item key: {:?}", payload.item_key);
    log::info!("  • Star count: {:?}", payload.star_count);
    log::info!(
        "  • Telegram payment charge ID: {}",
        payment.telegram_payment_charge_id.0
    );
    log::info!(
        "  • Provider payment charge ID: {:?}",
        payment.provider_payment_charge_id
    );

    // Fire-and-forget backend notification about the activated purchase.
    deps.backend.notify_stars_payment(StarsPaymentNotice {
        telegram_id,
        item_key: payload.item_key,
        star_count: payload.star_count,
        successful_payment: serde_json::to_value(payment).unwrap_or(Value::Null),
    });

    if let Err(e) = bot.send_message(msg.chat.id, "Оплата получена! Спасибо.").await {
        log::error!("Failed to thank user {} for payment: {}", msg.chat.id.0, e);
    }

    Ok(())
}
